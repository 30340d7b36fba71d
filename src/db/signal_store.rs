use sqlx::SqlitePool;

use crate::config::{DEDUP_WINDOW_SECS, SIGNALS_MAX_LIMIT};
use crate::db::models::SignalRow;
use crate::error::Result;
use crate::types::{Signal, SignalDraft, SignalLevel};

/// Persists signals and enforces the dedup window: a draft whose
/// (kind, message) already exists within the last ten minutes is dropped
/// and the existing row returned instead.
pub struct SignalStore {
    pool: SqlitePool,
}

impl SignalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a draft unless an equivalent signal already exists inside the
    /// dedup window. Returns the signal plus whether a row was created.
    ///
    /// The lookup and insert share one transaction. Writers are serialized by
    /// the one-cycle-at-a-time scheduler, not by the transaction itself.
    /// `now` is injected so the caller's cycle clock also drives the window.
    pub async fn create_at(&self, draft: &SignalDraft, now: i64) -> Result<(Signal, bool)> {
        let cutoff = now - DEDUP_WINDOW_SECS;
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT id, kind, level, message, analysis, metadata, created_at
            FROM signals
            WHERE kind = ? AND message = ? AND created_at >= ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(&draft.kind)
        .bind(&draft.message)
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            tx.commit().await?;
            return Ok((row.into_signal(), false));
        }

        let metadata = draft.metadata.to_string();
        let inserted = sqlx::query(
            r#"
            INSERT INTO signals (kind, level, message, analysis, metadata, created_at)
            VALUES (?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(&draft.kind)
        .bind(draft.level.as_str())
        .bind(&draft.message)
        .bind(&metadata)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let signal = Signal {
            id: inserted.last_insert_rowid(),
            kind: draft.kind.clone(),
            level: draft.level,
            message: draft.message.clone(),
            analysis: None,
            metadata: draft.metadata.clone(),
            created_at: now,
        };
        Ok((signal, true))
    }

    /// Attach deep-analysis text to a signal. At most one attachment wins;
    /// returns false when the signal is missing or already analyzed.
    pub async fn attach_analysis(&self, id: i64, analysis: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE signals SET analysis = ? WHERE id = ? AND analysis IS NULL",
        )
        .bind(analysis)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Newest signals first. `limit` is clamped to [1, SIGNALS_MAX_LIMIT].
    pub async fn latest(&self, limit: i64) -> Result<Vec<Signal>> {
        let limit = limit.clamp(1, SIGNALS_MAX_LIMIT);
        let rows = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT id, kind, level, message, analysis, metadata, created_at
            FROM signals
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SignalRow::into_signal).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Signal>> {
        let row = sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT id, kind, level, message, analysis, metadata, created_at
            FROM signals
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SignalRow::into_signal))
    }

    /// Count of warning/critical signals since `since` (epoch seconds).
    /// Feeds the escalated-signal gauge on /health.
    pub async fn escalated_count_since(&self, since: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM signals WHERE created_at >= ? AND level != ?",
        )
        .bind(since)
        .bind(SignalLevel::Info.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
