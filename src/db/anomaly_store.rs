use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::{AnomalyEvent, AnomalyKind};

/// Append-only store for classified anomaly events.
///
/// The upstream change stream is a rolling intraday window, so consecutive
/// polls overlap heavily. Inserts go through OR IGNORE against the
/// (trade_date, event_time, code, raw_label) natural key: only rows not
/// seen before land, and burst counting works off `recorded_at` of those.
pub struct AnomalyStore {
    pool: SqlitePool,
}

impl AnomalyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a poll's worth of events, skipping already-seen rows.
    /// Returns how many were new. `recorded_at` is the cycle clock.
    pub async fn record_batch_at(&self, events: &[AnomalyEvent], recorded_at: i64) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;
        for event in events {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO anomaly_events (
                    trade_date, event_time, code, name, kind, raw_label,
                    severity, price, change_pct, amount, message, recorded_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&event.trade_date)
            .bind(&event.event_time)
            .bind(&event.code)
            .bind(&event.name)
            .bind(event.kind.as_str())
            .bind(&event.raw_label)
            .bind(event.severity.as_str())
            .bind(event.price)
            .bind(event.change_pct)
            .bind(event.amount)
            .bind(&event.message)
            .bind(recorded_at)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        Ok(inserted)
    }

    /// How many events of `kind` were first recorded at or after `since`.
    pub async fn count_since(&self, kind: AnomalyKind, since: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM anomaly_events WHERE kind = ? AND recorded_at >= ?",
        )
        .bind(kind.as_str())
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::types::Severity;

    fn event(code: &str, event_time: &str, kind: AnomalyKind) -> AnomalyEvent {
        AnomalyEvent {
            code: code.to_string(),
            name: "测试股".to_string(),
            kind,
            raw_label: "火箭发射".to_string(),
            severity: Severity::High,
            price: 12.34,
            change_pct: 5.6,
            amount: 0.0,
            message: format!("🚀 {code}"),
            event_time: event_time.to_string(),
            trade_date: "20260823".to_string(),
        }
    }

    async fn total_rows(store: &AnomalyStore) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM anomaly_events")
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn overlapping_polls_insert_each_event_once() {
        let store = AnomalyStore::new(memory_pool().await);
        let batch = vec![
            event("600519", "09:31:00", AnomalyKind::Rocket),
            event("000001", "09:31:05", AnomalyKind::Rocket),
        ];

        assert_eq!(store.record_batch_at(&batch, 1_000).await.unwrap(), 2);

        // Second poll returns the same rows plus one new one.
        let mut next = batch.clone();
        next.push(event("300750", "09:32:00", AnomalyKind::Dive));
        assert_eq!(store.record_batch_at(&next, 1_060).await.unwrap(), 1);
        assert_eq!(total_rows(&store).await, 3);
    }

    #[tokio::test]
    async fn duplicate_inside_one_batch_counts_once() {
        let store = AnomalyStore::new(memory_pool().await);
        let e = event("600519", "09:31:00", AnomalyKind::Rocket);

        let inserted = store.record_batch_at(&[e.clone(), e], 1_000).await.unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(total_rows(&store).await, 1);
    }

    #[tokio::test]
    async fn same_stock_different_event_time_is_a_new_row() {
        let store = AnomalyStore::new(memory_pool().await);
        let batch = vec![
            event("600519", "09:31:00", AnomalyKind::Rocket),
            event("600519", "09:45:00", AnomalyKind::Rocket),
        ];
        assert_eq!(store.record_batch_at(&batch, 1_000).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn count_since_filters_by_kind_and_time() {
        let store = AnomalyStore::new(memory_pool().await);

        store
            .record_batch_at(&[event("600519", "09:31:00", AnomalyKind::Rocket)], 1_000)
            .await
            .unwrap();
        store
            .record_batch_at(
                &[
                    event("000001", "09:36:00", AnomalyKind::Rocket),
                    event("300750", "09:36:10", AnomalyKind::Dive),
                ],
                1_300,
            )
            .await
            .unwrap();

        assert_eq!(store.count_since(AnomalyKind::Rocket, 1_200).await.unwrap(), 1);
        assert_eq!(store.count_since(AnomalyKind::Rocket, 0).await.unwrap(), 2);
        assert_eq!(store.count_since(AnomalyKind::Dive, 1_200).await.unwrap(), 1);
        assert_eq!(store.count_since(AnomalyKind::BigOrderBuy, 0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_batch_skips_the_transaction() {
        let store = AnomalyStore::new(memory_pool().await);
        assert_eq!(store.record_batch_at(&[], 1_000).await.unwrap(), 0);
    }
}
