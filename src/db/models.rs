/// Database row types used by sqlx for typed queries.
use serde_json::Value;

use crate::types::{Signal, SignalLevel};

#[derive(Debug, sqlx::FromRow)]
pub struct SignalRow {
    pub id: i64,
    pub kind: String,
    pub level: String,
    pub message: String,
    pub analysis: Option<String>,
    pub metadata: String,
    pub created_at: i64,
}

impl SignalRow {
    /// Decode the stored row into the API-facing shape. Rows written by
    /// this binary always parse; anything hand-edited falls back to
    /// `info` / `{}` rather than poisoning a listing.
    pub fn into_signal(self) -> Signal {
        let level = SignalLevel::parse(&self.level).unwrap_or(SignalLevel::Info);
        let metadata: Value =
            serde_json::from_str(&self.metadata).unwrap_or_else(|_| Value::Object(Default::default()));
        Signal {
            id: self.id,
            kind: self.kind,
            level,
            message: self.message,
            analysis: self.analysis,
            metadata,
            created_at: self.created_at,
        }
    }
}
