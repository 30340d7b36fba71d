use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::MarketSnapshot;

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

/// Holds the latest composite market snapshot.
///
/// The pipeline publishes a fresh snapshot once per cycle; readers get a
/// cheap Arc clone of whatever was last published. Empty until the first
/// cycle completes.
pub struct SnapshotStore {
    current: RwLock<Option<Arc<MarketSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: RwLock::new(None),
        })
    }

    pub async fn publish(&self, snapshot: MarketSnapshot) {
        let mut guard = self.current.write().await;
        *guard = Some(Arc::new(snapshot));
    }

    pub async fn latest(&self) -> Option<Arc<MarketSnapshot>> {
        self.current.read().await.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Trend;

    fn snapshot(mood: f64) -> MarketSnapshot {
        MarketSnapshot {
            mood_index: mood,
            up_count: 2800,
            down_count: 1900,
            flat_count: 300,
            limit_up_count: 45,
            limit_down_count: 5,
            fried_board_count: 12,
            fried_rate: 21.05,
            premium_rate: 1.8,
            promotion_rate: 33.3,
            trend: Trend::Flat,
            degraded: false,
            generated_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn empty_until_first_publish() {
        let store = SnapshotStore::new();
        assert!(store.latest().await.is_none());
    }

    #[tokio::test]
    async fn publish_replaces_the_previous_snapshot() {
        let store = SnapshotStore::new();
        store.publish(snapshot(55.0)).await;
        store.publish(snapshot(62.5)).await;

        let latest = store.latest().await.unwrap();
        assert_eq!(latest.mood_index, 62.5);
    }

    #[tokio::test]
    async fn readers_keep_their_arc_after_a_publish() {
        let store = SnapshotStore::new();
        store.publish(snapshot(55.0)).await;

        let held = store.latest().await.unwrap();
        store.publish(snapshot(70.0)).await;

        assert_eq!(held.mood_index, 55.0);
        assert_eq!(store.latest().await.unwrap().mood_index, 70.0);
    }
}
