use std::sync::Arc;

use tracing::{debug, error, info};

use crate::analysis::AnalysisEngine;
use crate::db::SignalStore;
use crate::notify::NotificationChannel;
use crate::types::Signal;

// ---------------------------------------------------------------------------
// Escalator
// ---------------------------------------------------------------------------

/// Side-effect stage for freshly created warning/critical signals:
/// notification fan-out plus a deep-analysis job whose result is attached
/// back onto the stored row.
///
/// Everything here is fire-and-forget. `dispatch` spawns and returns, so a
/// slow webhook or analysis upstream can never stretch a monitor cycle, and
/// a failure in one channel never suppresses the others.
pub struct Escalator {
    channels: Vec<Arc<dyn NotificationChannel>>,
    engine: Option<Arc<dyn AnalysisEngine>>,
    signals: Arc<SignalStore>,
}

impl Escalator {
    pub fn new(signals: Arc<SignalStore>) -> Self {
        Self {
            channels: Vec::new(),
            engine: None,
            signals,
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn AnalysisEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Escalate a newly created signal. Info-level signals are persisted
    /// and listed but never notified or analyzed.
    pub fn dispatch(&self, signal: &Signal) {
        if !signal.level.escalates() {
            return;
        }

        if !self.channels.is_empty() {
            let channels = self.channels.clone();
            let signal = signal.clone();
            tokio::spawn(async move {
                let sends = channels.iter().map(|channel| {
                    let signal = &signal;
                    async move {
                        match channel.send(signal).await {
                            Ok(()) => {
                                info!(
                                    channel = channel.name(),
                                    signal_id = signal.id,
                                    "notification delivered"
                                );
                            }
                            Err(e) => {
                                error!(
                                    channel = channel.name(),
                                    signal_id = signal.id,
                                    "notification failed: {e}"
                                );
                            }
                        }
                    }
                });
                futures_util::future::join_all(sends).await;
            });
        }

        if let Some(engine) = &self.engine {
            let engine = Arc::clone(engine);
            let signals = Arc::clone(&self.signals);
            let signal = signal.clone();
            tokio::spawn(async move {
                let id = signal.id;
                let engine_name = engine.name();
                let result =
                    tokio::task::spawn_blocking(move || engine.analyze(&signal)).await;
                match result {
                    Ok(Ok(text)) => match signals.attach_analysis(id, &text).await {
                        Ok(true) => {
                            info!(signal_id = id, engine = engine_name, "analysis attached");
                        }
                        Ok(false) => {
                            debug!(signal_id = id, "signal already analyzed, keeping the first");
                        }
                        Err(e) => error!(signal_id = id, "failed to store analysis: {e}"),
                    },
                    Ok(Err(e)) => {
                        error!(signal_id = id, engine = engine_name, "analysis failed: {e}");
                    }
                    Err(e) => error!(signal_id = id, "analysis task panicked: {e}"),
                }
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::db::memory_pool;
    use crate::error::{AnalysisError, NotifyError};
    use crate::types::{SignalDraft, SignalLevel};

    struct CountingChannel {
        sent: AtomicU32,
        fail: bool,
    }

    impl CountingChannel {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: AtomicU32::new(0),
                fail,
            })
        }
    }

    #[async_trait::async_trait]
    impl NotificationChannel for CountingChannel {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn send(&self, _signal: &Signal) -> Result<(), NotifyError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(NotifyError::Status(reqwest::StatusCode::BAD_GATEWAY))
            } else {
                Ok(())
            }
        }
    }

    struct FixedEngine {
        fail: bool,
    }

    impl AnalysisEngine for FixedEngine {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn analyze(&self, _signal: &Signal) -> Result<String, AnalysisError> {
            if self.fail {
                Err(AnalysisError::EmptyResponse)
            } else {
                Ok("情绪过热，建议观望。".to_string())
            }
        }
    }

    async fn store() -> Arc<SignalStore> {
        Arc::new(SignalStore::new(memory_pool().await))
    }

    async fn stored_signal(store: &SignalStore, level: SignalLevel) -> Signal {
        let draft = SignalDraft {
            kind: "risk_alert".to_string(),
            level,
            message: "High risk".to_string(),
            metadata: json!({}),
        };
        let (signal, created) = store.create_at(&draft, 1_000).await.unwrap();
        assert!(created);
        signal
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn info_signals_are_not_escalated() {
        let store = store().await;
        let channel = CountingChannel::new(false);
        let escalator = Escalator::new(Arc::clone(&store)).with_channel(channel.clone());

        let signal = stored_signal(&store, SignalLevel::Info).await;
        escalator.dispatch(&signal);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(channel.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn warning_fans_out_to_every_channel() {
        let store = store().await;
        let first = CountingChannel::new(false);
        let second = CountingChannel::new(false);
        let escalator = Escalator::new(Arc::clone(&store))
            .with_channel(first.clone())
            .with_channel(second.clone());

        let signal = stored_signal(&store, SignalLevel::Warning).await;
        escalator.dispatch(&signal);

        wait_for(|| {
            first.sent.load(Ordering::SeqCst) == 1 && second.sent.load(Ordering::SeqCst) == 1
        })
        .await;
    }

    #[tokio::test]
    async fn one_failing_channel_does_not_block_the_rest() {
        let store = store().await;
        let failing = CountingChannel::new(true);
        let healthy = CountingChannel::new(false);
        let escalator = Escalator::new(Arc::clone(&store))
            .with_channel(failing.clone())
            .with_channel(healthy.clone());

        let signal = stored_signal(&store, SignalLevel::Critical).await;
        escalator.dispatch(&signal);

        wait_for(|| healthy.sent.load(Ordering::SeqCst) == 1).await;
    }

    #[tokio::test]
    async fn analysis_text_lands_on_the_stored_signal() {
        let store = store().await;
        let escalator =
            Escalator::new(Arc::clone(&store)).with_engine(Arc::new(FixedEngine { fail: false }));

        let signal = stored_signal(&store, SignalLevel::Critical).await;
        escalator.dispatch(&signal);

        let id = signal.id;
        for _ in 0..100 {
            if let Some(stored) = store.get(id).await.unwrap() {
                if stored.analysis.is_some() {
                    assert_eq!(stored.analysis.as_deref(), Some("情绪过热，建议观望。"));
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("analysis never attached");
    }

    #[tokio::test]
    async fn failed_analysis_leaves_the_signal_untouched() {
        let store = store().await;
        let escalator =
            Escalator::new(Arc::clone(&store)).with_engine(Arc::new(FixedEngine { fail: true }));

        let signal = stored_signal(&store, SignalLevel::Warning).await;
        escalator.dispatch(&signal);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stored = store.get(signal.id).await.unwrap().unwrap();
        assert!(stored.analysis.is_none());
    }
}
