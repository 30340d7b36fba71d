use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::pipeline::PollCycle;

struct RunningLoop {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the monitor loop lifecycle: stopped or running, nothing else.
///
/// `start` and `stop` are both idempotent. Stop flips the shutdown flag and
/// awaits the loop task, so a stop/start pair can never leave two loops
/// polling concurrently. A cycle error is logged and counted; the loop
/// always reaches its next tick.
pub struct Scheduler {
    pipeline: Arc<dyn PollCycle>,
    health: Arc<HealthState>,
    interval: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<dyn PollCycle>, health: Arc<HealthState>, interval: Duration) -> Self {
        Self {
            pipeline,
            health,
            interval,
            running: Mutex::new(None),
        }
    }

    /// Spawn the loop. Returns false (and does nothing) when already running.
    pub async fn start(&self) -> bool {
        let mut guard = self.running.lock().await;
        if guard.is_some() {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let pipeline = Arc::clone(&self.pipeline);
        let health = Arc::clone(&self.health);
        let interval = self.interval;

        self.health.set_scheduler_running(true);
        info!(interval_secs = interval.as_secs(), "monitor loop started");

        let task = tokio::spawn(async move {
            loop {
                if let Err(e) = pipeline.run_cycle().await {
                    health.record_cycle_error();
                    error!("monitor cycle failed: {e}");
                }
                // The sleep is the cancellation point: a stop issued during a
                // running cycle lands here as an immediately-ready changed().
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        *guard = Some(RunningLoop { shutdown_tx, task });
        true
    }

    /// Signal the loop and wait for it to exit. Returns false when it was
    /// not running. In-flight escalation tasks stay detached and finish on
    /// their own.
    pub async fn stop(&self) -> bool {
        let mut guard = self.running.lock().await;
        let Some(running) = guard.take() else {
            return false;
        };

        let _ = running.shutdown_tx.send(true);
        if let Err(e) = running.task.await {
            error!("monitor loop task failed to join: {e}");
        }
        self.health.set_scheduler_running(false);
        info!("monitor loop stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use super::*;
    use crate::error::{AppError, Result};
    use crate::pipeline::CycleReport;
    use crate::types::Trend;

    struct StubCycle {
        cycles: AtomicU32,
        fail: bool,
    }

    impl StubCycle {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                cycles: AtomicU32::new(0),
                fail,
            })
        }

        fn count(&self) -> u32 {
            self.cycles.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl PollCycle for StubCycle {
        async fn run_cycle(&self) -> Result<CycleReport> {
            self.cycles.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Config("poll blew up".to_string()));
            }
            Ok(CycleReport {
                mood_index: 50.0,
                trend: Trend::Flat,
                new_events: 0,
                signals_created: 0,
                signals_deduped: 0,
                degraded: false,
            })
        }
    }

    fn scheduler(cycle: Arc<StubCycle>, interval: Duration) -> (Scheduler, Arc<HealthState>) {
        let health = Arc::new(HealthState::new());
        (
            Scheduler::new(cycle, Arc::clone(&health), interval),
            health,
        )
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let cycle = StubCycle::new(false);
        let (scheduler, health) = scheduler(cycle.clone(), Duration::from_secs(600));

        assert!(scheduler.start().await);
        assert!(!scheduler.start().await);
        assert!(scheduler.is_running().await);
        assert!(health.scheduler_running());

        wait_for(|| cycle.count() == 1).await;
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_clears_the_running_flag() {
        let cycle = StubCycle::new(false);
        let (scheduler, health) = scheduler(cycle, Duration::from_secs(600));

        assert!(!scheduler.stop().await);

        scheduler.start().await;
        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);
        assert!(!scheduler.is_running().await);
        assert!(!health.scheduler_running());
    }

    #[tokio::test]
    async fn stop_interrupts_the_sleep_promptly() {
        let cycle = StubCycle::new(false);
        let (scheduler, _) = scheduler(cycle.clone(), Duration::from_secs(3600));

        scheduler.start().await;
        wait_for(|| cycle.count() == 1).await;

        // The loop is an hour into its nap; stop must not wait it out.
        let begun = Instant::now();
        scheduler.stop().await;
        assert!(begun.elapsed() < Duration::from_secs(2));
        assert_eq!(cycle.count(), 1);
    }

    #[tokio::test]
    async fn failing_cycles_keep_the_loop_alive() {
        let cycle = StubCycle::new(true);
        let (scheduler, health) = scheduler(cycle.clone(), Duration::from_millis(10));

        scheduler.start().await;
        wait_for(|| cycle.count() >= 3).await;
        scheduler.stop().await;

        assert!(health.cycle_errors() >= 3);
    }

    #[tokio::test]
    async fn restart_runs_a_fresh_loop() {
        let cycle = StubCycle::new(false);
        let (scheduler, _) = scheduler(cycle.clone(), Duration::from_secs(600));

        scheduler.start().await;
        wait_for(|| cycle.count() == 1).await;
        scheduler.stop().await;

        assert!(scheduler.start().await);
        wait_for(|| cycle.count() == 2).await;
        scheduler.stop().await;
    }
}
