use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

struct ScheduledTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns at most one repeating refresh task.
///
/// The job runs once immediately and then once per period. Cycles never
/// overlap inside the task; a stop signal also interrupts an in-flight job.
#[derive(Default)]
pub struct RefreshScheduler {
    task: Mutex<Option<ScheduledTask>>,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false without spawning anything if a task is already running.
    pub fn start<F, Fut>(&self, period: Duration, job: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = stop_rx.changed() => break,
                }
                tokio::select! {
                    () = job() => {}
                    _ = stop_rx.changed() => break,
                }
            }
        });

        info!(period_secs = period.as_secs_f64(), "refresh scheduler started");
        *slot = Some(ScheduledTask { stop_tx, handle });
        true
    }

    /// Signals the running task and waits for it to exit. No-op when idle.
    pub async fn stop(&self) {
        let task = self.slot().take();
        let Some(task) = task else {
            return;
        };

        let _ = task.stop_tx.send(true);
        if let Err(e) = task.handle.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "refresh task ended abnormally");
        }
        info!("refresh scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    fn slot(&self) -> MutexGuard<'_, Option<ScheduledTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        let task = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::RefreshScheduler;

    fn counting_job(counter: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    async fn wait_for_runs(counter: &AtomicUsize, at_least: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while counter.load(Ordering::SeqCst) < at_least {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("scheduled job should run");
    }

    #[tokio::test]
    async fn runs_immediately_then_repeats() {
        let scheduler = RefreshScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        assert!(scheduler.start(Duration::from_millis(20), counting_job(&runs)));
        wait_for_runs(&runs, 3).await;

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_running() {
        let scheduler = RefreshScheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        assert!(scheduler.start(Duration::from_secs(60), counting_job(&first)));
        assert!(!scheduler.start(Duration::from_secs(60), counting_job(&second)));
        assert!(scheduler.is_running());

        wait_for_runs(&first, 1).await;
        assert_eq!(second.load(Ordering::SeqCst), 0);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_halts_further_runs_and_allows_restart() {
        let scheduler = RefreshScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        scheduler.start(Duration::from_millis(10), counting_job(&runs));
        wait_for_runs(&runs, 2).await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        let after_stop = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);

        assert!(scheduler.start(Duration::from_millis(10), counting_job(&runs)));
        wait_for_runs(&runs, after_stop + 1).await;
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_on_idle_scheduler_is_a_noop() {
        let scheduler = RefreshScheduler::new();
        scheduler.stop().await;
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn dropping_the_scheduler_aborts_its_task() {
        let runs = Arc::new(AtomicUsize::new(0));
        {
            let scheduler = RefreshScheduler::new();
            scheduler.start(Duration::from_millis(10), counting_job(&runs));
            wait_for_runs(&runs, 1).await;
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        let after_drop = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_drop);
    }
}
