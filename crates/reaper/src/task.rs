//! Periodic background task with a one-shot start gate.

use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{runtime::Handle, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Owns the single periodic loop of one reaper instance.
///
/// [`start`](Self::start) spawns the loop at most once per instance, however
/// many callers race it. The loop exits when either the caller's token or
/// this task's own stop token is cancelled.
#[derive(Debug)]
pub(crate) struct BackgroundTask {
    name: &'static str,
    started: AtomicBool,
    stop: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundTask {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            started: AtomicBool::new(false),
            stop: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Spawns the loop, running `cycle` every `period`.
    ///
    /// Returns `false` without doing anything if the task was already started
    /// or if no Tokio runtime is current. In the latter case a later call from
    /// within a runtime can still start it.
    pub(crate) fn start<F, Fut>(&self, cancel: &CancellationToken, period: Duration, cycle: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::warn!(task = self.name, error = %err, "cannot start task outside a Tokio runtime");
                return false;
            },
        };
        if self.started.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err()
        {
            return false;
        }

        let handle = runtime.spawn(run_periodic(
            self.name,
            period,
            cancel.clone(),
            self.stop.clone(),
            cycle,
        ));
        *self.handle.lock() = Some(handle);
        tracing::info!(task = self.name, ?period, "task started");
        true
    }

    /// Returns `true` once [`start`](Self::start) has succeeded.
    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Stops the loop and waits for an in-flight cycle to finish.
    pub(crate) async fn shutdown(&self) {
        self.stop.cancel();
        // Take the handle so the lock is not held across the await.
        let handle = self.handle.lock().take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::warn!(task = self.name, error = %err, "task panicked");
        }
    }
}

async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    stop: CancellationToken,
    mut cycle: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; consume it so the first cycle runs
    // one full period after start.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = stop.cancelled() => break,
            _ = ticker.tick() => cycle().await,
        }
    }

    tracing::info!(task = name, "task stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    fn counting_cycle(
        counter: &Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_waits_one_period() {
        let task = BackgroundTask::new("test");
        let cycles = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        assert!(task.start(&cancel, Duration::from_secs(10), counting_cycle(&cycles)));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(cycles.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cycles.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(cycles.load(Ordering::SeqCst), 3);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_noop() {
        let task = BackgroundTask::new("test");
        let cycles = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        assert!(task.start(&cancel, Duration::from_secs(1), counting_cycle(&cycles)));
        assert!(!task.start(&cancel, Duration::from_secs(1), counting_cycle(&cycles)));
        assert!(task.is_started());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        // A second loop would have doubled the count.
        assert_eq!(cycles.load(Ordering::SeqCst), 1);

        task.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_loop() {
        let task = BackgroundTask::new("test");
        let cycles = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        task.start(&cancel, Duration::from_secs(1), counting_cycle(&cycles));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        cancel.cancel();
        let handle = task.handle.lock().take().expect("handle stored");
        handle.await.expect("loop exits cleanly");

        let seen = cycles.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(cycles.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop_and_cannot_restart() {
        let task = BackgroundTask::new("test");
        let cycles = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        task.start(&cancel, Duration::from_secs(1), counting_cycle(&cycles));

        task.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(cycles.load(Ordering::SeqCst), 0);
        assert!(!task.start(&cancel, Duration::from_secs(1), counting_cycle(&cycles)));
        assert!(!cancel.is_cancelled(), "shutdown must not cancel the caller's token");
    }

    #[test]
    fn test_start_outside_runtime_leaves_gate_open() {
        let task = BackgroundTask::new("test");
        let cycles = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        assert!(!task.start(&cancel, Duration::from_secs(1), counting_cycle(&cycles)));
        assert!(!task.is_started());

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            assert!(task.start(&cancel, Duration::from_secs(1), counting_cycle(&cycles)));
            assert!(task.is_started());
            task.shutdown().await;
        });
    }

    #[tokio::test]
    async fn test_shutdown_before_start_is_noop() {
        let task = BackgroundTask::new("test");
        task.shutdown().await;
        assert!(!task.is_started());
    }
}
