//! The single loop behind the watcher: debounce and auto-sync.
//!
//! ## Design
//!
//! One task selects over a merged set of inputs:
//! 1. stop signal: exit
//! 2. watch signal: (re)arm the debounce deadline `debounce` from now
//! 3. debounce deadline: run one rescan
//! 4. auto-sync tick (only when enabled): request a sync
//!
//! N changes inside one quiet window therefore produce exactly one rescan.
//! Rescans run inline and never overlap; syncs are only requested, the host
//! runs them elsewhere so a slow pass never stalls the loop.

use super::watcher::WatchSignal;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Work the loop delegates to its owner.
#[async_trait]
pub(crate) trait SchedulerHost: Send + Sync + 'static {
    /// Re-read the tracked directory and record differences.
    async fn rescan(&self);

    /// Start a sync pass without waiting for it.
    fn request_sync(&self);

    /// Report a failure of the OS watch.
    fn watch_failed(&self, message: String);
}

/// Timing of the loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SchedulerConfig {
    /// Quiet period before a rescan
    pub debounce: Duration,
    /// Auto-sync period; `None` disables the timer
    pub auto_sync: Option<Duration>,
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Run until `stop` fires or its sender is dropped.
pub(crate) async fn run_scheduler<H: SchedulerHost>(
    host: Arc<H>,
    config: SchedulerConfig,
    mut signals: mpsc::UnboundedReceiver<WatchSignal>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = config.auto_sync.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut deadline: Option<Instant> = None;
    let mut signals_open = true;
    let mut pending_events = 0usize;

    loop {
        tokio::select! {
            _ = &mut stop => {
                debug!("Scheduler stopping");
                break;
            }
            signal = signals.recv(), if signals_open => match signal {
                Some(WatchSignal::Changed(path)) => {
                    debug!(path = %path.display(), "Change observed, debouncing");
                    pending_events += 1;
                    deadline = Some(Instant::now() + config.debounce);
                }
                Some(WatchSignal::Failed(message)) => {
                    warn!(%message, "File watch reported an error");
                    host.watch_failed(message);
                }
                None => signals_open = false,
            },
            () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                debug!(events = pending_events, "Debounce window closed, rescanning");
                deadline = None;
                pending_events = 0;
                host.rescan().await;
            }
            () = next_tick(&mut ticker) => {
                debug!("Auto-sync tick");
                host.request_sync();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingHost {
        rescans: AtomicU32,
        syncs: AtomicU32,
        failures: AtomicU32,
    }

    #[async_trait]
    impl SchedulerHost for CountingHost {
        async fn rescan(&self) {
            self.rescans.fetch_add(1, Ordering::SeqCst);
        }

        fn request_sync(&self) {
            self.syncs.fetch_add(1, Ordering::SeqCst);
        }

        fn watch_failed(&self, _message: String) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        host: Arc<CountingHost>,
        tx: mpsc::UnboundedSender<WatchSignal>,
        stop: oneshot::Sender<()>,
        task: tokio::task::JoinHandle<()>,
    }

    fn spawn(debounce_ms: u64, auto_sync_ms: Option<u64>) -> Harness {
        let host = Arc::new(CountingHost::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop, stop_rx) = oneshot::channel();
        let config = SchedulerConfig {
            debounce: Duration::from_millis(debounce_ms),
            auto_sync: auto_sync_ms.map(Duration::from_millis),
        };
        let task = tokio::spawn(run_scheduler(Arc::clone(&host), config, rx, stop_rx));
        Harness {
            host,
            tx,
            stop,
            task,
        }
    }

    fn changed() -> WatchSignal {
        WatchSignal::Changed(PathBuf::from("/tmp/issues.jsonl"))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_triggers_one_rescan() {
        let h = spawn(500, None);

        for _ in 0..5 {
            h.tx.send(changed()).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(h.host.rescans.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.host.rescans.load(Ordering::SeqCst), 1);

        h.tx.send(changed()).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.host.rescans.load(Ordering::SeqCst), 2);

        h.stop.send(()).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn auto_sync_fires_every_interval() {
        let h = spawn(500, Some(1_000));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(h.host.syncs.load(Ordering::SeqCst), 3);

        h.stop.send(()).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_auto_sync_never_fires() {
        let h = spawn(500, None);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(h.host.syncs.load(Ordering::SeqCst), 0);

        h.stop.send(()).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn watch_failures_reach_the_host_and_dropping_stop_ends_loop() {
        let h = spawn(500, None);

        h.tx.send(WatchSignal::Failed("inotify limit".into())).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(h.host.failures.load(Ordering::SeqCst), 1);

        drop(h.stop);
        h.task.await.unwrap();
    }
}
