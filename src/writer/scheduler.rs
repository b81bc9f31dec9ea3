use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use crate::core::config::MAX_PERSIST_INTERVAL_SECS;
use crate::core::error::{Error, ErrorKind, Result};

/// Something the scheduler can ask to persist itself.
pub trait PersistTarget: Send + Sync + 'static {
    fn persist_now(&self) -> Result<()>;
}

/// Background task that persists the store on a fixed period.
///
/// Each tick runs the (blocking) persistence on tokio's blocking pool, so the
/// timer task and any `insert` caller never wait on disk I/O. Stopping only
/// cancels future ticks; a cycle already running is left to finish.
pub struct AutoPersistScheduler {
    target: Arc<dyn PersistTarget>,
    interval: Duration,
    shutdown_notify: Arc<Notify>,
    is_running: Arc<AtomicBool>,
    completed_cycles: Arc<AtomicU64>,
    task_handle: Option<JoinHandle<()>>,
}

impl AutoPersistScheduler {
    pub fn new(target: Arc<dyn PersistTarget>, interval: Duration) -> Self {
        AutoPersistScheduler {
            target,
            interval,
            shutdown_notify: Arc::new(Notify::new()),
            is_running: Arc::new(AtomicBool::new(false)),
            completed_cycles: Arc::new(AtomicU64::new(0)),
            task_handle: None,
        }
    }

    /// Spawn the timer on the current tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "auto-persist scheduler already running".to_string(),
            ));
        }
        validate_interval(self.interval)?;

        let handle = tokio::runtime::Handle::try_current().map_err(|_| {
            Error::new(
                ErrorKind::InvalidState,
                "auto-persist requires a tokio runtime".to_string(),
            )
        })?;

        // Fresh signals per run so a previous, still-draining task cannot
        // observe this run's state.
        self.shutdown_notify = Arc::new(Notify::new());
        self.is_running = Arc::new(AtomicBool::new(true));

        self.task_handle = Some(handle.spawn(persist_loop(
            self.target.clone(),
            self.shutdown_notify.clone(),
            self.is_running.clone(),
            self.completed_cycles.clone(),
            self.interval,
        )));

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "auto-persist started");
        Ok(())
    }

    /// Cancel the timer. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        let was_running = self.is_running.swap(false, Ordering::SeqCst);
        // notify_one stores a permit if the task is not parked on notified() yet.
        self.shutdown_notify.notify_one();
        // Detach rather than abort: an in-flight cycle runs to completion.
        self.task_handle.take();

        if was_running {
            tracing::info!("auto-persist stopped");
        }
        was_running
    }

    /// Restart the timer with a new period. A stopped scheduler only records it.
    pub fn reconfigure(&mut self, interval: Duration) -> Result<()> {
        validate_interval(interval)?;
        let was_running = self.stop();
        self.interval = interval;
        if was_running {
            self.start()?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Successful timer-driven persists since construction.
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles.load(Ordering::Relaxed)
    }
}

impl Drop for AutoPersistScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate_interval(interval: Duration) -> Result<()> {
    if interval.is_zero() {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            "persist interval must be non-zero".to_string(),
        ));
    }
    if interval > Duration::from_secs(MAX_PERSIST_INTERVAL_SECS) {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("persist interval {:?} exceeds the maximum of {}s", interval, MAX_PERSIST_INTERVAL_SECS),
        ));
    }
    Ok(())
}

async fn persist_loop(
    target: Arc<dyn PersistTarget>,
    shutdown_notify: Arc<Notify>,
    is_running: Arc<AtomicBool>,
    completed_cycles: Arc<AtomicU64>,
    period: Duration,
) {
    // First tick one full period after start, not immediately.
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = shutdown_notify.notified() => break,

            _ = ticker.tick() => {
                if !is_running.load(Ordering::SeqCst) {
                    break;
                }

                let target = target.clone();
                match tokio::task::spawn_blocking(move || target.persist_now()).await {
                    Ok(Ok(())) => {
                        completed_cycles.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(error = %e, "scheduled persist failed");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "scheduled persist task panicked");
                    }
                }
            }
        }
    }

    tracing::debug!("auto-persist loop exited");
}
