// Fixed-period background jobs whose lifetime is tied to a cancellation handle.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Work performed on every tick of a [`PeriodicTask`].
pub trait Periodic: Send + 'static {
    /// Returning `Break` stops the task without running `finish`.
    fn tick(&mut self) -> impl Future<Output = ControlFlow<()>> + Send;

    /// Runs once when the task is cancelled.
    fn finish(&mut self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Handle to a spawned periodic job. Dropping it cancels the job.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    cancel: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// The first tick fires one full period after spawning.
    pub fn spawn<P: Periodic>(name: &'static str, period: Duration, job: P) -> Self {
        let cancel = Arc::new(Notify::new());
        let handle = tokio::spawn(run(job, period, cancel.clone()));
        tracing::debug!(task = name, period_ms = period.as_millis(), "periodic task started");
        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Cancels the job and waits until its `finish` hook has run.
    pub async fn shutdown(mut self) {
        self.cancel.notify_one();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(task = self.name, error = %e, "periodic task panicked");
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        // `notify_one` stores a permit, so a job that is mid-tick still sees it.
        self.cancel.notify_one();
    }
}

async fn run<P: Periodic>(mut job: P, period: Duration, cancel: Arc<Notify>) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.notified() => {
                job.finish().await;
                break;
            }
            _ = interval.tick() => {
                if job.tick().await.is_break() {
                    break;
                }
            }
        }
    }
}
