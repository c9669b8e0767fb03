//! Owned periodic background work.
//!
//! A [`BackgroundTask`] sleeps for a fixed interval, runs one tick, and starts
//! over. The next sleep only begins once the tick has finished, whatever its
//! outcome, so ticks never overlap. [`BackgroundTask::stop`] waits for an
//! in-flight tick before returning; dropping the task aborts it instead.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::MIN_INTERVAL;

pub struct BackgroundTask {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundTask {
    /// Spawn `tick` onto the current runtime, every `interval` until stopped.
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn spawn_periodic<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let interval = interval.max(MIN_INTERVAL);
        let (shutdown, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            log::debug!("Background task '{}' started ({:?} interval)", name, interval);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => tick().await,
                    _ = stopped.changed() => break,
                }
            }
            log::debug!("Background task '{}' stopped", name);
        });

        Self {
            name,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(error) = handle.await {
                log::warn!("Background task '{}' ended abnormally: {}", self.name, error);
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for BackgroundTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTask")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
