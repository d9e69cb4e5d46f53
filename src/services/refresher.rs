/// Periodic refresher for the inbox.
/// Fetches shortly after the inbox becomes active, then on a fixed interval
/// until stopped. Stopping (or dropping the handle) cancels any fetch still in
/// flight, so nothing mutates the inbox after teardown.

use crate::config::RefreshConfig;
use crate::services::Messenger;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

pub struct Refresher {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Refresher {
    /// Start polling in a background task
    pub fn start(messenger: Arc<Messenger>, config: RefreshConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run(messenger, config, shutdown_rx));
        log::info!(
            "Refresher started (delay {:?}, interval {:?})",
            config.initial_delay,
            config.interval
        );

        Refresher {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop polling and wait for the task to wind down
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                log::error!("Refresher task ended abnormally: {}", e);
            }
        }
        log::info!("Refresher stopped");
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(messenger: Arc<Messenger>, config: RefreshConfig, mut shutdown: watch::Receiver<bool>) {
    tokio::select! {
        _ = time::sleep(config.initial_delay) => {}
        _ = shutdown.changed() => return,
    }

    let mut ticker = time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut first = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        tokio::select! {
            _ = tick(&messenger, first) => {}
            _ = shutdown.changed() => break,
        }
        first = false;
    }
}

/// One refresh cycle; failures keep the previous state
async fn tick(messenger: &Messenger, with_network: bool) {
    if with_network {
        if let Err(e) = messenger.refresh_network().await {
            log::warn!("Network refresh failed, keeping previous directory: {}", e);
        }
    }

    match messenger.refresh().await {
        Ok(true) => log::debug!("Inbox refreshed"),
        Ok(false) => log::debug!("Inbox refresh superseded by a newer fetch"),
        Err(e) if e.is_transient() => {
            log::warn!("Inbox refresh failed, keeping previous state: {}", e)
        }
        Err(e) => log::error!("Inbox refresh failed: {}", e),
    }
}
