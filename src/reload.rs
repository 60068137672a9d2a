//! Live-reload notifications.
//!
//! Pipelines and the watcher report finished work to a [`ReloadSink`]. In
//! development the sink is [`ReloadSink::Active`] and wraps a [`LiveReload`]
//! broadcast channel; the dev server subscribes to it and forwards each
//! [`ReloadEvent`] to connected browsers over server-sent events. In
//! production the sink is [`ReloadSink::Inactive`] and every call is a no-op.
//!
//! The watcher runs every task of a change burst inside a [`ReloadBurst`].
//! Full reloads requested while a burst is open are held back and sent once
//! when the last burst closes, after all of its tasks have written their
//! output. Stylesheet injections are never held.

use crate::config::BuildMode;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// Reload the whole page.
    Reload,
    /// Swap the stylesheet at this URL path without reloading.
    Inject { path: String },
    /// The server is going away; clients should close their stream.
    Shutdown,
}

#[derive(Debug, Default)]
struct Held {
    open: usize,
    reload: bool,
}

/// Broadcast transport shared by the pipelines, the watcher and the server.
#[derive(Debug, Clone)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadEvent>,
    held: Arc<Mutex<Held>>,
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            tx,
            held: Arc::new(Mutex::new(Held::default())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    pub fn reload(&self) {
        {
            let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            if held.open > 0 {
                tracing::trace!("reload held until the burst closes");
                held.reload = true;
                return;
            }
        }
        self.send(ReloadEvent::Reload);
    }

    pub fn inject(&self, path: impl Into<String>) {
        self.send(ReloadEvent::Inject { path: path.into() });
    }

    pub fn shutdown(&self) {
        self.send(ReloadEvent::Shutdown);
    }

    /// Hold full reloads until the returned guard is dropped.
    pub fn burst(&self) -> ReloadBurst {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .open += 1;
        ReloadBurst {
            live: Some(self.clone()),
        }
    }

    fn close_burst(&self) {
        let flush = {
            let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            held.open = held.open.saturating_sub(1);
            held.open == 0 && std::mem::take(&mut held.reload)
        };
        if flush {
            self.send(ReloadEvent::Reload);
        }
    }

    fn send(&self, event: ReloadEvent) {
        tracing::debug!(?event, clients = self.tx.receiver_count(), "live reload");
        // No connected browser is not an error.
        let _ = self.tx.send(event);
    }
}

/// Open change burst; sends the held reload, if any, on drop.
#[derive(Debug)]
pub struct ReloadBurst {
    live: Option<LiveReload>,
}

impl Drop for ReloadBurst {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.close_burst();
        }
    }
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

/// Where pipelines send reload notifications.
#[derive(Debug, Clone)]
pub enum ReloadSink {
    Active(LiveReload),
    Inactive,
}

impl ReloadSink {
    /// Active in development, inactive in production.
    pub fn for_mode(mode: BuildMode) -> Self {
        match mode {
            BuildMode::Development => ReloadSink::Active(LiveReload::new()),
            BuildMode::Production => ReloadSink::Inactive,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReloadSink::Active(_))
    }

    pub fn transport(&self) -> Option<&LiveReload> {
        match self {
            ReloadSink::Active(live) => Some(live),
            ReloadSink::Inactive => None,
        }
    }

    pub fn reload(&self) {
        if let ReloadSink::Active(live) = self {
            live.reload();
        }
    }

    pub fn inject(&self, path: impl Into<String>) {
        if let ReloadSink::Active(live) = self {
            live.inject(path);
        }
    }

    pub fn shutdown(&self) {
        if let ReloadSink::Active(live) = self {
            live.shutdown();
        }
    }

    /// See [`LiveReload::burst`]. Inactive sinks hold nothing.
    pub fn burst(&self) -> ReloadBurst {
        match self {
            ReloadSink::Active(live) => live.burst(),
            ReloadSink::Inactive => ReloadBurst { live: None },
        }
    }
}
