//! Level-triggered latches
//!
//! The session exposes its lifecycle through latches rather than one-shot
//! signals: a latch stays open until explicitly closed, so a waiter that
//! arrives late still falls through immediately. Built on a watch channel,
//! which gives exactly those semantics.

use tokio::sync::watch;

/// A boolean gate waiters can block on
#[derive(Debug)]
pub struct Latch {
    state: watch::Sender<bool>,
}

impl Latch {
    #[must_use]
    pub fn new(open: bool) -> Self {
        let (state, _) = watch::channel(open);
        Self { state }
    }

    pub fn open(&self) {
        self.state.send_replace(true);
    }

    pub fn close(&self) {
        self.state.send_replace(false);
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.state.borrow()
    }

    /// Blocks until the latch is open; returns immediately if it already is
    pub async fn wait(&self) {
        let mut state = self.state.subscribe();
        while !*state.borrow_and_update() {
            if state.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new(false)
    }
}
