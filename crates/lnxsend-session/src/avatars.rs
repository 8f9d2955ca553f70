//! Avatar download queue
//!
//! Avatar fetches are decoupled from the code that wants them: callers
//! enqueue an account id and a single consumer task downloads the images
//! one at a time, announcing each arrival as an event. Duplicate requests
//! collapse while a fetch is still pending.

use std::collections::HashSet;
use std::sync::Mutex;

use tokio::sync::Notify;

use lnxsend_core::domain::ids::UserId;

#[derive(Default)]
pub(crate) struct AvatarQueue {
    pending: Mutex<HashSet<UserId>>,
    ready: Notify,
}

impl AvatarQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one account for download; returns false if already queued
    pub fn request(&self, id: UserId) -> bool {
        let inserted = self.pending.lock().unwrap().insert(id);
        if inserted {
            self.ready.notify_one();
        }
        inserted
    }

    /// Takes one queued account, if any
    pub fn next(&self) -> Option<UserId> {
        let mut pending = self.pending.lock().unwrap();
        let id = pending.iter().next().copied()?;
        pending.remove(&id);
        Some(id)
    }

    /// Waits until a request arrives
    ///
    /// The consumer must re-check [`next`] after waking; a notification can
    /// race with a take that already drained the queue.
    ///
    /// [`next`]: AvatarQueue::next
    pub async fn wait(&self) {
        self.ready.notified().await;
    }

    pub fn clear(&self) {
        self.pending.lock().unwrap().clear();
    }
}
