//! Session event surface
//!
//! Everything the session wants a frontend to know arrives as a
//! [`SessionEvent`] through registered handlers. Dispatch is synchronous
//! and in emission order; handlers are expected to hand work off rather
//! than block, since events are emitted from the session's own tasks.

use std::sync::{Arc, RwLock};

use lnxsend_core::domain::ids::{TransactionId, UserId};
use lnxsend_core::domain::status::TransactionStatus;
use lnxsend_core::domain::user::User;

// ============================================================================
// SessionEvent
// ============================================================================

/// One observable fact about the session, in emission order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Connection health changed; `still_trying` distinguishes a retryable
    /// outage from a definitive failure
    ConnectionStatus {
        connected: bool,
        still_trying: bool,
        last_error: Option<String>,
    },
    /// A full model synchronization completed
    Synchronized,
    /// A transaction moved to a new status
    StatusChanged {
        transaction_id: TransactionId,
        status: TransactionStatus,
        failure_reason: Option<String>,
    },
    /// A ghost recipient was claimed by a registered account
    RecipientChanged {
        transaction_id: TransactionId,
        recipient_id: UserId,
    },
    /// A share link was followed
    LinkClicked {
        transaction_id: TransactionId,
        click_count: u32,
    },
    /// A contact relationship appeared
    NewContact { user: User },
    /// A contact relationship was severed
    DeletedContact { user_id: UserId },
    /// A favorite was removed on another device
    DeletedFavorite { user_id: UserId },
    /// Aggregate presence of a contact changed
    PresenceChanged { user_id: UserId, online: bool },
    /// An avatar finished downloading and is now cached
    AvatarAvailable { user_id: UserId },
    /// Free-form text from another account
    MessageReceived { sender_id: UserId, message: String },
}

impl SessionEvent {
    /// Returns the kind name as a string, for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            SessionEvent::ConnectionStatus { .. } => "connection_status",
            SessionEvent::Synchronized => "synchronized",
            SessionEvent::StatusChanged { .. } => "status_changed",
            SessionEvent::RecipientChanged { .. } => "recipient_changed",
            SessionEvent::LinkClicked { .. } => "link_clicked",
            SessionEvent::NewContact { .. } => "new_contact",
            SessionEvent::DeletedContact { .. } => "deleted_contact",
            SessionEvent::DeletedFavorite { .. } => "deleted_favorite",
            SessionEvent::PresenceChanged { .. } => "presence_changed",
            SessionEvent::AvatarAvailable { .. } => "avatar_available",
            SessionEvent::MessageReceived { .. } => "message_received",
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Receives session events as they happen
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &SessionEvent);
}

/// Wraps a closure as an [`EventHandler`]
pub struct CallbackHandler<F>
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: &SessionEvent) {
        (self.callback)(event)
    }
}

// ============================================================================
// EventDispatcher
// ============================================================================

/// Fans one event out to every registered handler
#[derive(Default)]
pub(crate) struct EventDispatcher {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().unwrap().push(handler);
    }

    pub fn clear_handlers(&self) {
        self.handlers.write().unwrap().clear();
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().unwrap().len()
    }

    /// Delivers `event` to every handler, in registration order
    pub fn dispatch(&self, event: &SessionEvent) {
        let handlers = self.handlers.read().unwrap().clone();
        for handler in &handlers {
            handler.on_event(event);
        }
    }
}
