//! Push-connection adapter for LNXSend.
//!
//! The account server drives clients through a long-lived notification
//! connection. This crate owns the lifecycle of that connection:
//! dialing, the authentication handshake, server key pinning, and the
//! translation of raw transport frames into the [`Notification`] values
//! the session layer consumes.
//!
//! The adapter is transport-agnostic. It speaks to the wire through the
//! [`INotificationTransport`] port, so unit tests (and the session
//! integration tests) can script an in-memory transport instead of
//! opening sockets.
//!
//! [`Notification`]: lnxsend_core::ports::Notification
//! [`INotificationTransport`]: lnxsend_core::ports::INotificationTransport

mod push_channel;

pub use push_channel::PushChannel;
