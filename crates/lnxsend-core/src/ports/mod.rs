//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates or in the
//! host embedding the engine.
//!
//! ## Ports Overview
//!
//! - [`IAccountService`] - Stateless RPC surface of the account backend
//! - [`INotificationChannel`] - The persistent push connection, as the
//!   session consumes it
//! - [`INotificationTransport`] - The dialed wire under the channel
//!   adapter
//! - [`ITransferEngine`] - The opaque byte-moving collaborator
//! - [`IIdentityStore`] - Credential decryption and persistence

pub mod account_service;
pub mod identity_store;
pub mod notification_channel;
pub mod transfer_engine;

pub use account_service::{
    AccountError, Endpoint, IAccountService, LoginResponse, SynchronizeSnapshot,
};
pub use identity_store::{IIdentityStore, IdentityError};
pub use notification_channel::{
    ChannelError, INotificationChannel, INotificationStream, INotificationTransport, Notification,
};
pub use transfer_engine::{
    ITransferEngine, PhaseSink, TransferError, TransferOutcome, TransferPhase,
};
