//! LNXSend Session - The session and transaction engine
//!
//! The driving core of the client: owns login/logout, the push-notification
//! loop, model synchronization, and every transaction's state machine.
//! Collaborators (account service, push channel, transfer engine, identity
//! store) are injected as port trait objects; this crate contains no I/O of
//! its own beyond the snapshot files it writes through `lnxsend-store`.
//!
//! # Lifecycle
//!
//! ```text
//! logged_out ──login──▶ authenticating ──connect+sync──▶ logged_in
//!      ▲                     │  transient failure:            │
//!      │                     └── jittered retry ◀─────────────┤
//!      └───────── logout / kick-out / deadline ◀──────────────┘
//! ```
//!
//! Observers hook [`SessionEvent`] through [`Session::on_event`] or an
//! [`EventHandler`]; lifecycle milestones are also exposed as awaitable
//! latches (`wait_logged_in`, `wait_synchronized`, `wait_logged_out`).
//!
//! ## Key Components
//!
//! - [`Session`] - Construction, login/logout, transaction operations
//! - [`SessionEvent`] - The closed observer surface
//! - [`SessionError`] - Everything an operation can fail with

mod avatars;
mod dispatcher;
mod errors;
mod latch;
mod machine;
mod ops;
mod registry;
mod session;
mod users;

pub mod events;

pub use errors::SessionError;
pub use events::{CallbackHandler, EventHandler, SessionEvent};
pub use session::Session;
