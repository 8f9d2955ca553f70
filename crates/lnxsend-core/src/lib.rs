//! LNXSend Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `TransactionRecord`, `TransactionStatus`, `User`,
//!   `Device`, `GhostCode`, server-pushed `Configuration`
//! - **Port definitions** - Traits for adapters: `IAccountService`,
//!   `INotificationChannel`, `ITransferEngine`, `IIdentityStore`
//! - **State machine** - The transaction status lifecycle and its
//!   per-role final sets
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external
//! dependencies. Ports define trait interfaces that adapter crates (and the
//! session engine's test fakes) implement.

pub mod config;
pub mod domain;
pub mod ports;
