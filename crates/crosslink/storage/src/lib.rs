//! Crosslink storage abstractions.
//!
//! This crate defines the storage contract for the linking service:
//! - identity records (the durable primary/secondary mapping)
//! - verification records (in-flight proof-of-control attempts)
//! - single-use session tokens
//! - an append-only, hash-linked audit trail
//!
//! Design stance:
//! - The stores are the sole arbiters of the uniqueness invariants; the
//!   orchestrator mutates only through these traits.
//! - The in-memory adapter is deterministic and test-friendly. Production
//!   deployments should use a transactional backend for source-of-truth
//!   data.

#![deny(unsafe_code)]
#![warn(rust_2018_idioms)]

mod error;
pub mod memory;
mod model;
mod traits;

pub use error::{StorageError, StorageResult};
pub use model::{AuditAppend, AuditRecord, QueryWindow, SweepOutcome};
pub use traits::{AuditStore, IdentityStore, LinkStorage, TokenStore, VerificationStore};
