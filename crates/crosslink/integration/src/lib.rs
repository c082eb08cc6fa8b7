//! Crosslink Integration - re-exports all core crates
#![deny(unsafe_code)]
pub use crosslink_guard;
pub use crosslink_platform;
pub use crosslink_service;
pub use crosslink_storage;
pub use crosslink_types;
