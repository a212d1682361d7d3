//! Entity store access layer
//!
//! Scoped CRUD over lists, tasks, organizations and memberships. All reads
//! and writes are parameterized by [`models::Environment`]; see
//! [`traits::EntityStore`] for the contract and the isolation invariant.

pub mod memory;
pub mod models;
pub mod rest;
pub mod traits;

pub use memory::MemoryStore;
pub use models::*;
pub use rest::RestStore;
pub use traits::EntityStore;
