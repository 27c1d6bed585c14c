//! Storage Layer
//!
//! This module defines how the hierarchy engine talks to durable storage:
//!
//! - `NodeStore` - async trait every backend implements (find, list,
//!   descendants, memberships, atomic commit)
//! - `StoreOperation` - one write inside an atomic batch
//! - `InMemoryStore` - arena-backed implementation with JSON snapshots
//! - `DomainEvent` - change notifications published after commits
//!
//! The engine never assumes a particular backend: a closure table, a
//! recursive SQL query, or the in-memory walk all satisfy `find_descendants`.

mod error;
pub mod events;
mod memory_store;
mod node_store;

pub use error::DatabaseError;
pub use events::{DomainEvent, HierarchyChange};
pub use memory_store::InMemoryStore;
pub use node_store::{NodeStore, StoreOperation};
