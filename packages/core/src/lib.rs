//! OrgTree Core Hierarchy Engine
//!
//! This crate maintains an organizational hierarchy of nodes (departments,
//! teams, units) with parent/child relationships, and answers structural
//! queries over it.
//!
//! # Architecture
//!
//! - **Arena + ID links**: nodes are stored flat and refer to their parent by ID
//! - **Acyclic by construction**: every reparenting runs a descendant check
//!   under a hierarchy-wide write lock
//! - **Atomic commits**: each mutation reaches the store as one batch
//! - **Pluggable storage**: the engine talks to a `NodeStore` trait object
//!
//! # Modules
//!
//! - [`models`] - Data structures (Node, NodeUpdate, NodeFilter, TreeNode)
//! - [`db`] - Store abstraction, in-memory store, snapshots and domain events
//! - [`services`] - HierarchyService, traversal and configuration

pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use models::*;
pub use services::*;
