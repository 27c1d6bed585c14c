//! Business Services
//!
//! This module contains the hierarchy engine:
//!
//! - `HierarchyService` - node lifecycle, reparenting, memberships and events
//! - `HierarchyTraversal` - children, descendants, descendant trees and ancestors
//! - `HierarchyConfig` - timeouts and channel sizing
//!
//! Services coordinate between the store layer and callers, enforcing the
//! tree invariants and mapping store failures to `HierarchyError`.

pub mod config;
pub mod error;
pub mod hierarchy_service;
mod store_access;
pub mod traversal;

pub use config::HierarchyConfig;
pub use error::HierarchyError;
pub use hierarchy_service::{CreateNodeParams, HierarchyService};
pub use traversal::HierarchyTraversal;
