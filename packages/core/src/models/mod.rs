//! Data Models
//!
//! This module contains the core data structures used throughout OrgTree:
//!
//! - `Node` - One organizational unit (department)
//! - `NodeUpdate` - Sparse update with explicit detach semantics
//! - `NodeFilter` - Constraints for store listings
//! - `TreeNode` - Nested view produced by descendant traversal

mod node;
mod tree;

pub use node::{
    is_valid_node_id, validate_name, validate_node_id, DeleteResult, Node, NodeFilter,
    NodeUpdate, ParentFilter, ValidationError, MAX_NAME_LENGTH,
};
pub use tree::TreeNode;
