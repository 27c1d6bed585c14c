//! NodeStore Trait - Storage Abstraction Layer
//!
//! This module defines the `NodeStore` trait that abstracts persistence of
//! nodes, parent links and memberships. The hierarchy engine owns every
//! tree-shape invariant; a store is a record store keyed by node ID.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so that embedded and networked
//!    backends share one interface
//! 2. **Ownership Semantics**: Methods take ownership of values they persist
//! 3. **Error Handling**: Uses `anyhow::Result`; the service layer maps any
//!    store failure to `HierarchyError::Unavailable`
//! 4. **Atomic Batches**: Multi-step mutations are expressed as a list of
//!    `StoreOperation`s applied all-or-nothing by `commit`
//! 5. **Opaque Descendants**: `find_descendants` may be a closure table, a
//!    recursive query, or an in-memory walk
//!
//! # Examples
//!
//! ```rust
//! use orgtree_core::db::{InMemoryStore, NodeStore};
//! use orgtree_core::models::Node;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let store = InMemoryStore::new();
//! let node = store.save(Node::new("Finance".to_string(), None, None)).await?;
//! assert!(store.find_by_id(&node.id).await?.is_some());
//! # Ok(())
//! # }
//! ```

use crate::models::{Node, NodeFilter};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One write inside an atomic `commit`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum StoreOperation {
    /// Insert or replace a node record (derived fields are ignored)
    Save(Node),

    /// Remove a node record by ID
    Remove { id: String },

    /// Point a member at a node, replacing any previous assignment
    #[serde(rename_all = "camelCase")]
    AssignMember { member_id: String, node_id: String },

    /// Mark a member as unassigned
    #[serde(rename_all = "camelCase")]
    UnassignMember { member_id: String },

    /// Mark every member of a node as unassigned
    #[serde(rename_all = "camelCase")]
    DetachMembers { node_id: String },
}

impl StoreOperation {
    /// Operation name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            StoreOperation::Save(_) => "save",
            StoreOperation::Remove { .. } => "remove",
            StoreOperation::AssignMember { .. } => "assign_member",
            StoreOperation::UnassignMember { .. } => "unassign_member",
            StoreOperation::DetachMembers { .. } => "detach_members",
        }
    }
}

/// Abstraction layer for node persistence operations
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the service can be shared across
/// tasks behind an `Arc<dyn NodeStore>`.
///
/// # Hydration
///
/// Nodes returned by any `find_*` method carry `child_ids` and `member_ids`
/// reflecting the store's current state.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Get node by ID
    ///
    /// - `Ok(Some(node))` if the node exists
    /// - `Ok(None)` if it doesn't (not an error)
    /// - `Err(_)` if the backend failed
    async fn find_by_id(&self, id: &str) -> Result<Option<Node>>;

    /// List nodes matching `filter`, in no particular order
    async fn find_all(&self, filter: &NodeFilter) -> Result<Vec<Node>>;

    /// All transitive descendants of `node`, breadth-first, excluding `node`
    async fn find_descendants(&self, node: &Node) -> Result<Vec<Node>>;

    /// Node currently holding `member_id`, if any
    async fn find_member_assignment(&self, member_id: &str) -> Result<Option<String>>;

    /// Apply `operations` atomically: either all take effect or none do
    async fn commit(&self, operations: Vec<StoreOperation>) -> Result<()>;

    /// Upsert a single node and return its hydrated state
    async fn save(&self, node: Node) -> Result<Node> {
        let id = node.id.clone();
        self.commit(vec![StoreOperation::Save(node)]).await?;
        self.find_by_id(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Node {} not found after save", id))
    }

    /// Remove a single node
    async fn remove(&self, node: &Node) -> Result<()> {
        self.commit(vec![StoreOperation::Remove {
            id: node.id.clone(),
        }])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_operation_serialization_contract() {
        let op = StoreOperation::AssignMember {
            member_id: "emp-1".to_string(),
            node_id: "node-1".to_string(),
        };

        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            json!({ "op": "assignMember", "memberId": "emp-1", "nodeId": "node-1" })
        );
        assert_eq!(op.kind(), "assign_member");
    }
}
