//! Hierarchy Service - node lifecycle, reparenting and memberships
//!
//! `HierarchyService` is the engine's public surface. It owns every
//! tree-shape invariant:
//!
//! - **Acyclicity**: a node can never be moved under itself or one of its
//!   descendants
//! - **Referential integrity**: a parent must exist when it is referenced
//! - **Delete guard**: nodes with children cannot be deleted
//! - **Exclusive membership**: a member belongs to at most one node, and
//!   deleting a node detaches its members in the same commit
//!
//! # Concurrency
//!
//! A hierarchy-wide `RwLock` orders operations. Reads (including every
//! traversal) hold the read half for their whole duration, so they observe a
//! consistent snapshot. Mutations hold the write half from the first lookup
//! through the final commit, so a move's descendant check and its parent
//! write are one atomic unit with respect to other writers. All writes of an
//! operation go to the store as a single atomic batch; a cancelled operation
//! therefore leaves no partial writes behind.
//!
//! # Examples
//!
//! ```rust
//! use orgtree_core::db::InMemoryStore;
//! use orgtree_core::services::{CreateNodeParams, HierarchyService};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = HierarchyService::new(Arc::new(InMemoryStore::new()));
//!
//! let company = service.create_node(CreateNodeParams::new("Company")).await?;
//! let eng = service
//!     .create_node(CreateNodeParams::new("Engineering").with_parent(&company.id))
//!     .await?;
//!
//! let ancestors = service.ancestors(&eng.id).await?;
//! assert_eq!(ancestors[0].id, company.id);
//! # Ok(())
//! # }
//! ```

use crate::db::{DomainEvent, HierarchyChange, NodeStore, StoreOperation};
use crate::models::{
    validate_name, validate_node_id, DeleteResult, Node, NodeFilter, NodeUpdate, TreeNode,
    ValidationError,
};
use crate::services::config::HierarchyConfig;
use crate::services::error::HierarchyError;
use crate::services::store_access::StoreAccess;
use crate::services::traversal::HierarchyTraversal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

/// Parameters for `HierarchyService::create_node`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeParams {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Parent to attach to; `None` creates a root
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl CreateNodeParams {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }
}

fn validate_member_id(member_id: &str) -> Result<String, ValidationError> {
    let trimmed = member_id.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMemberId);
    }
    Ok(trimmed.to_string())
}

/// Organizational hierarchy engine
///
/// Cheap to clone: all state is behind `Arc`s, and clones share the same
/// hierarchy lock and event channel.
#[derive(Clone)]
pub struct HierarchyService {
    store: StoreAccess,

    /// Traversal capability, injected so alternative strategies can be used
    traversal: HierarchyTraversal,

    /// Orders readers against writers across the whole hierarchy
    hierarchy_lock: Arc<RwLock<()>>,

    /// Broadcast channel for domain events
    event_tx: broadcast::Sender<DomainEvent>,

    config: HierarchyConfig,
}

impl HierarchyService {
    /// Create a service over `store` with default configuration
    pub fn new(store: Arc<dyn NodeStore>) -> Self {
        Self::with_config(store, HierarchyConfig::default())
    }

    /// Create a service over `store` with explicit configuration
    pub fn with_config(store: Arc<dyn NodeStore>, config: HierarchyConfig) -> Self {
        let traversal = HierarchyTraversal::new(store.clone(), &config);
        Self::from_parts(store, traversal, config)
    }

    /// Compose a service from an explicitly constructed traversal capability
    pub fn from_parts(
        store: Arc<dyn NodeStore>,
        traversal: HierarchyTraversal,
        config: HierarchyConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            store: StoreAccess::new(store, config.store_timeout),
            traversal,
            hierarchy_lock: Arc::new(RwLock::new(())),
            event_tx,
            config,
        }
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    /// Subscribe to domain events emitted after successful commits
    pub fn subscribe_to_events(&self) -> broadcast::Receiver<DomainEvent> {
        self.event_tx.subscribe()
    }

    fn emit_event(&self, event: DomainEvent) {
        // No subscribers is not an error
        let _ = self.event_tx.send(event);
    }

    //
    // NODE LIFECYCLE
    //

    /// Create a node, optionally under an existing parent
    ///
    /// # Errors
    ///
    /// - `Validation` if the name is blank or the parent ID is malformed
    /// - `NotFound` if the parent does not exist
    /// - `Unavailable` if the store fails
    pub async fn create_node(&self, params: CreateNodeParams) -> Result<Node, HierarchyError> {
        let name = validate_name(&params.name)?;
        if let Some(parent_id) = &params.parent_id {
            validate_node_id(parent_id)?;
        }

        let _guard = self.hierarchy_lock.write().await;

        if let Some(parent_id) = &params.parent_id {
            self.store.require(parent_id).await?;
        }

        // A new node cannot be anyone's ancestor yet, so no cycle check here
        let node = Node::new(name, params.description, params.parent_id);
        self.store
            .commit(vec![StoreOperation::Save(node.clone())])
            .await?;

        info!(
            "Created node {} ({:?}) under {:?}",
            node.id, node.name, node.parent_id
        );
        self.emit_event(DomainEvent::NodeCreated(node.clone()));
        Ok(node)
    }

    /// Fetch a node hydrated with its parent reference, children and members
    pub async fn get_node(&self, id: &str) -> Result<Node, HierarchyError> {
        validate_node_id(id)?;
        let _guard = self.hierarchy_lock.read().await;
        self.store.require(id).await
    }

    /// Immediate parent of a node, `None` for roots
    pub async fn get_parent(&self, id: &str) -> Result<Option<Node>, HierarchyError> {
        validate_node_id(id)?;
        let _guard = self.hierarchy_lock.read().await;

        let node = self.store.require(id).await?;
        match node.parent_id {
            Some(parent_id) => self.store.find_by_id(&parent_id).await,
            None => Ok(None),
        }
    }

    /// Apply a sparse update
    ///
    /// `parent_id: Some(Some(p))` runs the reparenting checks when `p` differs
    /// from the current parent; `parent_id: Some(None)` detaches the node,
    /// which is a no-op for a root. All changes land in one commit.
    pub async fn update_node(&self, id: &str, update: NodeUpdate) -> Result<Node, HierarchyError> {
        validate_node_id(id)?;
        let new_name = update.name.as_deref().map(validate_name).transpose()?;
        if let Some(Some(parent_id)) = &update.parent_id {
            validate_node_id(parent_id)?;
        }

        let _guard = self.hierarchy_lock.write().await;
        let mut node = self.store.require(id).await?;

        let mut fields_changed = false;
        if let Some(name) = new_name {
            if name != node.name {
                node.name = name;
                fields_changed = true;
            }
        }
        if let Some(description) = update.description {
            if description != node.description {
                node.description = description;
                fields_changed = true;
            }
        }

        let mut parent_change = None;
        match update.parent_id {
            None => {}
            Some(None) => {
                // Removing an edge cannot introduce a cycle
                if let Some(old_parent) = node.parent_id.take() {
                    parent_change = Some(HierarchyChange {
                        node_id: node.id.clone(),
                        old_parent_id: Some(old_parent),
                        new_parent_id: None,
                    });
                }
            }
            Some(Some(new_parent)) => {
                if node.parent_id.as_deref() != Some(new_parent.as_str()) {
                    self.check_reparent(&node, &new_parent).await?;
                    parent_change = Some(HierarchyChange {
                        node_id: node.id.clone(),
                        old_parent_id: node.parent_id.replace(new_parent.clone()),
                        new_parent_id: Some(new_parent),
                    });
                }
            }
        }

        if !fields_changed && parent_change.is_none() {
            debug!("Update of {} changed nothing", id);
            return Ok(node);
        }

        node.touch();
        self.store
            .commit(vec![StoreOperation::Save(node.clone())])
            .await?;

        info!("Updated node {}", id);
        if fields_changed {
            self.emit_event(DomainEvent::NodeUpdated(node.clone()));
        }
        if let Some(change) = parent_change {
            self.emit_event(DomainEvent::NodeMoved(change));
        }
        Ok(node)
    }

    /// Delete a childless node and detach its members
    ///
    /// # Errors
    ///
    /// - `NotFound` if the node does not exist
    /// - `InvalidOperation` if the node still has children
    pub async fn delete_node(&self, id: &str) -> Result<DeleteResult, HierarchyError> {
        validate_node_id(id)?;

        let _guard = self.hierarchy_lock.write().await;
        let node = self.store.require(id).await?;

        if node.has_children() {
            warn!(
                "Rejected delete of {}: {} child node(s)",
                id,
                node.child_ids.len()
            );
            return Err(HierarchyError::invalid_operation(format!(
                "Cannot delete node {} with {} child node(s)",
                id,
                node.child_ids.len()
            )));
        }

        self.store
            .commit(vec![
                StoreOperation::DetachMembers {
                    node_id: node.id.clone(),
                },
                StoreOperation::Remove {
                    id: node.id.clone(),
                },
            ])
            .await?;

        info!(
            "Deleted node {} and detached {} member(s)",
            id,
            node.member_ids.len()
        );
        self.emit_event(DomainEvent::NodeDeleted {
            id: node.id.clone(),
            detached_member_ids: node.member_ids.clone(),
        });

        Ok(DeleteResult {
            id: node.id,
            detached_member_ids: node.member_ids,
        })
    }

    /// All nodes matching `filter`, sorted by name then ID
    pub async fn list_nodes(&self, filter: NodeFilter) -> Result<Vec<Node>, HierarchyError> {
        let _guard = self.hierarchy_lock.read().await;

        let mut nodes = self.store.find_all(&filter).await?;
        nodes.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(nodes)
    }

    /// All root nodes, sorted by name
    pub async fn roots(&self) -> Result<Vec<Node>, HierarchyError> {
        self.list_nodes(NodeFilter::roots()).await
    }

    //
    // REPARENTING
    //

    /// Move `id` under `new_parent_id`
    ///
    /// Both nodes must exist, and the new parent must be neither the node
    /// itself nor one of its descendants. Moving under the current parent
    /// succeeds without writing.
    pub async fn move_node(&self, id: &str, new_parent_id: &str) -> Result<Node, HierarchyError> {
        validate_node_id(id)?;
        validate_node_id(new_parent_id)?;

        let _guard = self.hierarchy_lock.write().await;
        let mut node = self.store.require(id).await?;

        self.check_reparent(&node, new_parent_id).await?;

        if node.parent_id.as_deref() == Some(new_parent_id) {
            debug!("Node {} already under {}", id, new_parent_id);
            return Ok(node);
        }

        let change = HierarchyChange {
            node_id: node.id.clone(),
            old_parent_id: node.parent_id.replace(new_parent_id.to_string()),
            new_parent_id: Some(new_parent_id.to_string()),
        };
        node.touch();
        self.store
            .commit(vec![StoreOperation::Save(node.clone())])
            .await?;

        info!(
            "Moved node {} from {:?} to {}",
            id, change.old_parent_id, new_parent_id
        );
        self.emit_event(DomainEvent::NodeMoved(change));
        Ok(node)
    }

    /// Reject a move that would make `node` its own ancestor
    ///
    /// Must be called while holding the write lock.
    async fn check_reparent(&self, node: &Node, new_parent_id: &str) -> Result<(), HierarchyError> {
        self.store.require(new_parent_id).await?;

        if new_parent_id == node.id {
            warn!("Rejected move of {} under itself", node.id);
            return Err(HierarchyError::invalid_operation(format!(
                "Node {} cannot be its own parent",
                node.id
            )));
        }

        let descendants = self.traversal.descendants_of(node).await?;
        if descendants.iter().any(|d| d.id == new_parent_id) {
            warn!(
                "Rejected move of {} under its descendant {}",
                node.id, new_parent_id
            );
            return Err(HierarchyError::invalid_operation(format!(
                "Cannot move node {} under its descendant {}",
                node.id, new_parent_id
            )));
        }

        Ok(())
    }

    //
    // TRAVERSAL
    //

    /// Direct children of a node
    pub async fn children(&self, id: &str) -> Result<Vec<Node>, HierarchyError> {
        let _guard = self.hierarchy_lock.read().await;
        self.traversal.children(id).await
    }

    /// Transitive descendants of a node, the node itself excluded
    pub async fn descendants(&self, id: &str) -> Result<Vec<Node>, HierarchyError> {
        let _guard = self.hierarchy_lock.read().await;
        self.traversal.descendants(id).await
    }

    /// Descendants of a node as a nested forest
    pub async fn descendant_tree(&self, id: &str) -> Result<Vec<TreeNode>, HierarchyError> {
        let _guard = self.hierarchy_lock.read().await;
        self.traversal.descendant_tree(id).await
    }

    /// Root-first ancestor chain ending at the immediate parent
    pub async fn ancestors(&self, id: &str) -> Result<Vec<Node>, HierarchyError> {
        let _guard = self.hierarchy_lock.read().await;
        self.traversal.ancestors(id).await
    }

    /// Whether `node_id` lies below `ancestor_id`
    pub async fn is_descendant(
        &self,
        ancestor_id: &str,
        node_id: &str,
    ) -> Result<bool, HierarchyError> {
        let _guard = self.hierarchy_lock.read().await;
        self.traversal.is_descendant(ancestor_id, node_id).await
    }

    //
    // MEMBERSHIPS
    //

    /// Assign `member_id` to a node, moving it away from any previous node
    pub async fn assign_member(
        &self,
        node_id: &str,
        member_id: &str,
    ) -> Result<Node, HierarchyError> {
        validate_node_id(node_id)?;
        let member_id = validate_member_id(member_id)?;

        let _guard = self.hierarchy_lock.write().await;
        let mut node = self.store.require(node_id).await?;

        let previous = self.store.find_member_assignment(&member_id).await?;
        if previous.as_deref() == Some(node_id) {
            debug!("Member {} already assigned to {}", member_id, node_id);
            return Ok(node);
        }

        self.store
            .commit(vec![StoreOperation::AssignMember {
                member_id: member_id.clone(),
                node_id: node.id.clone(),
            }])
            .await?;

        info!(
            "Assigned member {} to {} (previously {:?})",
            member_id, node_id, previous
        );
        self.emit_event(DomainEvent::MemberAssigned {
            member_id: member_id.clone(),
            node_id: node.id.clone(),
            previous_node_id: previous,
        });

        // No store I/O after the commit: the result is built from what was read
        node.member_ids.push(member_id);
        node.member_ids.sort();
        Ok(node)
    }

    /// Unassign a member; returns the node it was detached from
    pub async fn unassign_member(&self, member_id: &str) -> Result<Option<String>, HierarchyError> {
        let member_id = validate_member_id(member_id)?;

        let _guard = self.hierarchy_lock.write().await;
        let Some(node_id) = self.store.find_member_assignment(&member_id).await? else {
            return Ok(None);
        };

        self.store
            .commit(vec![StoreOperation::UnassignMember {
                member_id: member_id.clone(),
            }])
            .await?;

        info!("Unassigned member {} from {}", member_id, node_id);
        self.emit_event(DomainEvent::MemberUnassigned {
            member_id,
            node_id: node_id.clone(),
        });
        Ok(Some(node_id))
    }

    /// Node currently holding `member_id`
    pub async fn member_assignment(
        &self,
        member_id: &str,
    ) -> Result<Option<String>, HierarchyError> {
        let member_id = validate_member_id(member_id)?;
        let _guard = self.hierarchy_lock.read().await;
        self.store.find_member_assignment(&member_id).await
    }

    /// Members currently assigned to a node
    pub async fn members(&self, node_id: &str) -> Result<Vec<String>, HierarchyError> {
        validate_node_id(node_id)?;
        let _guard = self.hierarchy_lock.read().await;
        Ok(self.store.require(node_id).await?.member_ids)
    }
}

// Comprehensive tests in separate module
#[cfg(test)]
#[path = "hierarchy_service_test.rs"]
mod hierarchy_service_test;
