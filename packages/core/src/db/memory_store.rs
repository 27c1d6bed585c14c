//! InMemoryStore - NodeStore Implementation backed by an in-process arena
//!
//! Nodes live in a map keyed by ID, with parent/child relationships expressed
//! purely as ID references. Two indexes are kept next to the arena:
//!
//! 1. **Child index** - parent ID → ordered child IDs, so children and
//!    descendant walks never scan the whole arena
//! 2. **Membership index** - member ID → node ID (or unassigned), plus the
//!    reverse node → members map used for hydration
//!
//! # Atomicity
//!
//! `commit` stages the batch against a copy of the state and swaps the copy in
//! only after every operation applied cleanly. Readers hold the read half of
//! the same lock, so they never observe a half-applied batch.
//!
//! # Snapshots
//!
//! The whole store can be written to and restored from a JSON snapshot.
//! Loading validates referential integrity and acyclicity, so a hand-edited
//! file cannot smuggle a cycle into the engine.

use crate::db::error::DatabaseError;
use crate::db::node_store::{NodeStore, StoreOperation};
use crate::models::{Node, NodeFilter, ParentFilter};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use tokio::sync::RwLock;

/// On-disk snapshot format
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// Nodes in breadth-first order from the roots, so child order survives a round trip
    nodes: Vec<Node>,

    /// member ID → node ID; unassigned members are not recorded
    ///
    /// `null` values are accepted on load and dropped.
    #[serde(default)]
    memberships: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    nodes: HashMap<String, Node>,
    children: HashMap<String, Vec<String>>,
    memberships: BTreeMap<String, String>,
    node_members: HashMap<String, BTreeSet<String>>,
}

impl StoreState {
    fn hydrate(&self, node: &Node) -> Node {
        let mut hydrated = node.clone();
        hydrated.child_ids = self.children.get(&node.id).cloned().unwrap_or_default();
        hydrated.member_ids = self
            .node_members
            .get(&node.id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        hydrated
    }

    fn get(&self, id: &str) -> Option<Node> {
        self.nodes.get(id).map(|node| self.hydrate(node))
    }

    fn unlink_child(&mut self, parent_id: &str, child_id: &str) {
        if let Some(siblings) = self.children.get_mut(parent_id) {
            siblings.retain(|id| id != child_id);
            if siblings.is_empty() {
                self.children.remove(parent_id);
            }
        }
    }

    fn link_child(&mut self, parent_id: &str, child_id: &str) {
        let siblings = self.children.entry(parent_id.to_string()).or_default();
        if !siblings.iter().any(|id| id == child_id) {
            siblings.push(child_id.to_string());
        }
    }

    fn unassign(&mut self, member_id: &str) {
        if let Some(node_id) = self.memberships.remove(member_id) {
            if let Some(members) = self.node_members.get_mut(&node_id) {
                members.remove(member_id);
                if members.is_empty() {
                    self.node_members.remove(&node_id);
                }
            }
        }
    }

    fn apply(&mut self, operation: StoreOperation) -> Result<(), DatabaseError> {
        match operation {
            StoreOperation::Save(node) => {
                let node = node.without_derived();

                if let Some(parent_id) = &node.parent_id {
                    if !self.nodes.contains_key(parent_id) {
                        return Err(DatabaseError::missing_parent(&node.id, parent_id));
                    }
                }

                let previous_parent = self
                    .nodes
                    .get(&node.id)
                    .and_then(|existing| existing.parent_id.clone());

                if previous_parent != node.parent_id {
                    if let Some(old_parent) = &previous_parent {
                        self.unlink_child(old_parent, &node.id);
                    }
                }
                if let Some(parent_id) = &node.parent_id {
                    self.link_child(parent_id, &node.id);
                }

                self.nodes.insert(node.id.clone(), node);
            }
            StoreOperation::Remove { id } => {
                let node = self
                    .nodes
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| DatabaseError::missing_node(&id))?;

                if self.children.get(&id).is_some_and(|c| !c.is_empty()) {
                    return Err(DatabaseError::HasChildren { id });
                }

                if let Some(parent_id) = &node.parent_id {
                    self.unlink_child(parent_id, &id);
                }

                // Never leave memberships pointing at a removed node
                let members: Vec<String> = self
                    .node_members
                    .get(&id)
                    .map(|m| m.iter().cloned().collect())
                    .unwrap_or_default();
                for member_id in members {
                    self.unassign(&member_id);
                }

                self.nodes.remove(&id);
            }
            StoreOperation::AssignMember { member_id, node_id } => {
                if !self.nodes.contains_key(&node_id) {
                    return Err(DatabaseError::missing_node(node_id));
                }
                self.unassign(&member_id);
                self.memberships.insert(member_id.clone(), node_id.clone());
                self.node_members
                    .entry(node_id)
                    .or_default()
                    .insert(member_id);
            }
            StoreOperation::UnassignMember { member_id } => {
                self.unassign(&member_id);
            }
            StoreOperation::DetachMembers { node_id } => {
                let members: Vec<String> = self
                    .node_members
                    .get(&node_id)
                    .map(|m| m.iter().cloned().collect())
                    .unwrap_or_default();
                for member_id in members {
                    self.unassign(&member_id);
                }
            }
        }

        Ok(())
    }

    /// Breadth-first walk below `id`, each node at most once
    fn descendants_of(&self, id: &str) -> Vec<Node> {
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(id);

        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            let Some(child_ids) = self.children.get(current) else {
                continue;
            };
            for child_id in child_ids {
                if !visited.insert(child_id.as_str()) {
                    tracing::warn!("Descendant walk revisited {}; skipping", child_id);
                    continue;
                }
                if let Some(child) = self.get(child_id) {
                    result.push(child);
                }
                queue.push_back(child_id.as_str());
            }
        }

        result
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self, DatabaseError> {
        let mut state = StoreState::default();

        for node in &snapshot.nodes {
            node.validate().map_err(|e| {
                DatabaseError::corrupt_snapshot(format!("invalid node {:?}: {}", node.id, e))
            })?;
            if state.nodes.contains_key(&node.id) {
                return Err(DatabaseError::corrupt_snapshot(format!(
                    "duplicate node id {}",
                    node.id
                )));
            }
            state
                .nodes
                .insert(node.id.clone(), node.clone().without_derived());
        }

        // Link children in file order so sibling order is preserved
        for node in &snapshot.nodes {
            if let Some(parent_id) = &node.parent_id {
                if !state.nodes.contains_key(parent_id) {
                    return Err(DatabaseError::corrupt_snapshot(format!(
                        "node {} references missing parent {}",
                        node.id, parent_id
                    )));
                }
                state.link_child(parent_id, &node.id);
            }
        }

        // Every parent chain must reach a root within |nodes| steps
        let limit = state.nodes.len();
        for node in state.nodes.values() {
            let mut current = node.parent_id.as_deref();
            let mut steps = 0;
            while let Some(parent_id) = current {
                steps += 1;
                if parent_id == node.id || steps > limit {
                    return Err(DatabaseError::corrupt_snapshot(format!(
                        "parent cycle through node {}",
                        node.id
                    )));
                }
                current = state
                    .nodes
                    .get(parent_id)
                    .and_then(|parent| parent.parent_id.as_deref());
            }
        }

        for (member_id, node_id) in snapshot.memberships {
            let Some(node_id) = node_id else {
                continue;
            };
            if !state.nodes.contains_key(&node_id) {
                return Err(DatabaseError::corrupt_snapshot(format!(
                    "member {} assigned to missing node {}",
                    member_id, node_id
                )));
            }
            state
                .node_members
                .entry(node_id.clone())
                .or_default()
                .insert(member_id.clone());
            state.memberships.insert(member_id, node_id);
        }

        Ok(state)
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut roots: Vec<&Node> = self
            .nodes
            .values()
            .filter(|node| node.parent_id.is_none())
            .collect();
        roots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for root in roots {
            nodes.push(root.clone());
            nodes.extend(
                self.descendants_of(&root.id)
                    .into_iter()
                    .map(Node::without_derived),
            );
        }

        Snapshot {
            nodes,
            memberships: self
                .memberships
                .iter()
                .map(|(member_id, node_id)| (member_id.clone(), Some(node_id.clone())))
                .collect(),
        }
    }
}

/// NodeStore implementation keeping the whole hierarchy in memory
///
/// Cheap to construct and fully transactional, which makes it the default
/// backend for tests, the dev tool, and embedded use. Snapshot files give it
/// durability between runs.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a store from a JSON snapshot file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The file cannot be read
    /// - The file is not a valid snapshot document
    /// - The snapshot has duplicate IDs, dangling parents, parent cycles or
    ///   memberships pointing at missing nodes
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DatabaseError::snapshot_io(path, e))?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        let state = StoreState::from_snapshot(snapshot)?;

        tracing::info!(
            "Loaded snapshot {} ({} nodes)",
            path.display(),
            state.nodes.len()
        );

        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Write the current state to a JSON snapshot file
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), DatabaseError> {
        let path = path.as_ref();
        let snapshot = self.state.read().await.to_snapshot();
        let contents = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DatabaseError::snapshot_io(parent, e))?;
            }
        }
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| DatabaseError::snapshot_io(path, e))?;

        tracing::debug!(
            "Wrote snapshot {} ({} nodes)",
            path.display(),
            snapshot.nodes.len()
        );
        Ok(())
    }

    /// Number of stored nodes
    pub async fn len(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl NodeStore for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.state.read().await.get(id))
    }

    async fn find_all(&self, filter: &NodeFilter) -> Result<Vec<Node>> {
        let state = self.state.read().await;

        // Narrow the candidate set through the indexes before filtering
        let candidates: Vec<Node> = if let Some(member_id) = &filter.member_id {
            state
                .memberships
                .get(member_id)
                .and_then(|node_id| state.get(node_id))
                .into_iter()
                .collect()
        } else if let Some(ParentFilter::Of(parent_id)) = &filter.parent {
            state
                .children
                .get(parent_id)
                .map(|ids| ids.iter().filter_map(|id| state.get(id)).collect())
                .unwrap_or_default()
        } else {
            state.nodes.values().map(|node| state.hydrate(node)).collect()
        };

        Ok(candidates
            .into_iter()
            .filter(|node| filter.matches(node))
            .collect())
    }

    async fn find_descendants(&self, node: &Node) -> Result<Vec<Node>> {
        Ok(self.state.read().await.descendants_of(&node.id))
    }

    async fn find_member_assignment(&self, member_id: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .memberships
            .get(member_id)
            .cloned())
    }

    async fn commit(&self, operations: Vec<StoreOperation>) -> Result<()> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();
        let count = operations.len();

        for operation in operations {
            let kind = operation.kind();
            staged.apply(operation).map_err(|e| {
                tracing::debug!("Rolling back batch of {} at {}: {}", count, kind, e);
                anyhow::Error::new(e).context(format!("Store commit failed at {}", kind))
            })?;
        }

        *state = staged;
        Ok(())
    }
}
