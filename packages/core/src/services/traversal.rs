//! Descendant & Ancestor Traversal
//!
//! Read-only views derived from parent links: direct children, the
//! transitive descendant set, a nested descendant forest, and the root-first
//! ancestor chain. Nothing here mutates state.
//!
//! Acyclicity is enforced when the hierarchy is mutated, not when it is
//! read, so traversal never fails for structural reasons. A store that does
//! contain a loop still cannot hang a walk: revisits are skipped and logged.
//!
//! `HierarchyService` wraps every method here in its read lock, which is what
//! gives a traversal a consistent snapshot. Calling `HierarchyTraversal`
//! directly is fine for single-writer setups and tests.

use crate::db::NodeStore;
use crate::models::{validate_node_id, Node, NodeFilter, TreeNode};
use crate::services::config::HierarchyConfig;
use crate::services::error::HierarchyError;
use crate::services::store_access::StoreAccess;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Traversal capability over a node store
#[derive(Clone)]
pub struct HierarchyTraversal {
    store: StoreAccess,
}

impl HierarchyTraversal {
    pub fn new(store: Arc<dyn NodeStore>, config: &HierarchyConfig) -> Self {
        Self {
            store: StoreAccess::new(store, config.store_timeout),
        }
    }

    /// Direct children of `id`, in attach order
    pub async fn children(&self, id: &str) -> Result<Vec<Node>, HierarchyError> {
        validate_node_id(id)?;
        let node = self.store.require(id).await?;

        let mut children = self.store.find_all(&NodeFilter::children_of(id)).await?;

        // Stores are free to list in any order; the hydrated child_ids are authoritative
        let position: HashMap<&str, usize> = node
            .child_ids
            .iter()
            .enumerate()
            .map(|(i, child_id)| (child_id.as_str(), i))
            .collect();
        children.sort_by_key(|child| {
            position
                .get(child.id.as_str())
                .copied()
                .unwrap_or(usize::MAX)
        });

        Ok(children)
    }

    /// All transitive descendants of `id`, breadth-first, `id` excluded
    pub async fn descendants(&self, id: &str) -> Result<Vec<Node>, HierarchyError> {
        validate_node_id(id)?;
        let node = self.store.require(id).await?;
        self.descendants_of(&node).await
    }

    pub(crate) async fn descendants_of(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        let descendants = self.store.find_descendants(node).await?;

        // Each node at most once, and never the start node itself
        let mut seen: HashSet<String> = HashSet::with_capacity(descendants.len());
        seen.insert(node.id.clone());
        Ok(descendants
            .into_iter()
            .filter(|d| {
                let fresh = seen.insert(d.id.clone());
                if !fresh {
                    tracing::warn!("Store returned {} twice below {}", d.id, node.id);
                }
                fresh
            })
            .collect())
    }

    /// Descendants of `id` materialized as a nested forest
    ///
    /// The top-level entries are the direct children of `id`, in the order
    /// they were first encountered; every other descendant hangs under its
    /// parent's entry.
    pub async fn descendant_tree(&self, id: &str) -> Result<Vec<TreeNode>, HierarchyError> {
        let descendants = self.descendants(id).await?;
        Ok(build_forest(descendants))
    }

    /// Ancestors of `id`, ordered from the topmost root down to the immediate parent
    pub async fn ancestors(&self, id: &str) -> Result<Vec<Node>, HierarchyError> {
        validate_node_id(id)?;
        let node = self.store.require(id).await?;

        let mut chain = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(node.id.clone());

        let mut next = node.parent_id;
        while let Some(parent_id) = next {
            if !visited.insert(parent_id.clone()) {
                tracing::warn!("Parent loop detected above {} at {}", id, parent_id);
                break;
            }
            match self.store.find_by_id(&parent_id).await? {
                Some(parent) => {
                    next = parent.parent_id.clone();
                    chain.push(parent);
                }
                None => {
                    tracing::warn!("Dangling parent {} above {}", parent_id, id);
                    break;
                }
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Whether `node_id` is among the descendants of `ancestor_id`
    pub async fn is_descendant(
        &self,
        ancestor_id: &str,
        node_id: &str,
    ) -> Result<bool, HierarchyError> {
        validate_node_id(node_id)?;
        let descendants = self.descendants(ancestor_id).await?;
        Ok(descendants.iter().any(|d| d.id == node_id))
    }
}

/// Attach each node under its parent's entry; nodes whose parent is outside
/// the set become top-level entries
fn build_forest(descendants: Vec<Node>) -> Vec<TreeNode> {
    let in_set: HashSet<String> = descendants.iter().map(|n| n.id.clone()).collect();

    let mut top_level: Vec<String> = Vec::new();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for node in &descendants {
        match &node.parent_id {
            Some(parent_id) if in_set.contains(parent_id) => adjacency
                .entry(parent_id.clone())
                .or_default()
                .push(node.id.clone()),
            _ => top_level.push(node.id.clone()),
        }
    }

    let mut node_map: HashMap<String, Node> = descendants
        .into_iter()
        .map(|node| (node.id.clone(), node))
        .collect();

    top_level
        .iter()
        .filter_map(|id| materialize(id, &mut node_map, &adjacency))
        .collect()
}

fn materialize(
    id: &str,
    node_map: &mut HashMap<String, Node>,
    adjacency: &HashMap<String, Vec<String>>,
) -> Option<TreeNode> {
    // Removing from the map guarantees each node is materialized once
    let node = node_map.remove(id)?;
    let children = adjacency
        .get(id)
        .map(|child_ids| {
            child_ids
                .iter()
                .filter_map(|child_id| materialize(child_id, node_map, adjacency))
                .collect()
        })
        .unwrap_or_default();

    Some(TreeNode { node, children })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_of(name: &str, parent: &Node) -> Node {
        Node::new(name.to_string(), None, Some(parent.id.clone()))
    }

    #[test]
    fn test_build_forest_nests_by_parent() {
        let root = Node::new("Root".to_string(), None, None);
        let c1 = child_of("C1", &root);
        let c2 = child_of("C2", &root);
        let g1 = child_of("G1", &c1);
        let gg1 = child_of("GG1", &g1);

        let forest = build_forest(vec![c1.clone(), c2.clone(), g1.clone(), gg1.clone()]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].node.id, c1.id);
        assert_eq!(forest[1].node.id, c2.id);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].node.id, g1.id);
        assert_eq!(forest[0].children[0].children[0].node.id, gg1.id);
        assert!(forest[1].children.is_empty());
    }

    #[test]
    fn test_build_forest_empty() {
        assert!(build_forest(Vec::new()).is_empty());
    }

    #[test]
    fn test_build_forest_keeps_first_encounter_order() {
        let root = Node::new("Root".to_string(), None, None);
        let b = child_of("B", &root);
        let a = child_of("A", &root);
        let b1 = child_of("B1", &b);
        let b2 = child_of("B2", &b);

        let forest = build_forest(vec![b.clone(), a.clone(), b2.clone(), b1.clone()]);
        let top: Vec<&str> = forest.iter().map(|t| t.node.name.as_str()).collect();
        assert_eq!(top, vec!["B", "A"]);
        let under_b: Vec<&str> = forest[0]
            .children
            .iter()
            .map(|t| t.node.name.as_str())
            .collect();
        assert_eq!(under_b, vec!["B2", "B1"]);
    }
}
