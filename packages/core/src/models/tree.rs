//! Materialized descendant trees

use super::Node;
use serde::{Deserialize, Serialize};

/// One entry of a materialized descendant forest
///
/// The node is flattened into the JSON object and gets an extra `children`
/// array, which is always present (empty for leaves).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(flatten)]
    pub node: Node,

    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this entry's subtree, itself included
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Depth-first search for an entry by node ID
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_node_serializes_flat_with_children() {
        let parent = Node::new("Parent".to_string(), None, None);
        let child = Node::new("Child".to_string(), None, Some(parent.id.clone()));
        let child_id = child.id.clone();

        let mut entry = TreeNode::new(parent);
        entry.children.push(TreeNode::new(child));

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["name"], "Parent");
        assert_eq!(value["children"][0]["id"], child_id.as_str());
        assert_eq!(value["children"][0]["children"].as_array().unwrap().len(), 0);

        assert_eq!(entry.size(), 2);
        assert!(entry.find(&child_id).is_some());
        assert!(entry.find("missing").is_none());
    }
}
