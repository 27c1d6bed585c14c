//! Domain Events for the hierarchy engine
//!
//! Events follow the observer pattern: `HierarchyService` publishes them on a
//! tokio broadcast channel after a commit succeeds, and any number of
//! subscribers (audit log, cache invalidation, UI bridges) can listen without
//! coupling to the store implementation.
//!
//! # Event Flow
//!
//! 1. The service validates and commits a mutation
//! 2. On success, exactly one domain event per logical change is emitted
//! 3. Subscribers receive it asynchronously; lagging subscribers drop the oldest

use crate::models::Node;
use serde::{Deserialize, Serialize};

/// Parent change carried by `DomainEvent::NodeMoved`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyChange {
    pub node_id: String,
    pub old_parent_id: Option<String>,
    pub new_parent_id: Option<String>,
}

/// Domain events emitted by `HierarchyService`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DomainEvent {
    /// A new node was created
    #[serde(rename = "node:created")]
    NodeCreated(Node),

    /// Name or description changed
    #[serde(rename = "node:updated")]
    NodeUpdated(Node),

    /// Parent reference changed (includes detaching to root)
    #[serde(rename = "node:moved")]
    NodeMoved(HierarchyChange),

    /// A node was deleted together with its memberships
    #[serde(rename = "node:deleted", rename_all = "camelCase")]
    NodeDeleted {
        id: String,
        detached_member_ids: Vec<String>,
    },

    /// A member was assigned, possibly moving away from `previous_node_id`
    #[serde(rename = "member:assigned", rename_all = "camelCase")]
    MemberAssigned {
        member_id: String,
        node_id: String,
        previous_node_id: Option<String>,
    },

    /// A member became unassigned
    #[serde(rename = "member:unassigned", rename_all = "camelCase")]
    MemberUnassigned { member_id: String, node_id: String },
}

impl DomainEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            DomainEvent::NodeCreated(_) => "node:created",
            DomainEvent::NodeUpdated(_) => "node:updated",
            DomainEvent::NodeMoved(_) => "node:moved",
            DomainEvent::NodeDeleted { .. } => "node:deleted",
            DomainEvent::MemberAssigned { .. } => "member:assigned",
            DomainEvent::MemberUnassigned { .. } => "member:unassigned",
        }
    }

    /// ID of the node the event is about
    pub fn node_id(&self) -> &str {
        match self {
            DomainEvent::NodeCreated(node) | DomainEvent::NodeUpdated(node) => &node.id,
            DomainEvent::NodeMoved(change) => &change.node_id,
            DomainEvent::NodeDeleted { id, .. } => id,
            DomainEvent::MemberAssigned { node_id, .. }
            | DomainEvent::MemberUnassigned { node_id, .. } => node_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Contract test: the serialized `type` tag must match `event_type()`
    #[test]
    fn test_event_type_matches_serialized_tag() {
        let events = vec![
            DomainEvent::NodeCreated(Node::new("A".to_string(), None, None)),
            DomainEvent::NodeMoved(HierarchyChange {
                node_id: "n".to_string(),
                old_parent_id: None,
                new_parent_id: Some("p".to_string()),
            }),
            DomainEvent::NodeDeleted {
                id: "n".to_string(),
                detached_member_ids: vec!["m".to_string()],
            },
            DomainEvent::MemberUnassigned {
                member_id: "m".to_string(),
                node_id: "n".to_string(),
            },
        ];

        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.event_type());
        }
    }

    #[test]
    fn test_node_moved_is_flat_camel_case() {
        let event = DomainEvent::NodeMoved(HierarchyChange {
            node_id: "child".to_string(),
            old_parent_id: Some("a".to_string()),
            new_parent_id: None,
        });

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["nodeId"], "child");
        assert_eq!(value["oldParentId"], "a");
        assert!(value["newParentId"].is_null());
        assert_eq!(event.node_id(), "child");
    }
}
