//! Node Data Structures
//!
//! This module defines the `Node` struct representing one organizational unit
//! (a department) and the request/response types that travel with it.
//!
//! # Architecture
//!
//! - **Arena by ID**: Nodes reference each other only through string IDs, never
//!   through ownership, so reparenting is a single field update
//! - **Derived Fields**: `child_ids` and `member_ids` are hydrated by the store
//!   on read and are never persisted independently
//! - **Single Parent**: `parent_id` is one optional value, not a set
//!
//! # Examples
//!
//! ```rust
//! use orgtree_core::models::Node;
//!
//! // Create a root department
//! let engineering = Node::new("Engineering".to_string(), None, None);
//!
//! // Create a child department
//! let platform = Node::new(
//!     "Platform".to_string(),
//!     Some("Runtime and infrastructure".to_string()),
//!     Some(engineering.id.clone()),
//! );
//! assert!(engineering.is_root());
//! assert_eq!(platform.parent_id.as_deref(), Some(engineering.id.as_str()));
//! ```

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

// Lowercase hyphenated UUID, the only ID format the engine issues
const UUID_PATTERN: &str = r"^[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}$";

/// Validation errors for Node operations
///
/// Raised before any store access, so a rejected request never touches storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Node name must not be empty")]
    EmptyName,

    #[error("Node name is {length} characters, limit is {max}")]
    NameTooLong { length: usize, max: usize },

    #[error("Invalid node ID format: {0}")]
    InvalidId(String),

    #[error("Member ID must not be empty")]
    EmptyMemberId,
}

/// Validate if a node ID is a well-formed identifier
///
/// # Examples
///
/// ```
/// # use orgtree_core::models::is_valid_node_id;
/// assert!(is_valid_node_id("550e8400-e29b-41d4-a716-446655440000"));
/// assert!(!is_valid_node_id("invalid"));
/// assert!(!is_valid_node_id("550E8400-E29B-41D4-A716-446655440000"));
/// ```
pub fn is_valid_node_id(node_id: &str) -> bool {
    static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
    let uuid_regex = UUID_REGEX.get_or_init(|| Regex::new(UUID_PATTERN).unwrap());

    uuid_regex.is_match(node_id)
}

/// Check an ID and turn a malformed one into a `ValidationError`
pub fn validate_node_id(node_id: &str) -> Result<(), ValidationError> {
    if is_valid_node_id(node_id) {
        Ok(())
    } else {
        Err(ValidationError::InvalidId(node_id.to_string()))
    }
}

/// Longest accepted display name, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// Check a display name and return it trimmed
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let length = trimmed.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong {
            length,
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(trimmed.to_string())
}

/// One organizational unit in the hierarchy.
///
/// # Fields
///
/// - `id`: UUID issued on creation, immutable afterwards
/// - `name`: Non-empty display name
/// - `description`: Optional free text
/// - `parent_id`: Parent node ID, `None` for roots
/// - `child_ids`: Direct children, hydrated on read
/// - `member_ids`: Members assigned to this node, hydrated on read
/// - `created_at` / `modified_at`: Bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Display name
    pub name: String,

    /// Optional free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Parent node ID (None means this node is a root)
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Direct children in the order they were attached
    /// Read-only field, populated on query
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_ids: Vec<String>,

    /// Members currently assigned to this node
    /// Read-only field, populated on query from the membership index
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub member_ids: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,
}

impl Node {
    /// Create a new Node with auto-generated UUID
    ///
    /// The caller is responsible for validating `name` and checking that the
    /// parent exists; `HierarchyService::create_node` does both.
    pub fn new(name: String, description: Option<String>, parent_id: Option<String>) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            parent_id,
            child_ids: Vec::new(),
            member_ids: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Whether this node has no parent
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether this node currently has any children (requires a hydrated node)
    pub fn has_children(&self) -> bool {
        !self.child_ids.is_empty()
    }

    /// Drop the derived fields before handing the node to storage
    pub(crate) fn without_derived(mut self) -> Self {
        self.child_ids.clear();
        self.member_ids.clear();
        self
    }

    /// Mark the node as modified now
    pub(crate) fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Validate node structure and required fields
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if:
    /// - `id` or `parent_id` is not a well-formed ID
    /// - `name` is blank
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use orgtree_core::models::Node;
    /// let node = Node::new("Finance".to_string(), None, None);
    /// assert!(node.validate().is_ok());
    ///
    /// let blank = Node::new("   ".to_string(), None, None);
    /// assert!(blank.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_node_id(&self.id)?;
        validate_name(&self.name)?;
        if let Some(parent_id) = &self.parent_id {
            validate_node_id(parent_id)?;
        }
        Ok(())
    }
}

/// Custom deserializer for double-Option fields
///
/// Maps three input formats to the double-Option pattern:
/// - Missing field → None (don't update)
/// - null → Some(None) (clear)
/// - "value" → Some(Some("value")) (set to value)
fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    // Missing field is handled by #[serde(default)] on the struct field
    Ok(Some(Option::<T>::deserialize(deserializer)?))
}

/// Partial node update structure for PATCH operations
///
/// # Double-Option Pattern for Nullable Fields
///
/// `description` and `parent_id` distinguish three states:
///
/// - `None`: Don't change this field
/// - `Some(None)`: Clear the field (for `parent_id`, detach the node into a root)
/// - `Some(Some(value))`: Set the field to the specified value
///
/// "No parent change requested" and "explicit detach" are therefore distinct
/// inputs; an absent `parentId` never triggers a parent lookup.
///
/// # Examples
///
/// ```rust
/// # use orgtree_core::models::NodeUpdate;
/// // Rename only
/// let update = NodeUpdate::new().with_name("Platform Engineering".to_string());
/// assert!(update.parent_id.is_none());
///
/// // Detach from the current parent
/// let update = NodeUpdate::new().detach();
/// assert_eq!(update.parent_id, Some(None));
///
/// // Reparent
/// let update = NodeUpdate {
///     parent_id: Some(Some("550e8400-e29b-41d4-a716-446655440000".to_string())),
///     ..Default::default()
/// };
/// assert!(!update.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    /// Update display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Update description (`Some(None)` clears it)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub description: Option<Option<String>>,

    /// Update parent reference (`Some(None)` detaches)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_field"
    )]
    pub parent_id: Option<Option<String>>,
}

impl NodeUpdate {
    /// Create a new empty NodeUpdate
    pub fn new() -> Self {
        Self::default()
    }

    /// Set name update
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Set description update
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    /// Request a move under `parent_id`
    pub fn with_parent(mut self, parent_id: String) -> Self {
        self.parent_id = Some(Some(parent_id));
        self
    }

    /// Request detaching the node from its parent
    pub fn detach(mut self) -> Self {
        self.parent_id = Some(None);
        self
    }

    /// Check if update contains any changes
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.parent_id.is_none()
    }
}

/// Parent constraint for `NodeFilter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParentFilter {
    /// Only nodes without a parent
    Root,
    /// Only direct children of the given node
    Of(String),
}

/// Filter for `NodeStore::find_all`
///
/// All provided constraints must match. An empty filter matches every node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentFilter>,

    /// Only the node holding this member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,

    /// Case-insensitive substring match on the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
}

impl NodeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots() -> Self {
        Self {
            parent: Some(ParentFilter::Root),
            ..Default::default()
        }
    }

    pub fn children_of(parent_id: impl Into<String>) -> Self {
        Self {
            parent: Some(ParentFilter::Of(parent_id.into())),
            ..Default::default()
        }
    }

    pub fn with_member(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = Some(member_id.into());
        self
    }

    pub fn with_name_containing(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into());
        self
    }

    /// Check a hydrated node against the filter
    pub fn matches(&self, node: &Node) -> bool {
        let parent_ok = match &self.parent {
            None => true,
            Some(ParentFilter::Root) => node.parent_id.is_none(),
            Some(ParentFilter::Of(id)) => node.parent_id.as_deref() == Some(id.as_str()),
        };

        let member_ok = self
            .member_id
            .as_ref()
            .map_or(true, |m| node.member_ids.iter().any(|id| id == m));

        let name_ok = self.name_contains.as_ref().map_or(true, |needle| {
            node.name.to_lowercase().contains(&needle.to_lowercase())
        });

        parent_ok && member_ok && name_ok
    }
}

/// Result of a delete operation
///
/// Reports which memberships were detached in the same atomic commit that
/// removed the node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    /// ID of the removed node
    pub id: String,

    /// Members that became unassigned
    pub detached_member_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_creation() {
        let node = Node::new("Engineering".to_string(), None, None);

        assert!(is_valid_node_id(&node.id));
        assert_eq!(node.name, "Engineering");
        assert!(node.description.is_none());
        assert!(node.is_root());
        assert!(!node.has_children());
        assert_eq!(node.created_at, node.modified_at);
    }

    #[test]
    fn test_node_validation_rejects_bad_parent_id() {
        let node = Node::new("Sales".to_string(), None, Some("not-a-uuid".to_string()));
        assert_eq!(
            node.validate(),
            Err(ValidationError::InvalidId("not-a-uuid".to_string()))
        );
    }

    #[test]
    fn test_validate_name_trims() {
        assert_eq!(validate_name("  Legal \n").unwrap(), "Legal");
        assert_eq!(validate_name(" \t"), Err(ValidationError::EmptyName));
    }

    #[test]
    fn test_validate_name_caps_length_in_chars() {
        let at_limit = "é".repeat(MAX_NAME_LENGTH);
        assert_eq!(validate_name(&at_limit).unwrap(), at_limit);

        let padded = format!("  {}  ", "a".repeat(MAX_NAME_LENGTH));
        assert!(validate_name(&padded).is_ok());

        assert_eq!(
            validate_name(&"a".repeat(MAX_NAME_LENGTH + 1)),
            Err(ValidationError::NameTooLong {
                length: MAX_NAME_LENGTH + 1,
                max: MAX_NAME_LENGTH
            })
        );
    }

    #[test]
    fn test_node_serialization_uses_camel_case() {
        let mut node = Node::new("Ops".to_string(), None, None);
        node.child_ids.push("child".to_string());

        let value = serde_json::to_value(&node).unwrap();
        assert!(value.get("parentId").is_some());
        assert_eq!(value["childIds"], json!(["child"]));
        // Empty derived fields are skipped
        assert!(value.get("memberIds").is_none());
    }

    #[test]
    fn test_without_derived_clears_hydrated_fields() {
        let mut node = Node::new("Ops".to_string(), None, None);
        node.child_ids.push("a".to_string());
        node.member_ids.push("m".to_string());

        let stripped = node.without_derived();
        assert!(stripped.child_ids.is_empty());
        assert!(stripped.member_ids.is_empty());
    }

    #[test]
    fn test_node_update_double_option_deserialization() {
        // Missing field: leave unchanged
        let update: NodeUpdate = serde_json::from_value(json!({ "name": "New" })).unwrap();
        assert_eq!(update.parent_id, None);
        assert_eq!(update.description, None);

        // Explicit null: detach
        let update: NodeUpdate = serde_json::from_value(json!({ "parentId": null })).unwrap();
        assert_eq!(update.parent_id, Some(None));

        // Value: reparent
        let update: NodeUpdate =
            serde_json::from_value(json!({ "parentId": "abc", "description": null })).unwrap();
        assert_eq!(update.parent_id, Some(Some("abc".to_string())));
        assert_eq!(update.description, Some(None));
    }

    #[test]
    fn test_node_update_is_empty() {
        assert!(NodeUpdate::new().is_empty());
        assert!(!NodeUpdate::new().detach().is_empty());
        assert!(!NodeUpdate::new().with_description(None).is_empty());
    }

    #[test]
    fn test_node_filter_matches() {
        let root = Node::new("Research".to_string(), None, None);
        let mut child = Node::new("Applied Research".to_string(), None, Some(root.id.clone()));
        child.member_ids.push("emp-1".to_string());

        assert!(NodeFilter::roots().matches(&root));
        assert!(!NodeFilter::roots().matches(&child));
        assert!(NodeFilter::children_of(root.id.clone()).matches(&child));
        assert!(NodeFilter::new().with_member("emp-1").matches(&child));
        assert!(!NodeFilter::new().with_member("emp-2").matches(&child));
        assert!(NodeFilter::new().with_name_containing("APPLIED").matches(&child));
        assert!(NodeFilter::new().matches(&root));
    }
}
