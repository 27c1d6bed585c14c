//! Bounded access to the node store
//!
//! Every store call made by the engine goes through `StoreAccess`, which
//! applies the configured timeout and maps backend failures to
//! `HierarchyError::Unavailable`. Dropping the returned future abandons the
//! call, so a cancelled request issues no further store calls.

use crate::db::{NodeStore, StoreOperation};
use crate::models::{Node, NodeFilter};
use crate::services::error::HierarchyError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub(crate) struct StoreAccess {
    store: Arc<dyn NodeStore>,
    timeout: Duration,
}

impl StoreAccess {
    pub(crate) fn new(store: Arc<dyn NodeStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, HierarchyError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::warn!("Node store {} failed: {:#}", operation, e);
                Err(HierarchyError::unavailable(operation, format!("{:#}", e)))
            }
            Err(_) => {
                tracing::warn!("Node store {} timed out after {:?}", operation, self.timeout);
                Err(HierarchyError::unavailable(
                    operation,
                    format!("timed out after {:?}", self.timeout),
                ))
            }
        }
    }

    pub(crate) async fn find_by_id(&self, id: &str) -> Result<Option<Node>, HierarchyError> {
        self.bounded("find_by_id", self.store.find_by_id(id)).await
    }

    /// Like `find_by_id`, but a missing node is `NotFound`
    pub(crate) async fn require(&self, id: &str) -> Result<Node, HierarchyError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| HierarchyError::not_found(id))
    }

    pub(crate) async fn find_all(&self, filter: &NodeFilter) -> Result<Vec<Node>, HierarchyError> {
        self.bounded("find_all", self.store.find_all(filter)).await
    }

    pub(crate) async fn find_descendants(&self, node: &Node) -> Result<Vec<Node>, HierarchyError> {
        self.bounded("find_descendants", self.store.find_descendants(node))
            .await
    }

    pub(crate) async fn find_member_assignment(
        &self,
        member_id: &str,
    ) -> Result<Option<String>, HierarchyError> {
        self.bounded(
            "find_member_assignment",
            self.store.find_member_assignment(member_id),
        )
        .await
    }

    pub(crate) async fn commit(
        &self,
        operations: Vec<StoreOperation>,
    ) -> Result<(), HierarchyError> {
        self.bounded("commit", self.store.commit(operations)).await
    }
}
