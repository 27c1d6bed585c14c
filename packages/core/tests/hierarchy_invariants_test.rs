//! Hierarchy Invariant Tests
//!
//! Drives the engine through long sequences of moves, detaches and deletes
//! and checks after every step that the hierarchy is still a forest:
//! no node is its own ancestor and every node is reachable from a root.
//! Also races opposing moves to check that concurrent writers cannot
//! jointly create a cycle.

#[cfg(test)]
mod hierarchy_invariant_tests {
    use anyhow::Result;
    use orgtree_core::db::InMemoryStore;
    use orgtree_core::models::{Node, NodeFilter, NodeUpdate};
    use orgtree_core::services::{CreateNodeParams, HierarchyError, HierarchyService};
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;

    /// Small deterministic generator so failures are reproducible
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: usize) -> usize {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 33) as usize) % bound
        }
    }

    fn create_test_service() -> HierarchyService {
        HierarchyService::new(Arc::new(InMemoryStore::new()))
    }

    async fn create_nodes(service: &HierarchyService, count: usize) -> Result<Vec<Node>> {
        let mut nodes = Vec::with_capacity(count);
        for i in 0..count {
            nodes.push(
                service
                    .create_node(CreateNodeParams::new(format!("Dept {}", i)))
                    .await?,
            );
        }
        Ok(nodes)
    }

    /// Walk every parent chain from a full listing; panics on a cycle or orphan
    async fn assert_forest(service: &HierarchyService) -> Result<()> {
        let nodes = service.list_nodes(NodeFilter::new()).await?;
        let parents: HashMap<String, Option<String>> = nodes
            .iter()
            .map(|n| (n.id.clone(), n.parent_id.clone()))
            .collect();

        for node in &nodes {
            let mut seen = HashSet::new();
            let mut current = Some(node.id.clone());
            while let Some(id) = current {
                assert!(seen.insert(id.clone()), "cycle through {}", id);
                let parent = parents
                    .get(&id)
                    .unwrap_or_else(|| panic!("dangling parent {}", id));
                current = parent.clone();
            }
        }

        // Every node is reachable from some root through descendants
        let mut reachable = 0;
        for root in service.roots().await? {
            reachable += 1 + service.descendants(&root.id).await?.len();
        }
        assert_eq!(reachable, nodes.len());
        Ok(())
    }

    #[tokio::test]
    async fn test_random_moves_preserve_forest() -> Result<()> {
        let service = create_test_service();
        let nodes = create_nodes(&service, 24).await?;
        let mut rng = Lcg(42);

        let mut accepted = 0;
        let mut rejected = 0;
        for _ in 0..400 {
            let node = &nodes[rng.next(nodes.len())];
            let target = &nodes[rng.next(nodes.len())];

            match rng.next(10) {
                0 => {
                    service
                        .update_node(&node.id, NodeUpdate::new().detach())
                        .await?;
                }
                _ => match service.move_node(&node.id, &target.id).await {
                    Ok(moved) => {
                        assert_eq!(moved.parent_id.as_deref(), Some(target.id.as_str()));
                        accepted += 1;
                    }
                    Err(HierarchyError::InvalidOperation(_)) => {
                        // Rejected moves are exactly the cyclic ones
                        assert!(
                            node.id == target.id
                                || service.is_descendant(&node.id, &target.id).await?
                        );
                        rejected += 1;
                    }
                    Err(other) => return Err(other.into()),
                },
            }

            assert_forest(&service).await?;
        }

        assert!(accepted > 0);
        assert!(rejected > 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ancestors_and_descendants_agree() -> Result<()> {
        let service = create_test_service();
        let nodes = create_nodes(&service, 16).await?;
        let mut rng = Lcg(7);

        for _ in 0..60 {
            let node = &nodes[rng.next(nodes.len())];
            let target = &nodes[rng.next(nodes.len())];
            let _ = service.move_node(&node.id, &target.id).await;
        }

        for node in &nodes {
            for ancestor in service.ancestors(&node.id).await? {
                assert!(service.is_descendant(&ancestor.id, &node.id).await?);
            }
            let descendants = service.descendants(&node.id).await?;
            assert!(descendants.iter().all(|d| d.id != node.id));

            let forest = service.descendant_tree(&node.id).await?;
            let total: usize = forest.iter().map(|t| t.size()).sum();
            assert_eq!(total, descendants.len());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_guard_holds_under_random_deletes() -> Result<()> {
        let service = create_test_service();
        let nodes = create_nodes(&service, 12).await?;
        let mut rng = Lcg(1234);

        for _ in 0..30 {
            let node = &nodes[rng.next(nodes.len())];
            let target = &nodes[rng.next(nodes.len())];
            let _ = service.move_node(&node.id, &target.id).await;
        }

        for node in &nodes {
            let before = service.get_node(&node.id).await;
            let result = service.delete_node(&node.id).await;
            match (before, result) {
                (Ok(existing), Err(HierarchyError::InvalidOperation(_))) => {
                    assert!(existing.has_children());
                }
                (Ok(existing), Ok(_)) => assert!(!existing.has_children()),
                (Err(HierarchyError::NotFound { .. }), Err(HierarchyError::NotFound { .. })) => {}
                (before, after) => panic!("unexpected {:?} / {:?}", before, after),
            }
            assert_forest(&service).await?;
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opposing_moves_never_cycle() -> Result<()> {
        for _ in 0..50 {
            let service = create_test_service();
            let a = service.create_node(CreateNodeParams::new("A")).await?;
            let b = service.create_node(CreateNodeParams::new("B")).await?;

            let first = {
                let service = service.clone();
                let (a, b) = (a.id.clone(), b.id.clone());
                tokio::spawn(async move { service.move_node(&a, &b).await })
            };
            let second = {
                let service = service.clone();
                let (a, b) = (a.id.clone(), b.id.clone());
                tokio::spawn(async move { service.move_node(&b, &a).await })
            };

            let results = [first.await?, second.await?];
            let succeeded = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(succeeded, 1, "exactly one opposing move may win");
            assert!(results
                .iter()
                .any(|r| matches!(r, Err(HierarchyError::InvalidOperation(_)))));

            assert_forest(&service).await?;
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mixed_writers_keep_forest() -> Result<()> {
        let service = create_test_service();
        let nodes = create_nodes(&service, 10).await?;

        let mut handles = Vec::new();
        for seed in 0..8u64 {
            let service = service.clone();
            let ids: Vec<String> = nodes.iter().map(|n| n.id.clone()).collect();
            handles.push(tokio::spawn(async move {
                let mut rng = Lcg(seed);
                for _ in 0..40 {
                    let node = &ids[rng.next(ids.len())];
                    let target = &ids[rng.next(ids.len())];
                    let _ = service.move_node(node, target).await;
                    let _ = service.descendants(node).await;
                }
            }));
        }
        for handle in handles {
            handle.await?;
        }

        assert_forest(&service).await?;
        Ok(())
    }
}
