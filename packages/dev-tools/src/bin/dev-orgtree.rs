//! Development Hierarchy CLI
//!
//! Standalone binary for inspecting and editing an org hierarchy stored in a
//! JSON snapshot. Each invocation loads the snapshot (or starts empty), runs
//! one command through `HierarchyService`, prints the result as pretty JSON
//! and writes the snapshot back if the command mutated anything.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin dev-orgtree -- create "Company"
//! cargo run --bin dev-orgtree -- create "Engineering" <company-id>
//! cargo run --bin dev-orgtree -- tree <company-id>
//! ORGTREE_SNAPSHOT=/tmp/org.json cargo run --bin dev-orgtree -- roots
//! ```
//!
//! # Environment Variables
//!
//! - `ORGTREE_SNAPSHOT`: Snapshot path (default: `orgtree.json`)
//! - `ORGTREE_STORE_TIMEOUT_MS`, `ORGTREE_EVENT_CAPACITY`: engine config
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use orgtree_core::db::InMemoryStore;
use orgtree_core::models::NodeUpdate;
use orgtree_core::services::{CreateNodeParams, HierarchyConfig, HierarchyService};
use serde::Serialize;

const DEFAULT_SNAPSHOT: &str = "orgtree.json";

const USAGE: &str = "\
Usage: dev-orgtree <command> [args]

Commands:
  create <name> [parent-id]     Create a node (root if no parent)
  get <id>                      Print one node
  rename <id> <name>            Change a node's name
  move <id> <parent-id>         Reparent a node
  detach <id>                   Make a node a root
  delete <id>                   Delete a childless node
  children <id>                 List direct children
  descendants <id>              List all descendants, breadth-first
  tree <id>                     Print the descendant tree
  ancestors <id>                Print the root-first ancestor chain
  is-descendant <ancestor-id> <id>
                                Whether <id> lies below <ancestor-id>
  roots                         List root nodes
  assign <node-id> <member-id>  Assign a member to a node
  unassign <member-id>          Remove a member from its node";

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn arg(args: &[String], index: usize, name: &str) -> anyhow::Result<String> {
    args.get(index)
        .cloned()
        .ok_or_else(|| anyhow!("Missing <{}>\n\n{}", name, USAGE))
}

async fn open_store(path: &Path) -> anyhow::Result<InMemoryStore> {
    if tokio::fs::try_exists(path).await? {
        InMemoryStore::load_snapshot(path)
            .await
            .with_context(|| format!("Failed to load snapshot {}", path.display()))
    } else {
        tracing::info!("No snapshot at {}, starting empty", path.display());
        Ok(InMemoryStore::new())
    }
}

/// Run one command; returns whether the hierarchy was mutated
async fn run(service: &HierarchyService, args: &[String]) -> anyhow::Result<bool> {
    let command = args.first().map(String::as_str).unwrap_or("help");

    let mutated = match command {
        "create" => {
            let mut params = CreateNodeParams::new(arg(args, 1, "name")?);
            if let Some(parent_id) = args.get(2) {
                params = params.with_parent(parent_id);
            }
            print_json(&service.create_node(params).await?)?;
            true
        }
        "get" => {
            print_json(&service.get_node(&arg(args, 1, "id")?).await?)?;
            false
        }
        "rename" => {
            let update = NodeUpdate::new().with_name(arg(args, 2, "name")?);
            print_json(&service.update_node(&arg(args, 1, "id")?, update).await?)?;
            true
        }
        "move" => {
            let node = service
                .move_node(&arg(args, 1, "id")?, &arg(args, 2, "parent-id")?)
                .await?;
            print_json(&node)?;
            true
        }
        "detach" => {
            let node = service
                .update_node(&arg(args, 1, "id")?, NodeUpdate::new().detach())
                .await?;
            print_json(&node)?;
            true
        }
        "delete" => {
            print_json(&service.delete_node(&arg(args, 1, "id")?).await?)?;
            true
        }
        "children" => {
            print_json(&service.children(&arg(args, 1, "id")?).await?)?;
            false
        }
        "descendants" => {
            print_json(&service.descendants(&arg(args, 1, "id")?).await?)?;
            false
        }
        "tree" => {
            print_json(&service.descendant_tree(&arg(args, 1, "id")?).await?)?;
            false
        }
        "ancestors" => {
            print_json(&service.ancestors(&arg(args, 1, "id")?).await?)?;
            false
        }
        "is-descendant" => {
            let below = service
                .is_descendant(&arg(args, 1, "ancestor-id")?, &arg(args, 2, "id")?)
                .await?;
            print_json(&below)?;
            false
        }
        "roots" => {
            print_json(&service.roots().await?)?;
            false
        }
        "assign" => {
            let node = service
                .assign_member(&arg(args, 1, "node-id")?, &arg(args, 2, "member-id")?)
                .await?;
            print_json(&node)?;
            true
        }
        "unassign" => {
            let node_id = service
                .unassign_member(&arg(args, 1, "member-id")?)
                .await?;
            print_json(&node_id)?;
            node_id.is_some()
        }
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            false
        }
        other => bail!("Unknown command {:?}\n\n{}", other, USAGE),
    };

    Ok(mutated)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let snapshot_path: PathBuf = env::var("ORGTREE_SNAPSHOT")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SNAPSHOT.to_string())
        .into();
    tracing::debug!("Snapshot: {}", snapshot_path.display());

    let store = Arc::new(open_store(&snapshot_path).await?);
    let service = HierarchyService::with_config(store.clone(), HierarchyConfig::from_env());

    let args: Vec<String> = env::args().skip(1).collect();
    if run(&service, &args).await? {
        store
            .save_snapshot(&snapshot_path)
            .await
            .with_context(|| format!("Failed to save snapshot {}", snapshot_path.display()))?;
        tracing::info!("Saved snapshot {}", snapshot_path.display());
    }

    Ok(())
}
