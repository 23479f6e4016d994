//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `nodetree_core` linkage without the Flutter/FFI runtime.
//! - Inspect and edit a tree store from a terminal.

use clap::{Parser, Subcommand};
use nodetree_core::{open_store, KeyValueStore, TreeManager, TreeState, TREE_STORE_KEY};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "nodetree_cli", version, about = "Inspect a NodeTree store")]
struct Cli {
    /// SQLite store file.
    #[arg(long, env = "NODETREE_DB_PATH", default_value = "node_tree_prefs.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core linkage probe values.
    Ping,
    /// Print the stored tree as an outline.
    Show,
    /// Add a node under the root, or under the first node with `--under` id.
    Add {
        name: String,
        #[arg(long)]
        under: Option<String>,
    },
    /// Delete the stored tree.
    Reset,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Ping => {
            println!("nodetree_core ping={}", nodetree_core::ping());
            println!("nodetree_core version={}", nodetree_core::core_version());
            Ok(())
        }
        Command::Show => {
            let manager = open_manager(&cli.db)?;
            print_outline(&manager.state());
            Ok(())
        }
        Command::Add { name, under } => {
            let manager = open_manager(&cli.db)?;
            if let Some(id) = under {
                let state = manager.state();
                let target = state
                    .tree()
                    .find_node(state.resolved_root(), &id)
                    .ok_or_else(|| format!("no node with id {id}"))?;
                manager.navigate_to(target);
            }
            manager.add_node(&name).map_err(|err| err.to_string())?;
            manager.flush().map_err(|err| err.to_string())?;
            print_outline(&manager.state());
            Ok(())
        }
        Command::Reset => {
            let mut store = open_store(&cli.db).map_err(|err| err.to_string())?;
            store.remove(TREE_STORE_KEY).map_err(|err| err.to_string())
        }
    }
}

fn open_manager(db: &Path) -> Result<TreeManager, String> {
    let store = open_store(db).map_err(|err| err.to_string())?;
    TreeManager::open_blocking(store).map_err(|err| err.to_string())
}

fn print_outline(state: &TreeState) {
    let tree = state.tree();
    let root = state.resolved_root();
    let base_depth = tree.depth(root).unwrap_or_default();
    for handle in tree.descendants(root) {
        let (Some(node), Some(depth)) = (tree.get(handle), tree.depth(handle)) else {
            continue;
        };
        let marker = if handle == state.current_node() { "*" } else { " " };
        println!(
            "{marker}{}{} [{}]",
            "  ".repeat(depth - base_depth),
            node.name(),
            node.id()
        );
    }
}
