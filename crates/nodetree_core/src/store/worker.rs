//! Single-writer persistence worker.
//!
//! # Responsibility
//! - Own the key-value store on one background thread.
//! - Execute load/save commands strictly in submission order.
//!
//! # Invariants
//! - At most one store operation runs at a time.
//! - Saves encode immutable snapshots captured when they were enqueued.
//! - Dropping the worker drains queued commands before the thread exits.

use super::codec::{decode_tree, encode_tree, CodecError};
use super::{KeyValueStore, StoreError};
use crate::model::node::{NodeHandle, NodeTree};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

/// Result of reading the persisted tree.
pub(crate) enum LoadOutcome {
    /// No value under the tree key.
    Missing,
    /// Decoded tree with rebuilt parent links.
    Loaded(NodeTree, NodeHandle),
    /// Value exists but is not a valid tree document.
    Malformed(CodecError),
    /// Store read failed.
    Failed(StoreError),
}

pub(crate) type LoadCallback = Box<dyn FnOnce(LoadOutcome) + Send>;

pub(crate) enum PersistCommand {
    Load(LoadCallback),
    Save { tree: Arc<NodeTree>, root: NodeHandle },
    Flush(Sender<()>),
    Shutdown,
}

/// Save counters shared with the owning manager.
#[derive(Debug, Default)]
pub(crate) struct WorkerStats {
    saves_ok: AtomicU64,
    saves_failed: AtomicU64,
}

impl WorkerStats {
    pub(crate) fn saves_ok(&self) -> u64 {
        self.saves_ok.load(Ordering::Relaxed)
    }

    pub(crate) fn saves_failed(&self) -> u64 {
        self.saves_failed.load(Ordering::Relaxed)
    }
}

/// Marker error: the worker thread is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerGone;

pub(crate) struct PersistenceWorker {
    sender: Sender<PersistCommand>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<WorkerStats>,
}

impl PersistenceWorker {
    /// Moves `store` onto a new named thread serving `key`.
    pub(crate) fn spawn<S>(store: S, key: impl Into<String>) -> std::io::Result<Self>
    where
        S: KeyValueStore + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let stats = Arc::new(WorkerStats::default());
        let key = key.into();
        let thread_stats = Arc::clone(&stats);
        let handle = std::thread::Builder::new()
            .name("nodetree-persist".to_string())
            .spawn(move || run(store, key, receiver, thread_stats))?;
        Ok(Self {
            sender,
            handle: Some(handle),
            stats,
        })
    }

    pub(crate) fn submit(&self, command: PersistCommand) -> Result<(), WorkerGone> {
        self.sender.send(command).map_err(|_| WorkerGone)
    }

    /// Blocks until every command submitted before this call has run.
    pub(crate) fn flush(&self) -> Result<(), WorkerGone> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.submit(PersistCommand::Flush(ack_tx))?;
        ack_rx.recv().map_err(|_| WorkerGone)
    }

    pub(crate) fn stats(&self) -> &WorkerStats {
        &self.stats
    }
}

impl Drop for PersistenceWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(PersistCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("event=persist_shutdown module=store status=error error_code=worker_panicked");
            }
        }
    }
}

fn run<S: KeyValueStore>(
    mut store: S,
    key: String,
    receiver: Receiver<PersistCommand>,
    stats: Arc<WorkerStats>,
) {
    info!("event=persist_worker module=store status=start");
    while let Ok(command) = receiver.recv() {
        match command {
            PersistCommand::Load(callback) => callback(load(&store, &key)),
            PersistCommand::Save { tree, root } => {
                if save(&mut store, &key, &tree, root) {
                    stats.saves_ok.fetch_add(1, Ordering::Relaxed);
                } else {
                    stats.saves_failed.fetch_add(1, Ordering::Relaxed);
                }
            }
            PersistCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            PersistCommand::Shutdown => break,
        }
    }
    info!(
        "event=persist_worker module=store status=stop saves_ok={} saves_failed={}",
        stats.saves_ok(),
        stats.saves_failed()
    );
}

fn load<S: KeyValueStore>(store: &S, key: &str) -> LoadOutcome {
    let started_at = Instant::now();
    let text = match store.get(key) {
        Ok(Some(text)) => text,
        Ok(None) => {
            info!("event=tree_load module=store status=ok source=empty");
            return LoadOutcome::Missing;
        }
        Err(err) => {
            error!(
                "event=tree_load module=store status=error error_code=store_read_failed error={err}"
            );
            return LoadOutcome::Failed(err);
        }
    };

    match decode_tree(&text) {
        Ok((tree, root)) => {
            info!(
                "event=tree_load module=store status=ok source=store nodes={} bytes={} duration_ms={}",
                tree.len(),
                text.len(),
                started_at.elapsed().as_millis()
            );
            LoadOutcome::Loaded(tree, root)
        }
        Err(err) => {
            warn!(
                "event=tree_load module=store status=error error_code=malformed_tree bytes={} error={err}",
                text.len()
            );
            LoadOutcome::Malformed(err)
        }
    }
}

fn save<S: KeyValueStore>(store: &mut S, key: &str, tree: &NodeTree, root: NodeHandle) -> bool {
    let started_at = Instant::now();
    let text = match encode_tree(tree, root) {
        Ok(text) => text,
        Err(err) => {
            error!("event=tree_save module=store status=error error_code=encode_failed error={err}");
            return false;
        }
    };
    match store.put(key, &text) {
        Ok(()) => {
            debug!(
                "event=tree_save module=store status=ok nodes={} bytes={} duration_ms={}",
                tree.len(),
                text.len(),
                started_at.elapsed().as_millis()
            );
            true
        }
        Err(err) => {
            warn!("event=tree_save module=store status=error error_code=store_write_failed error={err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadOutcome, PersistCommand, PersistenceWorker};
    use crate::model::node::NodeTree;
    use crate::store::{KeyValueStore, MemoryKeyValueStore, StoreError, StoreResult};
    use std::sync::mpsc;
    use std::sync::Arc;

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Backend("read refused".to_string()))
        }

        fn put(&mut self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Backend("disk full".to_string()))
        }

        fn remove(&mut self, _key: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    fn single_node_tree(name: &str) -> (Arc<NodeTree>, crate::model::node::NodeHandle) {
        let mut tree = NodeTree::new();
        let root = tree.insert("r", name);
        (Arc::new(tree), root)
    }

    #[test]
    fn saves_are_applied_in_submission_order() {
        let store = MemoryKeyValueStore::new();
        let worker = PersistenceWorker::spawn(store.clone(), "tree").unwrap();

        for name in ["first", "second", "third"] {
            let (tree, root) = single_node_tree(name);
            worker.submit(PersistCommand::Save { tree, root }).unwrap();
        }
        worker.flush().unwrap();

        let text = store.snapshot("tree").unwrap();
        assert!(text.contains("\"third\""));
        assert_eq!(worker.stats().saves_ok(), 3);
    }

    #[test]
    fn load_reports_missing_and_failed_reads() {
        let worker = PersistenceWorker::spawn(MemoryKeyValueStore::new(), "tree").unwrap();
        let (tx, rx) = mpsc::channel();
        worker
            .submit(PersistCommand::Load(Box::new(move |outcome| {
                let _ = tx.send(matches!(outcome, LoadOutcome::Missing));
            })))
            .unwrap();
        assert!(rx.recv().unwrap());

        let failing = PersistenceWorker::spawn(FailingStore, "tree").unwrap();
        let (tx, rx) = mpsc::channel();
        failing
            .submit(PersistCommand::Load(Box::new(move |outcome| {
                let _ = tx.send(matches!(outcome, LoadOutcome::Failed(_)));
            })))
            .unwrap();
        assert!(rx.recv().unwrap());
    }

    #[test]
    fn failed_saves_are_counted_not_fatal() {
        let worker = PersistenceWorker::spawn(FailingStore, "tree").unwrap();
        let (tree, root) = single_node_tree("Root");
        worker.submit(PersistCommand::Save { tree, root }).unwrap();
        worker.flush().unwrap();
        assert_eq!(worker.stats().saves_failed(), 1);
        assert_eq!(worker.stats().saves_ok(), 0);
    }

    #[test]
    fn drop_drains_pending_saves() {
        let store = MemoryKeyValueStore::new();
        {
            let worker = PersistenceWorker::spawn(store.clone(), "tree").unwrap();
            let (tree, root) = single_node_tree("kept");
            worker.submit(PersistCommand::Save { tree, root }).unwrap();
        }
        assert!(store.snapshot("tree").unwrap().contains("\"kept\""));
    }
}
