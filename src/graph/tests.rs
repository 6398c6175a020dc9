use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Change, ChangeKind, DependencyGraph, Dependent, DependentNode, Key};

struct Probe {
    node: DependentNode,
    seen: Mutex<Vec<Vec<Change>>>,
    fail: bool,
}

impl Probe {
    fn new(graph: &Arc<DependencyGraph>, keys: &[&str]) -> Arc<Self> {
        Self::build(graph, keys, false)
    }

    fn failing(graph: &Arc<DependencyGraph>, keys: &[&str]) -> Arc<Self> {
        Self::build(graph, keys, true)
    }

    fn build(graph: &Arc<DependencyGraph>, keys: &[&str], fail: bool) -> Arc<Self> {
        let probe = Arc::new_cyclic(|weak: &Weak<Probe>| {
            let this: Weak<dyn Dependent> = weak.clone();
            Probe {
                node: DependentNode::new(graph, this),
                seen: Mutex::new(Vec::new()),
                fail,
            }
        });
        probe.set_keys(keys);
        probe
    }

    fn set_keys(&self, keys: &[&str]) {
        self.node
            .update_dependencies(keys.iter().map(|k| Key::from(*k)));
    }

    fn notifications(&self) -> Vec<Vec<Change>> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Dependent for Probe {
    fn node(&self) -> &DependentNode {
        &self.node
    }

    async fn on_dependencies_changed(&self, changes: Vec<Change>) -> anyhow::Result<()> {
        self.seen.lock().push(changes);
        if self.fail {
            anyhow::bail!("probe configured to fail");
        }
        Ok(())
    }
}

fn graph() -> Arc<DependencyGraph> {
    DependencyGraph::new(DependencyGraph::DEFAULT_DEBOUNCE)
}

fn key(s: &str) -> Key {
    Key::from(s)
}

/// `k ∈ deps(D) ⇔ D ∈ index[k]` over a key universe.
fn assert_transpose(graph: &DependencyGraph, probes: &[&Arc<Probe>], universe: &[&str]) {
    for probe in probes {
        for k in universe {
            assert_eq!(
                probe.node.depends_on(k),
                graph.is_indexed(k, probe.node.id()),
                "index out of sync for {} on {}",
                k,
                probe.node.id()
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Reverse index
// ----------------------------------------------------------------------------

#[test]
fn index_is_exact_transpose_after_updates() {
    let graph = graph();
    let universe = ["/a.md", "/b.md", "/c.md", "/layout.html"];

    let first = Probe::new(&graph, &["/a.md", "/layout.html"]);
    let second = Probe::new(&graph, &["/b.md", "/layout.html"]);
    assert_transpose(&graph, &[&first, &second], &universe);

    first.set_keys(&["/a.md", "/c.md"]);
    assert_transpose(&graph, &[&first, &second], &universe);

    second.set_keys(&[]);
    assert_transpose(&graph, &[&first, &second], &universe);

    first.node.destroy();
    assert_transpose(&graph, &[&first, &second], &universe);
    assert_eq!(graph.key_count(), 0);
}

#[test]
fn shared_key_lists_every_dependent() {
    let graph = graph();
    let first = Probe::new(&graph, &["/layout.html"]);
    let second = Probe::new(&graph, &["/layout.html"]);

    let ids: Vec<_> = graph
        .dependents_of("/layout.html")
        .iter()
        .map(|d| d.node().id())
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.node.id()));
    assert!(ids.contains(&second.node.id()));
}

#[test]
fn destroy_is_idempotent() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md"]);

    assert!(probe.node.destroy());
    assert!(!probe.node.destroy());
    assert!(probe.node.is_destroyed());
    assert!(probe.node.dependencies().is_empty());
}

#[test]
fn update_after_destroy_is_ignored() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md"]);
    probe.node.destroy();

    probe.set_keys(&["/b.md"]);
    assert!(probe.node.dependencies().is_empty());
    assert!(!graph.is_indexed("/b.md", probe.node.id()));
}

#[test]
fn dropped_dependent_is_pruned_on_use() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md"]);
    assert_eq!(graph.key_count(), 1);

    drop(probe);
    assert!(graph.dependents_of("/a.md").is_empty());
    assert_eq!(graph.key_count(), 0);
}

#[test]
fn missing_bucket_is_tolerated() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md", "/b.md"]);

    // Simulate drift: the index lost an entry the node still lists.
    assert!(graph.index.lock().unlink("/a.md", probe.node.id()));

    probe.set_keys(&["/b.md", "/c.md"]);
    assert_transpose(&graph, &[&probe], &["/a.md", "/b.md", "/c.md"]);
}

// ----------------------------------------------------------------------------
// Flush and coalescing
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn remove_then_add_notifies_update() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md"]);

    graph.emit([(key("/a.md"), ChangeKind::Remove)]);
    graph.emit([(key("/a.md"), ChangeKind::Add)]);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        probe.notifications(),
        vec![vec![Change::new("/a.md", ChangeKind::Update)]]
    );
}

#[tokio::test(start_paused = true)]
async fn add_then_remove_notifies_nothing() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md", "/b.md"]);

    graph.emit([
        (key("/a.md"), ChangeKind::Add),
        (key("/a.md"), ChangeKind::Remove),
    ]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(probe.notifications().is_empty());

    graph.emit([
        (key("/a.md"), ChangeKind::Add),
        (key("/a.md"), ChangeKind::Remove),
        (key("/b.md"), ChangeKind::Update),
    ]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        probe.notifications(),
        vec![vec![Change::new("/b.md", ChangeKind::Update)]]
    );
}

#[tokio::test(start_paused = true)]
async fn burst_collapses_into_one_flush() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md", "/b.md"]);

    for _ in 0..5 {
        graph.emit([(key("/a.md"), ChangeKind::Update)]);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    graph.emit([(key("/b.md"), ChangeKind::Update)]);
    assert!(probe.notifications().is_empty(), "timer must keep resetting");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        probe.notifications(),
        vec![vec![
            Change::new("/a.md", ChangeKind::Update),
            Change::new("/b.md", ChangeKind::Update),
        ]]
    );
    assert_eq!(graph.pending_len(), 0);
    assert!(graph.next_flush().is_none());
}

#[tokio::test(start_paused = true)]
async fn unrelated_key_notifies_nobody() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md"]);

    graph.emit([(key("/b.md"), ChangeKind::Update)]);
    let report = graph.flush().await;

    assert_eq!(report.events, 1);
    assert_eq!(report.notified, 0);
    assert!(probe.notifications().is_empty());
}

#[tokio::test]
async fn failure_is_isolated_per_dependent() {
    let graph = graph();
    let broken = Probe::failing(&graph, &["/layout.html"]);
    let healthy = Probe::new(&graph, &["/layout.html"]);

    graph.emit([(key("/layout.html"), ChangeKind::Update)]);
    let report = graph.flush().await;

    assert_eq!(report.notified, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(broken.notifications().len(), 1);
    assert_eq!(healthy.notifications().len(), 1);
}

#[tokio::test]
async fn destroyed_dependent_is_skipped() {
    let graph = graph();
    let gone = Probe::new(&graph, &["/a.md"]);
    let live = Probe::new(&graph, &["/a.md"]);

    graph.emit([(key("/a.md"), ChangeKind::Update)]);
    gone.node.destroy();
    let report = graph.flush().await;

    assert_eq!(report.notified, 1);
    assert!(gone.notifications().is_empty());
    assert_eq!(live.notifications().len(), 1);
}

#[tokio::test]
async fn flush_cancels_pending_timer() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md"]);

    graph.emit([(key("/a.md"), ChangeKind::Update)]);
    assert!(graph.next_flush().is_some());

    graph.flush().await;
    assert!(graph.next_flush().is_none());

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(probe.notifications().len(), 1);
}

#[test]
fn emit_without_runtime_buffers() {
    let graph = graph();
    let probe = Probe::new(&graph, &["/a.md"]);

    graph.emit([(key("/a.md"), ChangeKind::Update)]);
    assert_eq!(graph.pending_len(), 1);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let report = runtime.block_on(graph.flush());

    assert_eq!(report.notified, 1);
    assert_eq!(probe.notifications().len(), 1);
}
