//! Rank-parallel graph execution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;

use crate::error::Result;
use crate::graph::{Graph, VertexId};

/// Cooperative cancellation for a walk in progress.
///
/// `stop` is graceful: running vertices finish, nothing new is
/// scheduled. `cancel` is hard: callbacks are expected to observe it and
/// abort their own blocking work as soon as possible.
#[derive(Debug, Default)]
pub struct WalkSignals {
    stop: AtomicBool,
    cancel: AtomicBool,
}

impl WalkSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Terminal state of one vertex after a walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStatus {
    /// Callback ran and returned Ok
    Completed,
    /// Callback ran and returned Err
    Failed,
    /// Not run because a dependency failed or was itself skipped
    Skipped,
    /// Not run because the walk was stopped first
    NotScheduled,
}

/// What happened to each vertex, plus the errors that occurred.
#[derive(Debug)]
pub struct WalkOutcome<E> {
    pub statuses: BTreeMap<VertexId, WalkStatus>,
    pub errors: Vec<(VertexId, E)>,
    pub stopped: bool,
}

impl<E> WalkOutcome<E> {
    pub fn status(&self, id: VertexId) -> Option<WalkStatus> {
        self.statuses.get(&id).copied()
    }

    pub fn completed(&self) -> usize {
        self.statuses
            .values()
            .filter(|s| **s == WalkStatus::Completed)
            .count()
    }
}

/// Walk the graph in dependency order, visiting same-rank vertices in
/// parallel. For any edge (u depends on v), the callback for v returns
/// before the callback for u starts; dependants of a failed or skipped
/// vertex are skipped.
pub fn walk<V, E, F>(graph: &Graph<V>, signals: &WalkSignals, callback: F) -> Result<WalkOutcome<E>>
where
    V: fmt::Display + Sync,
    E: Send,
    F: Fn(VertexId, &V) -> std::result::Result<(), E> + Sync,
{
    let ranks = graph.topo_ranks()?;
    let mut statuses: BTreeMap<VertexId, WalkStatus> = BTreeMap::new();
    let mut errors = Vec::new();
    let mut stopped = false;

    for rank in ranks {
        if signals.is_stopped() {
            stopped = true;
            for id in rank {
                statuses.insert(id, WalkStatus::NotScheduled);
            }
            continue;
        }

        let mut runnable = Vec::new();
        for id in rank {
            let blocked = graph.down_edges(id).iter().any(|dep| {
                !matches!(statuses.get(dep), Some(WalkStatus::Completed))
            });
            if blocked {
                log::debug!("walk: skipping {id}, blocked by a failed dependency");
                statuses.insert(id, WalkStatus::Skipped);
            } else {
                runnable.push(id);
            }
        }

        // Results are collected behind a mutex and folded in afterwards;
        // the callback itself must not touch walk bookkeeping.
        let results: Mutex<Vec<(VertexId, std::result::Result<(), E>)>> =
            Mutex::new(Vec::with_capacity(runnable.len()));
        runnable.par_iter().for_each(|id| {
            let vertex = graph.get(*id).expect("walk rank holds live vertices");
            let result = callback(*id, vertex);
            results.lock().unwrap().push((*id, result));
        });

        for (id, result) in results.into_inner().unwrap() {
            match result {
                Ok(()) => {
                    statuses.insert(id, WalkStatus::Completed);
                }
                Err(e) => {
                    statuses.insert(id, WalkStatus::Failed);
                    errors.push((id, e));
                }
            }
        }
    }

    Ok(WalkOutcome {
        statuses,
        errors,
        stopped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn chain() -> (Graph<&'static str>, [VertexId; 3]) {
        let mut g = Graph::new();
        let a = g.add("a");
        let b = g.add("b");
        let c = g.add("c");
        g.connect(b, a);
        g.connect(c, b);
        (g, [a, b, c])
    }

    #[test]
    fn test_walk_ordering() {
        let (g, [a, b, c]) = chain();
        let order = Mutex::new(Vec::new());
        let outcome = walk(&g, &WalkSignals::new(), |id, _| {
            order.lock().unwrap().push(id);
            Ok::<(), String>(())
        })
        .unwrap();
        assert_eq!(order.into_inner().unwrap(), vec![a, b, c]);
        assert_eq!(outcome.completed(), 3);
        assert!(!outcome.stopped);
    }

    #[test]
    fn test_walk_skips_dependants_of_failure() {
        let (g, [a, b, c]) = chain();
        let outcome = walk(&g, &WalkSignals::new(), |id, _| {
            if id == b {
                Err("boom".to_string())
            } else {
                Ok(())
            }
        })
        .unwrap();
        assert_eq!(outcome.status(a), Some(WalkStatus::Completed));
        assert_eq!(outcome.status(b), Some(WalkStatus::Failed));
        assert_eq!(outcome.status(c), Some(WalkStatus::Skipped));
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_walk_stop_prevents_scheduling() {
        let (g, [a, b, c]) = chain();
        let signals = WalkSignals::new();
        let ran = AtomicUsize::new(0);
        let outcome = walk(&g, &signals, |id, _| {
            ran.fetch_add(1, Ordering::SeqCst);
            if id == a {
                signals.stop();
            }
            Ok::<(), String>(())
        })
        .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(outcome.stopped);
        assert_eq!(outcome.status(b), Some(WalkStatus::NotScheduled));
        assert_eq!(outcome.status(c), Some(WalkStatus::NotScheduled));
    }

    #[test]
    fn test_walk_parallel_rank() {
        let mut g = Graph::new();
        let root = g.add("root");
        let mut leaves = Vec::new();
        for _ in 0..8 {
            let leaf = g.add("leaf");
            g.connect(leaf, root);
            leaves.push(leaf);
        }
        let outcome = walk(&g, &WalkSignals::new(), |_, _| Ok::<(), String>(())).unwrap();
        assert_eq!(outcome.completed(), 9);
    }
}
