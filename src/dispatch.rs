use crate::backend::{OutputBackend, commit_fragment};
use crate::error::NodeError;
use crate::fragment::Fragment;
use crate::markup::MarkupNode;
use crate::perf::PerfLogger;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

/// Buffers out-of-order results and releases them strictly by index.
///
/// An item whose predecessors have not arrived yet is held back; each
/// `accept` drains the longest contiguous run starting at `next_index`.
#[derive(Debug)]
pub struct OrderedCommit<T> {
    pending: BTreeMap<usize, T>,
    next: usize,
}

impl<T> Default for OrderedCommit<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedCommit<T> {
    pub fn new() -> Self {
        Self {
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    pub fn accept<F>(&mut self, index: usize, item: T, mut apply: F)
    where
        F: FnMut(usize, T),
    {
        if index < self.next {
            return;
        }
        self.pending.insert(index, item);
        while let Some(ready) = self.pending.remove(&self.next) {
            apply(self.next, ready);
            self.next += 1;
        }
    }

    /// Index of the next item to be committed (= number committed so far).
    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

/// What happened to one top-level node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub index: usize,
    pub tag: Option<String>,
    pub blocks: usize,
    pub error: Option<NodeError>,
    pub handler_ms: f64,
}

struct Completed {
    index: usize,
    fragment: Fragment,
    handler_ms: f64,
}

/// Runs `render` for every node on `pool` and commits the fragments to
/// `backend` in node order, whatever order the workers finish in.
///
/// `render` never sees the backend. A handler error or panic becomes the
/// node's fragment via `on_error`; siblings are unaffected.
pub fn dispatch_ordered<R, E>(
    pool: &rayon::ThreadPool,
    nodes: &[MarkupNode],
    render: R,
    on_error: E,
    backend: &mut dyn OutputBackend,
    perf: Option<&PerfLogger>,
) -> Vec<NodeOutcome>
where
    R: Fn(usize, &MarkupNode) -> Result<Fragment, NodeError> + Sync,
    E: Fn(&MarkupNode, NodeError) -> Fragment + Sync,
{
    let n = nodes.len();
    let mut outcomes: Vec<NodeOutcome> = Vec::with_capacity(n);
    if n == 0 {
        return outcomes;
    }

    // Bound in-flight fragments to keep memory stable.
    let buffer_cap = (pool.current_num_threads().max(1) * 4).min(256);
    let (tx, rx) = mpsc::sync_channel::<Completed>(buffer_cap);
    let render = &render;
    let on_error = &on_error;

    thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                nodes
                    .par_iter()
                    .enumerate()
                    .for_each_with(tx, |tx, (index, node)| {
                        let started = Instant::now();
                        let fragment = run_isolated(index, node, render, on_error);
                        let handler_ms = started.elapsed().as_secs_f64() * 1000.0;
                        if let Some(perf) = perf {
                            let name = format!("handler.{}", node.tag().unwrap_or("#text"));
                            perf.log_span_ms(&name, Some(index), handler_ms);
                        }
                        let _ = tx.send(Completed {
                            index,
                            fragment,
                            handler_ms,
                        });
                    });
            });
        });

        // Sole owner of the backend: commits in template order.
        let mut commit: OrderedCommit<Completed> = OrderedCommit::new();
        while commit.next_index() < n {
            let Ok(done) = rx.recv() else {
                tracing::warn!(
                    committed = commit.next_index(),
                    total = n,
                    "worker channel closed before every node completed"
                );
                break;
            };
            commit.accept(done.index, done, |index, done| {
                let node = &nodes[index];
                outcomes.push(NodeOutcome {
                    index,
                    tag: node.tag().map(str::to_string),
                    blocks: done.fragment.blocks.len(),
                    error: done.fragment.error.clone(),
                    handler_ms: done.handler_ms,
                });
                commit_fragment(backend, done.fragment);
            });
        }
    });

    outcomes
}

fn run_isolated<R, E>(index: usize, node: &MarkupNode, render: &R, on_error: &E) -> Fragment
where
    R: Fn(usize, &MarkupNode) -> Result<Fragment, NodeError>,
    E: Fn(&MarkupNode, NodeError) -> Fragment,
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| render(index, node)))
        .unwrap_or_else(|payload| Err(NodeError::Handler(panic_message(payload.as_ref()))));
    match result {
        Ok(fragment) => {
            if let Some(error) = &fragment.error {
                tracing::warn!(
                    node = index,
                    tag = node.tag().unwrap_or("#text"),
                    kind = error.kind(),
                    %error,
                    "node rendered an error marker"
                );
            }
            fragment
        }
        Err(error) => {
            tracing::warn!(
                node = index,
                tag = node.tag().unwrap_or("#text"),
                kind = error.kind(),
                %error,
                "handler failed"
            );
            on_error(node, error)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "handler panicked".to_string()
}
