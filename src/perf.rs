use serde_json::json;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const SLOW_NODE_LIMIT: usize = 20;

/// JSONL timing log shared by the committer and the workers.
///
/// Each span or count is one line. When the last handle is dropped a
/// `<stem>_hot.log` summary is written: per-span totals (render phases and
/// `handler.<tag>` spans) and the slowest individual nodes.
#[derive(Clone)]
pub struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

#[derive(Default)]
struct SpanStats {
    total_ms: f64,
    max_ms: f64,
    count: u64,
}

struct SlowNode {
    node: usize,
    span: String,
    ms: f64,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    spans: BTreeMap<String, SpanStats>,
    slow_nodes: Vec<SlowNode>,
    counts: BTreeMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer,
                path,
                spans: BTreeMap::new(),
                slow_nodes: Vec::new(),
                counts: BTreeMap::new(),
            })),
        })
    }

    fn state(&self) -> MutexGuard<'_, PerfState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `node` is the top-level node index for per-handler spans, `None` for
    /// whole-session phases.
    pub fn log_span_ms(&self, name: &str, node: Option<usize>, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "node": node,
            "unit": "ms",
            "ms": (ms * 1000.0).round() / 1000.0,
        });
        let mut state = self.state();
        let stats = state.spans.entry(name.to_string()).or_default();
        stats.total_ms += ms;
        stats.max_ms = stats.max_ms.max(ms);
        stats.count = stats.count.saturating_add(1);
        if let Some(node) = node {
            state.record_slow_node(node, name, ms);
        }
        let _ = writeln!(state.writer, "{line}");
    }

    pub fn log_counts(&self, name: &str, counts: &[(&str, u64)]) {
        let fields: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        let line = json!({"type": "perf.counts", "name": name, "counts": fields});
        let mut state = self.state();
        for (key, value) in counts {
            let total = state.counts.entry(format!("{name}.{key}")).or_insert(0);
            *total = total.saturating_add(*value);
        }
        let _ = writeln!(state.writer, "{line}");
    }

    pub fn flush(&self) {
        let _ = self.state().writer.flush();
    }
}

impl PerfState {
    fn record_slow_node(&mut self, node: usize, span: &str, ms: f64) {
        if self.slow_nodes.len() == SLOW_NODE_LIMIT
            && self.slow_nodes.last().is_some_and(|slowest| slowest.ms >= ms)
        {
            return;
        }
        let at = self.slow_nodes.partition_point(|entry| entry.ms >= ms);
        self.slow_nodes.insert(
            at,
            SlowNode {
                node,
                span: span.to_string(),
                ms,
            },
        );
        self.slow_nodes.truncate(SLOW_NODE_LIMIT);
    }

    fn write_summary(&self, writer: &mut impl Write) -> io::Result<()> {
        let mut spans: Vec<(&String, &SpanStats)> = self.spans.iter().collect();
        spans.sort_by(|a, b| b.1.total_ms.total_cmp(&a.1.total_ms));
        for (rank, (name, stats)) in spans.into_iter().enumerate() {
            let (kind, label) = match name.strip_prefix("handler.") {
                Some(tag) => ("handler", tag),
                None => ("phase", name.as_str()),
            };
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "kind": kind,
                "name": label,
                "ms": stats.total_ms,
                "max_ms": stats.max_ms,
                "count": stats.count,
                "avg_ms": stats.total_ms / stats.count.max(1) as f64,
            });
            writeln!(writer, "{line}")?;
        }
        for (rank, slow) in self.slow_nodes.iter().enumerate() {
            let line = json!({
                "type": "perf.hot.node",
                "rank": rank + 1,
                "node": slow.node,
                "span": slow.span,
                "ms": slow.ms,
            });
            writeln!(writer, "{line}")?;
        }
        for (name, value) in &self.counts {
            let line = json!({"type": "perf.hot.count", "name": name, "value": value});
            writeln!(writer, "{line}")?;
        }
        writer.flush()
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let hot = hot_path_for(&self.path);
        let written = File::create(&hot)
            .and_then(|file| self.write_summary(&mut BufWriter::new(file)));
        if let Err(err) = written {
            tracing::debug!(path = %hot.display(), %err, "could not write perf summary");
        }
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("docweave_perf");
    path.with_file_name(format!("{stem}_hot.log"))
}
