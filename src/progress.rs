//! Batch progress aggregation.
//!
//! Pages run one after another and each reports its own 0-100 progress. The
//! aggregator folds those into one batch percentage that never decreases and
//! only reaches 100 when the last page has finished.

use std::sync::{Arc, Mutex};

/// Caller-supplied progress callback, percent 0-100
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// `clamp(round(index/total*100 + local/total), 0, 100)`
pub fn overall_percent(index: usize, total: usize, local: u8) -> u8 {
    if total == 0 {
        return 100;
    }
    let total = total as f64;
    let value = (index as f64 / total) * 100.0 + local.min(100) as f64 / total;
    value.round().clamp(0.0, 100.0) as u8
}

pub struct ProgressAggregator {
    total: usize,
    sink: Option<ProgressFn>,
    last: Mutex<Option<u8>>,
}

impl ProgressAggregator {
    pub fn new(total: usize, sink: Option<ProgressFn>) -> Arc<Self> {
        Arc::new(Self {
            total,
            sink,
            last: Mutex::new(None),
        })
    }

    /// Per-page callback for the orchestrator, `None` when nobody listens
    pub fn page(self: &Arc<Self>, index: usize) -> Option<ProgressFn> {
        self.sink.as_ref()?;
        let this = Arc::clone(self);
        Some(Arc::new(move |local| this.report(index, local, false)))
    }

    /// Mark a page as finished
    pub fn complete_page(&self, index: usize) {
        self.report(index, 100, true);
    }

    /// Highest value emitted so far
    pub fn current(&self) -> Option<u8> {
        self.last.lock().ok().and_then(|last| *last)
    }

    fn report(&self, index: usize, local: u8, completed: bool) {
        let Some(sink) = &self.sink else {
            return;
        };

        let mut value = overall_percent(index, self.total, local);
        let batch_done = completed && index + 1 >= self.total;
        if !batch_done {
            value = value.min(99);
        }

        let Ok(mut last) = self.last.lock() else {
            return;
        };
        if last.is_some_and(|prev| value <= prev) {
            return;
        }
        *last = Some(value);
        tracing::debug!(page = index + 1, percent = value, "batch progress");
        sink(value);
    }
}
