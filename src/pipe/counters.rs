//! Concurrency-safe branch counters for [`crate::pipe::if_pipe::IfPipe`] and
//! [`crate::pipe::partition::PartitionPipe`].
//!
//! Counters only ever grow; the blueprint renderer turns the raw totals into percentages at
//! render time rather than storing percentages directly.

use std::sync::Mutex;

use indexmap::IndexMap;

/// Per-branch invocation totals, optionally broken down by a caller-supplied traffic tag.
#[derive(Default)]
pub struct Counters {
    inner: Mutex<IndexMap<String, BranchCount>>,
}

#[derive(Default, Clone)]
struct BranchCount {
    total: u64,
    tagged: IndexMap<String, u64>,
}

impl Counters {
    /// An empty counter set.
    pub fn new() -> Self {
        Counters::default()
    }

    /// Increments `branch`'s total, and its `tag` bucket if one was supplied.
    ///
    /// For [`crate::pipe::partition::PartitionPipe`], this is called for every part the
    /// partitioner emits, even parts whose name has no entry in `Paths` — the counter answers
    /// "how much traffic was routed to this name", not "how much traffic this name's flow
    /// executed". See the partition pipe's own documentation for why that distinction matters.
    pub fn record(&self, branch: &str, tag: Option<&str>) {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner.entry(branch.to_owned()).or_default();
        entry.total += 1;
        if let Some(tag) = tag {
            *entry.tagged.entry(tag.to_owned()).or_insert(0) += 1;
        }
    }

    /// Snapshot of `branch -> (total, percentage of all branches' totals)`, in the order branches
    /// were first recorded.
    pub fn percentages(&self) -> Vec<(String, u64, f64)> {
        let inner = self.inner.lock().unwrap();
        let grand_total: u64 = inner.values().map(|c| c.total).sum();
        inner
            .iter()
            .map(|(name, count)| {
                let pct = if grand_total == 0 {
                    0.0
                } else {
                    100.0 * count.total as f64 / grand_total as f64
                };
                (name.clone(), count.total, pct)
            })
            .collect()
    }

    /// Snapshot of a branch's per-tag totals, in the order tags were first recorded.
    pub fn tagged(&self, branch: &str) -> Vec<(String, u64)> {
        self.inner
            .lock()
            .unwrap()
            .get(branch)
            .map(|count| count.tagged.iter().map(|(k, v)| (k.clone(), *v)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_sum_to_roughly_100() {
        let counters = Counters::new();
        for _ in 0..3 {
            counters.record("true", None);
        }
        for _ in 0..7 {
            counters.record("false", None);
        }
        let pct = counters.percentages();
        let total: f64 = pct.iter().map(|(_, _, p)| p).sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert_eq!(pct[0].0, "true");
        assert!((pct[0].2 - 30.0).abs() < 1e-9);
    }

    #[test]
    fn counters_never_decrease() {
        let counters = Counters::new();
        counters.record("a", None);
        let (_, first_total, _) = counters.percentages()[0].clone();
        counters.record("a", None);
        let (_, second_total, _) = counters.percentages()[0].clone();
        assert!(second_total > first_total);
    }
}
