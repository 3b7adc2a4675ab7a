//! Per-dialect free-instance gauges.

use std::sync::atomic::{AtomicU64, Ordering};

use sandbox_state::Dialect;

/// Sentinel for a dialect the aggregator has never published.
const UNPUBLISHED: u64 = u64::MAX;

/// One gauge per dialect, indexed by `Dialect::index()`.
///
/// Written by the aggregator only; read by any number of scrapers.
#[derive(Debug)]
pub struct FreeGauges {
    values: [AtomicU64; Dialect::ALL.len()],
}

impl Default for FreeGauges {
    fn default() -> Self {
        Self::new()
    }
}

impl FreeGauges {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|_| AtomicU64::new(UNPUBLISHED)),
        }
    }

    pub fn set(&self, dialect: Dialect, free: u64) {
        self.values[dialect.index()].store(free, Ordering::Relaxed);
    }

    /// The last published value, or `None` before the first publish.
    pub fn get(&self, dialect: Dialect) -> Option<u64> {
        match self.values[dialect.index()].load(Ordering::Relaxed) {
            UNPUBLISHED => None,
            v => Some(v),
        }
    }

    /// Published gauges in `Dialect::ALL` order.
    pub fn snapshot(&self) -> Vec<(Dialect, u64)> {
        Dialect::ALL
            .iter()
            .filter_map(|&d| self.get(d).map(|v| (d, v)))
            .collect()
    }
}
