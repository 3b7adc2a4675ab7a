//! sandbox-metrics — observability for the sandbox broker.
//!
//! Periodically counts free sandbox instances per dialect and exposes the
//! counts as Prometheus gauges.
//!
//! # Architecture
//!
//! ```text
//! MetricsAggregator
//!   ├── refresh() → list unclaimed instances, count per dialect
//!   └── run()     → periodic refresh loop
//!          │
//!          ▼
//! FreeGauges (atomics, one writer, many readers)
//!          │
//!          ▼
//! render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod aggregator;
pub mod gauge;
pub mod prometheus;

pub use aggregator::MetricsAggregator;
pub use gauge::FreeGauges;
pub use prometheus::render_prometheus;
