//! sandbox-broker — hands out exclusive database sandboxes.
//!
//! A caller asks for a dialect; the broker finds a free, ready instance in
//! that dialect's pool, claims it, and returns a connection descriptor. When
//! the pool is exhausted it adds one replica and polls until a new instance
//! can be claimed or the allocation times out.
//!
//! # Architecture
//!
//! ```text
//! Allocator
//!   ├── locator   list free instances of a dialect
//!   ├── claim     version-guarded claim, first usable candidate wins
//!   ├── scale     pool replicas += 1
//!   ├── wait      tick / deadline / shutdown loop
//!   ├── release   delete a finished instance
//!   └── connection  descriptor formatting and host selection
//!          │
//!          ▼
//!   dyn ClusterClient  (sandbox-state)
//! ```

pub mod allocator;
pub mod claim;
pub mod config;
pub mod connection;
pub mod error;
pub mod locator;
pub mod release;
pub mod scale;
pub mod wait;

#[cfg(test)]
mod testing;

pub use allocator::{Allocation, Allocator};
pub use config::{Addressing, BrokerConfig, DialectConfig, MetricsConfig};
pub use error::{BrokerError, BrokerResult};
pub use wait::WaitPolicy;
