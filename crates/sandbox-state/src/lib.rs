//! sandbox-state — the resource store behind the sandbox broker.
//!
//! Backed by [redb](https://docs.rs/redb), holds the two kinds of record the
//! broker cares about: sandbox instances (one running database engine each)
//! and dialect pools (the scalable group that owns them).
//!
//! # Architecture
//!
//! ```text
//! ClusterClient (trait, boxed futures)
//!   └── StateStore (redb)
//!         ├── INSTANCES  name → SandboxInstance
//!         ├── POOLS      name → DialectPool
//!         └── META       counters (instance name sequence)
//!
//! PoolReconciler
//!   └── converges instance count to pool replicas, promotes
//!       Pending → Running/Ready after a startup delay
//! ```
//!
//! Every record carries a `resource_version` that the store bumps on each
//! write. Conditional writes (`patch_claim`, `update_scale`) compare it inside
//! a single write transaction, which is what makes a claim exclusive.

pub mod client;
pub mod error;
pub mod reconciler;
pub mod store;
pub mod tables;
pub mod types;

pub use client::{ClusterClient, ClusterFuture};
pub use error::{StateError, StateResult};
pub use reconciler::{PoolReconciler, ReconcileReport};
pub use store::StateStore;
pub use types::*;
