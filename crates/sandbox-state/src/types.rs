//! Domain types for the sandbox resource store.
//!
//! These types mirror what the cluster records about sandbox instances and
//! the pools that own them. All types serialize to/from JSON for storage in
//! redb tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a sandbox instance.
pub type InstanceName = String;

/// Unique identifier for a dialect pool.
pub type PoolName = String;

// ── Dialect ───────────────────────────────────────────────────────

/// Database engine flavor served by a sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Postgres,
    Mysql,
}

impl Dialect {
    /// Every known dialect, in declaration order.
    pub const ALL: [Dialect; 2] = [Dialect::Postgres, Dialect::Mysql];

    /// The lowercase name used in requests, labels, and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        }
    }

    /// Dense index into per-dialect arrays.
    pub fn index(&self) -> usize {
        match self {
            Dialect::Postgres => 0,
            Dialect::Mysql => 1,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known dialect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dialect: {0}")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| UnknownDialect(s.to_string()))
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// Whether an instance has been handed out.
///
/// Serialized with the label values the cluster uses (`state=free|busy`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimState {
    #[serde(rename = "free")]
    Unclaimed,
    #[serde(rename = "busy")]
    Claimed,
}

/// Lifecycle phase reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstancePhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Kind of a status condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionKind {
    Scheduled,
    Initialized,
    ContainersReady,
    Ready,
}

/// One status condition as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceCondition {
    pub kind: ConditionKind,
    pub status: bool,
}

/// One allocatable database engine, as recorded by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SandboxInstance {
    pub name: InstanceName,
    pub dialect: Dialect,
    /// Pool that owns this instance.
    pub pool: PoolName,
    pub claim: ClaimState,
    pub phase: InstancePhase,
    pub conditions: Vec<InstanceCondition>,
    /// Network address, assigned once the instance is running.
    pub address: Option<String>,
    /// Bumped by the store on every write.
    pub resource_version: u64,
    /// Unix timestamp (seconds) when the store created this instance.
    pub created_at: u64,
}

impl SandboxInstance {
    /// True iff a `Ready` condition reports `true`.
    ///
    /// Label-based listings can include instances that are still starting,
    /// so callers re-check with this before handing one out.
    pub fn is_ready(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.kind == ConditionKind::Ready && c.status)
    }

    /// Unclaimed, ready, and running.
    pub fn is_allocatable(&self) -> bool {
        self.claim == ClaimState::Unclaimed
            && self.phase == InstancePhase::Running
            && self.is_ready()
    }
}

/// Filter for instance listings. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceSelector {
    pub dialect: Option<Dialect>,
    pub claim: Option<ClaimState>,
    pub phase: Option<InstancePhase>,
}

impl InstanceSelector {
    /// Free, running instances of one dialect.
    pub fn free(dialect: Dialect) -> Self {
        Self {
            dialect: Some(dialect),
            claim: Some(ClaimState::Unclaimed),
            phase: Some(InstancePhase::Running),
        }
    }

    /// All unclaimed instances, any dialect or phase.
    pub fn unclaimed() -> Self {
        Self {
            claim: Some(ClaimState::Unclaimed),
            ..Self::default()
        }
    }

    pub fn matches(&self, instance: &SandboxInstance) -> bool {
        self.dialect.is_none_or(|d| d == instance.dialect)
            && self.claim.is_none_or(|c| c == instance.claim)
            && self.phase.is_none_or(|p| p == instance.phase)
    }
}

// ── Pool ──────────────────────────────────────────────────────────

/// The scalable group backing one dialect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DialectPool {
    pub name: PoolName,
    pub dialect: Dialect,
    /// Desired replica count.
    pub replicas: u32,
    pub resource_version: u64,
}

/// The scale sub-resource of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolScale {
    pub replicas: u32,
    pub resource_version: u64,
}

impl DialectPool {
    pub fn scale(&self) -> PoolScale {
        PoolScale {
            replicas: self.replicas,
            resource_version: self.resource_version,
        }
    }
}
