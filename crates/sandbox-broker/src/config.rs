//! broker.toml configuration parser.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! deployment the broker was built for: a `database` namespace with
//! `pg-sandbox` and `mysql-sandbox` pools. The `[dialects]` table, when
//! present, replaces the defaults and defines the supported dialect set.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use sandbox_state::Dialect;

/// Which address a connection descriptor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Addressing {
    /// The claimed instance's own network address.
    #[default]
    Instance,
    /// The pool's stable service host, which balances across ready instances.
    Pool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Namespace the pools live in; used to derive default service hosts.
    pub namespace: String,
    /// Wait-loop tick interval after a scale-up.
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,
    /// Wait-loop deadline, measured from the start of the wait.
    #[serde(with = "duration_str")]
    pub allocation_timeout: Duration,
    pub addressing: Addressing,
    pub metrics: MetricsConfig,
    /// Supported dialects keyed by dialect name.
    pub dialects: BTreeMap<String, DialectConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Aggregation period for the free-sandbox gauges.
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// Count only instances whose Ready condition is true.
    pub require_ready: bool,
}

/// How to reach and scale one dialect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialectConfig {
    /// Name of the backing pool in the resource store.
    pub pool: String,
    /// URI scheme of the connection descriptor.
    pub scheme: String,
    pub port: u16,
    /// Stable pool-level host; defaults to `{pool}.{namespace}.svc.cluster.local`.
    pub service_host: Option<String>,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Query string appended to the descriptor, without the leading `?`.
    pub options: Option<String>,
    /// Replica count used when the pool does not exist yet.
    #[serde(default = "default_initial_replicas")]
    pub initial_replicas: u32,
}

fn default_user() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "password".to_string()
}

fn default_database() -> String {
    "default_db".to_string()
}

fn default_initial_replicas() -> u32 {
    1
}

impl DialectConfig {
    pub fn postgres() -> Self {
        Self {
            pool: "pg-sandbox".to_string(),
            scheme: "postgres".to_string(),
            port: 5432,
            service_host: None,
            user: default_user(),
            password: default_password(),
            database: default_database(),
            options: Some("sslmode=disable".to_string()),
            initial_replicas: 2,
        }
    }

    pub fn mysql() -> Self {
        Self {
            pool: "mysql-sandbox".to_string(),
            scheme: "mysql".to_string(),
            port: 3306,
            service_host: None,
            user: default_user(),
            password: default_password(),
            database: default_database(),
            options: None,
            initial_replicas: 1,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            require_ready: true,
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let mut dialects = BTreeMap::new();
        dialects.insert(Dialect::Postgres.to_string(), DialectConfig::postgres());
        dialects.insert(Dialect::Mysql.to_string(), DialectConfig::mysql());
        Self {
            namespace: "database".to_string(),
            poll_interval: Duration::from_secs(2),
            allocation_timeout: Duration::from_secs(60),
            addressing: Addressing::default(),
            metrics: MetricsConfig::default(),
            dialects,
        }
    }
}

impl BrokerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: BrokerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject dialect keys that name no known dialect and zero intervals.
    pub fn validate(&self) -> anyhow::Result<()> {
        for key in self.dialects.keys() {
            key.parse::<Dialect>()
                .map_err(|e| anyhow::anyhow!("[dialects.{key}]: {e}"))?;
        }
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than zero");
        }
        if self.metrics.interval.is_zero() {
            anyhow::bail!("metrics.interval must be greater than zero");
        }
        Ok(())
    }

    /// Configuration for `dialect`, if it is supported.
    pub fn dialect(&self, dialect: Dialect) -> Option<&DialectConfig> {
        self.dialects.get(dialect.as_str())
    }

    /// Supported dialects, in name order.
    pub fn supported(&self) -> Vec<Dialect> {
        self.dialects
            .keys()
            .filter_map(|k| k.parse().ok())
            .collect()
    }

    /// The pool-level host for a dialect.
    pub fn service_host(&self, cfg: &DialectConfig) -> String {
        cfg.service_host
            .clone()
            .unwrap_or_else(|| format!("{}.{}.svc.cluster.local", cfg.pool, self.namespace))
    }
}

/// Parse a duration string like "2s", "500ms", "5m", or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("invalid duration: {s:?}");
    let parse = |n: &str| n.trim().parse::<u64>().map_err(|_| invalid());
    if let Some(ms) = s.strip_suffix("ms") {
        Ok(Duration::from_millis(parse(ms)?))
    } else if let Some(secs) = s.strip_suffix('s') {
        Ok(Duration::from_secs(parse(secs)?))
    } else if let Some(mins) = s.strip_suffix('m') {
        let secs = parse(mins)?.checked_mul(60).ok_or_else(invalid)?;
        Ok(Duration::from_secs(secs))
    } else {
        Ok(Duration::from_secs(parse(s)?))
    }
}

/// Render a duration the way `parse_duration` reads it back.
pub fn format_duration(d: &Duration) -> String {
    if d.subsec_millis() != 0 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{}s", d.as_secs())
    }
}

mod duration_str {
    use super::*;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
