//! Metrics aggregator — periodic count of free instances per dialect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use sandbox_state::{ClusterClient, Dialect, InstanceSelector};

use crate::gauge::FreeGauges;

/// Recounts free instances on a fixed interval and publishes the counts.
pub struct MetricsAggregator {
    client: Arc<dyn ClusterClient>,
    gauges: Arc<FreeGauges>,
    interval: Duration,
    /// Count only Running + Ready instances.
    require_ready: bool,
    /// Dialects that are always published, zero included.
    dialects: Vec<Dialect>,
}

impl MetricsAggregator {
    pub fn new(
        client: Arc<dyn ClusterClient>,
        gauges: Arc<FreeGauges>,
        interval: Duration,
        require_ready: bool,
        dialects: Vec<Dialect>,
    ) -> Self {
        Self {
            client,
            gauges,
            interval,
            require_ready,
            dialects,
        }
    }

    pub fn gauges(&self) -> Arc<FreeGauges> {
        Arc::clone(&self.gauges)
    }

    /// List unclaimed instances once and publish per-dialect counts.
    ///
    /// On failure nothing is published and the previous values stand.
    pub async fn refresh(&self) -> anyhow::Result<Vec<(Dialect, u64)>> {
        let instances = self
            .client
            .list_instances(&InstanceSelector::unclaimed())
            .await?;

        let mut counts: HashMap<Dialect, u64> = HashMap::new();
        for inst in &instances {
            if self.require_ready && !inst.is_allocatable() {
                continue;
            }
            *counts.entry(inst.dialect).or_default() += 1;
        }

        let mut published = Vec::with_capacity(self.dialects.len());
        for &dialect in &self.dialects {
            let free = counts.get(&dialect).copied().unwrap_or(0);
            self.gauges.set(dialect, free);
            published.push((dialect, free));
        }
        debug!(?published, "free sandbox gauges refreshed");
        Ok(published)
    }

    /// Refresh immediately, then every interval until shutdown.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            require_ready = self.require_ready,
            "metrics aggregator started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::error!(error = %e, "metrics refresh failed; keeping previous values");
                    }
                }
                _ = shutdown.changed() => {
                    info!("metrics aggregator shutting down");
                    break;
                }
            }
        }
    }
}
