//! Wait loop — poll for a claimable instance after a scale-up.
//!
//! Level-triggered: every `poll_interval` the loop lists free instances and
//! tries to claim one. Three things race in one `select!`: the tick, the
//! deadline, and the shutdown signal. Whichever fires first wins. Dropping
//! the future (the caller went away) drops both timers with it.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use sandbox_state::{ClusterClient, Dialect, SandboxInstance};

use crate::claim::claim_first;
use crate::error::{BrokerError, BrokerResult};
use crate::locator::locate_free;

/// Tick interval and overall deadline of the wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Poll until a usable instance of `dialect` is claimed.
///
/// The first check happens one interval after the call. A failed listing
/// is logged and retried on the next tick. Fails with `AllocationTimeout`
/// once `policy.timeout` has elapsed and with `Cancelled` when `shutdown`
/// turns true.
pub async fn wait_for_claim<F>(
    client: &dyn ClusterClient,
    dialect: Dialect,
    policy: WaitPolicy,
    usable: F,
    shutdown: watch::Receiver<bool>,
) -> BrokerResult<SandboxInstance>
where
    F: Fn(&SandboxInstance) -> bool,
{
    let started = Instant::now();
    let deadline = tokio::time::sleep(policy.timeout);
    tokio::pin!(deadline);
    let cancelled = cancelled(shutdown);
    tokio::pin!(cancelled);

    let mut ticker = tokio::time::interval_at(started + policy.poll_interval, policy.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = &mut cancelled => {
                debug!(%dialect, "wait for sandbox cancelled");
                return Err(BrokerError::Cancelled);
            }
            _ = &mut deadline => {
                return Err(BrokerError::AllocationTimeout {
                    dialect,
                    waited: started.elapsed(),
                });
            }
            _ = ticker.tick() => {
                let candidates = match locate_free(client, dialect).await {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(%dialect, error = %e, "listing failed while waiting; retrying next tick");
                        continue;
                    }
                };
                if let Some(claimed) = claim_first(client, &candidates, &usable).await {
                    debug!(
                        %dialect,
                        instance = %claimed.name,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "claimed new instance"
                    );
                    return Ok(claimed);
                }
            }
        }
    }
}

/// Resolves once `shutdown` reads true. Pends forever if the sender is gone.
async fn cancelled(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
