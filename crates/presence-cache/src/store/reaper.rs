//! Store-side application of expired disconnect guarantees

use std::future::Future;
use std::time::Duration;

use presence_core::KeyPrefix;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::keys;
use super::redis_store::apply_guarantee;
use crate::pool::{RedisPool, RedisPoolError, RedisResult};

/// Applies guarantees whose owning connection stopped refreshing its lease
///
/// Run one reaper per deployment next to Redis. Several reapers are safe:
/// a guarantee is applied by a script that first checks the guard is still
/// the one read, so exactly one of them, or a racing cancel, consumes it.
#[derive(Debug, Clone)]
pub struct GuaranteeReaper {
    pool: RedisPool,
    prefix: KeyPrefix,
    interval: Duration,
    scan_count: usize,
}

impl GuaranteeReaper {
    pub fn new(pool: RedisPool, prefix: KeyPrefix, interval: Duration) -> Self {
        Self {
            pool,
            prefix,
            interval,
            scan_count: 100,
        }
    }

    /// One pass over the key range; returns the number of guarantees applied
    pub async fn sweep(&self) -> RedisResult<usize> {
        let guards = self
            .pool
            .scan_keys(&keys::guard_pattern(&self.prefix), self.scan_count)
            .await?;

        let mut fired = 0;
        for guard in guards {
            let Some(key) = keys::key_from_guard(&self.prefix, &guard) else {
                continue;
            };
            if self.pool.exists(&keys::lease_key(&key)).await? {
                continue;
            }

            match apply_guarantee(&self.pool, &key, &guard).await {
                Ok(true) => {
                    info!(key = %key, "Lease expired, disconnect guarantee applied");
                    fired += 1;
                }
                // Cancelled, renewed, or the record moved on; next pass decides
                Ok(false) => debug!(key = %key, "Disconnect guarantee changed during sweep"),
                Err(RedisPoolError::Serialization(e)) => {
                    warn!(key = %guard, error = %e, "Dropping malformed disconnect guarantee");
                    self.pool.delete(&guard).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(fired)
    }

    /// Sweep every interval until `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            prefix = %self.prefix,
            interval_ms = self.interval.as_millis() as u64,
            "Guarantee reaper started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => match self.sweep().await {
                    Ok(0) => {}
                    Ok(fired) => debug!(fired, "Reaper sweep finished"),
                    Err(e) => warn!(error = %e, "Reaper sweep failed"),
                },
            }
        }

        info!("Guarantee reaper stopped");
    }
}
