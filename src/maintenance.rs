use std::sync::Arc;
use std::time::Duration;

use crate::engine::Engine;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Compact the engine's WAL if it has accumulated at least `threshold`
/// appends since the last compaction. Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = match engine.wal_appends_since_compact().await {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(error = %e, "could not read WAL append count");
            return false;
        }
    };
    if appends < threshold {
        return false;
    }
    tracing::info!(appends, threshold, "compacting WAL");
    match engine.compact_wal().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "WAL compaction failed");
            false
        }
    }
}

/// Background compactor, one per tenant engine. Checks the append count
/// once a minute and rewrites the WAL when the threshold is crossed.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        compact_if_needed(&engine, threshold).await;
    }
}
