//! Lifecycle Sweeper
//!
//! Periodically evicts sessions that have outlived the retention window,
//! whatever their status. Evicted sessions vanish silently; attached
//! connections simply stop receiving updates for them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::core::code::SessionCode;
use crate::network::presence::Presence;
use crate::network::registry::SessionRegistry;

/// Sweeper timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Maximum session age.
    pub retention: Duration,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10 * 60),
            retention: Duration::from_secs(2 * 60 * 60),
        }
    }
}

/// Evict every session older than `retention` at `now` and drop its
/// presence routes.
pub async fn sweep_at(
    registry: &SessionRegistry,
    presence: &Presence,
    now: DateTime<Utc>,
    retention: Duration,
) -> Vec<SessionCode> {
    let evicted = registry.evict_expired(now, retention).await;
    for code in &evicted {
        presence.forget_session(code).await;
        info!(game_id = %code, "expired game evicted");
    }
    evicted
}

/// Sweep forever on `config.interval`. The first sweep runs one full
/// interval after start.
pub async fn run_sweeper(
    registry: Arc<SessionRegistry>,
    presence: Arc<Presence>,
    config: SweeperConfig,
) {
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let evicted = sweep_at(&registry, &presence, Utc::now(), config.retention).await;
        if !evicted.is_empty() {
            let remaining = registry.session_count().await;
            info!(evicted = evicted.len(), remaining, "sweep complete");
        }
    }
}
