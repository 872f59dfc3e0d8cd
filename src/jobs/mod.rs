/// Background janitor loops
///
/// Each loop is spawned once at startup and runs for the life of the
/// process. Failures are logged and the loop keeps its schedule; a sweep
/// that keeps failing shows up as a degraded component on
/// `/health/detailed`.
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::context::AppContext;

pub mod tasks;

const REACTION_SWEEP_PERIOD: Duration = Duration::from_secs(6 * 60 * 60);
const UPLOAD_PURGE_PERIOD: Duration = Duration::from_secs(60 * 60);
const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(5 * 60);

pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Spawn every janitor loop.
    pub fn start(self: Arc<Self>) {
        tokio::spawn(Arc::clone(&self).reaction_sweep_loop());
        tokio::spawn(Arc::clone(&self).upload_purge_loop());
        tokio::spawn(self.health_check_loop());
        info!("background jobs running");
    }

    /// Remove reaction rows whose video or comment has been deleted.
    async fn reaction_sweep_loop(self: Arc<Self>) {
        let mut tick = interval(REACTION_SWEEP_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            match tasks::sweep_orphaned_reactions(&self.context).await {
                Ok(0) => {}
                Ok(swept) => info!(swept, "removed reactions without a target"),
                Err(e) => error!(error = %e, "reaction sweep failed"),
            }
        }
    }

    /// Drop drafts the transcoding pipeline never claimed.
    async fn upload_purge_loop(self: Arc<Self>) {
        let mut tick = interval(UPLOAD_PURGE_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            match tasks::purge_stale_uploads(&self.context).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged abandoned upload drafts"),
                Err(e) => error!(error = %e, "stale upload purge failed"),
            }
        }
    }

    /// Periodic pulse so a wedged pool is noticed between requests.
    async fn health_check_loop(self: Arc<Self>) {
        let mut tick = interval(HEALTH_CHECK_PERIOD);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tick.tick().await;
            if let Err(e) = tasks::health_check(&self.context).await {
                error!(error = %e, "database health check failed");
            }
        }
    }
}
