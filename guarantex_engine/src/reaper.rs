use log::*;
use tokio::task::JoinHandle;

use crate::{config::EngineConfig, events::EventProducers, DealFlowApi, SqliteDatabase};

/// Starts the reaper worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `config.reaper_interval` the worker hard-deletes `waiting_buyer` deals that sat
/// unattended for longer than `config.waiting_buyer_timeout`. Their codes stay reserved. The
/// pass only ever touches that one narrow status, so it is safe alongside normal traffic, and
/// running two workers by accident is merely wasteful, not harmful.
pub fn start_reaper_worker(db: SqliteDatabase, config: EngineConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.reaper_interval);
        let api = DealFlowApi::new(db, config, EventProducers::default());
        info!("🕰️ Unattended deal reaper started");
        loop {
            timer.tick().await;
            match api.purge_stale_deals().await {
                Ok(0) => trace!("🕰️ Reaper pass complete; nothing to purge"),
                Ok(n) => info!("🕰️ Reaper purged {n} unattended deal(s)"),
                Err(e) => error!("🕰️ Error running the reaper job: {e}"),
            }
        }
    })
}
