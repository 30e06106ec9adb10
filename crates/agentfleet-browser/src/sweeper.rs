use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use crate::pool::BrowserPool;

const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Runs the pool's idle/persistent eviction and orphan reclamation sweep on
/// a fixed interval until `shutdown` fires.
pub async fn run(pool: Arc<BrowserPool>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = pool.sweep().await {
                    error!(error = %e, "browser pool sweep failed");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    pool.shutdown().await;
    info!("browser sweeper stopped");
}
