//! Periodic expired-entry cleanup as a cancellable tokio task.
//!
//! Replaces the daemon-thread-with-stop-event idiom: a ticker loop that
//! exits on a watch-channel signal and is joined with a bounded timeout on
//! shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::SemanticQueryCache;

pub struct CacheMaintenance {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CacheMaintenance {
    /// Spawn the cleanup loop; `every` is the purge interval.
    pub fn spawn<T>(cache: Arc<SemanticQueryCache<T>>, every: Duration) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let purged = cache.purge_expired();
                        if purged > 0 {
                            debug!(purged, "cache maintenance pass");
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }
        });
        Self { stop, handle }
    }

    /// Signal the loop to stop and wait for it, bounded to two seconds.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        if tokio::time::timeout(Duration::from_secs(2), self.handle)
            .await
            .is_err()
        {
            warn!("cache maintenance task did not stop in time");
        }
    }
}
