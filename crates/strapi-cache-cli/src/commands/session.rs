//! Client lifecycle for commands that reach Strapi.

use anyhow::{Context, Result};
use std::sync::Arc;
use strapi_cache_core::{
    CacheStore, ChannelQueue, Config, FileStore, RefreshWorker, ReqwestTransport, StrapiClient,
    Transport,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A client plus the in-process refresh worker used with
/// `queue_connection = "local"`.
pub struct Session {
    client: StrapiClient,
    worker: Option<JoinHandle<usize>>,
}

impl Session {
    /// Open a session backed by a file cache in `cache_dir`.
    pub fn open(config: Config, cache_dir: std::path::PathBuf) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(
            ReqwestTransport::with_timeout(config.timeout())
                .context("Failed to create HTTP client")?,
        );
        let store: Arc<dyn CacheStore> = Arc::new(FileStore::new(cache_dir));
        let local_queue = config.uses_local_queue();

        let mut builder = StrapiClient::builder(config)
            .transport(Arc::clone(&transport))
            .store(Arc::clone(&store));

        let worker = if local_queue {
            let (queue, receiver) = ChannelQueue::new();
            builder = builder.queue(Arc::new(queue));
            let worker = RefreshWorker::new(transport, store);
            Some(tokio::spawn(async move { worker.run(receiver).await }))
        } else {
            None
        };

        let client = builder.build().context("Invalid configuration")?;
        Ok(Self { client, worker })
    }

    /// The client.
    pub const fn client(&self) -> &StrapiClient {
        &self.client
    }

    /// Wait for background refreshes and queued jobs, then shut down.
    pub async fn finish(self) {
        self.client.drain_background().await;
        // dropping the client closes the queue so the worker can exit
        drop(self.client);

        if let Some(worker) = self.worker {
            match worker.await {
                Ok(refreshed) => debug!(refreshed, "Refresh worker finished"),
                Err(e) => warn!("Refresh worker failed: {}", e),
            }
        }
    }
}
