//! Cluster metadata refresh with fetch backoff.

use crate::cluster::ClusterView;
use crate::config::METADATA_REFRESH_BACKOFF;
use crate::error::Result;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of cluster metadata snapshots.
///
/// Implementors fetch the current membership and partition placement from
/// wherever the cluster publishes it.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync + std::fmt::Debug {
    /// Fetch a fresh snapshot.
    async fn fetch(&self) -> Result<ClusterView>;
}

/// Caching metadata client.
///
/// `refresh` re-fetches from the source unless the cached snapshot is
/// younger than the refresh backoff, which keeps tight polling loops from
/// hammering the metadata endpoint.
#[derive(Debug)]
pub struct MetadataClient {
    source: Arc<dyn MetadataSource>,
    backoff: Duration,
    cached: RwLock<CachedView>,
}

#[derive(Debug)]
struct CachedView {
    view: Arc<ClusterView>,
    fetched_at: Option<Instant>,
}

impl MetadataClient {
    /// Create a client with the default refresh backoff.
    pub fn new(source: Arc<dyn MetadataSource>) -> Self {
        Self::with_backoff(source, METADATA_REFRESH_BACKOFF)
    }

    /// Create a client with a custom refresh backoff.
    pub fn with_backoff(source: Arc<dyn MetadataSource>, backoff: Duration) -> Self {
        Self {
            source,
            backoff,
            cached: RwLock::new(CachedView {
                view: Arc::new(ClusterView::default()),
                fetched_at: None,
            }),
        }
    }

    /// Refresh and return the current snapshot.
    ///
    /// Returns the cached snapshot when the last fetch is younger than the
    /// backoff.
    pub async fn refresh(&self) -> Result<Arc<ClusterView>> {
        {
            let cached = self.cached.read();
            if let Some(at) = cached.fetched_at {
                if at.elapsed() < self.backoff {
                    return Ok(Arc::clone(&cached.view));
                }
            }
        }

        let view = Arc::new(self.source.fetch().await?);
        let mut cached = self.cached.write();
        cached.view = Arc::clone(&view);
        cached.fetched_at = Some(Instant::now());
        Ok(view)
    }

    /// The most recently fetched snapshot without refreshing.
    pub fn cluster(&self) -> Arc<ClusterView> {
        Arc::clone(&self.cached.read().view)
    }
}
