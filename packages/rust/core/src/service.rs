//! The service container built once at startup.
//!
//! Owns the shared store and embedding model and hands the tool layer its
//! indexer and search services. Crawlers are cheap and constructed per
//! operation because each one is scoped to a base URL.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use mwkb_crawler::CrawlLimits;
use mwkb_embedding::TextEncoder;
use mwkb_search::HybridSearch;
use mwkb_shared::{AppConfig, Result};
use mwkb_storage::Store;

use crate::indexer::Indexer;

/// Database file name under the configured data directory.
const DB_FILE_NAME: &str = "mwkb.db";

/// Long-lived handles shared by every tool operation.
pub struct KbService {
    /// The persistent store; exposed for integration tests and maintenance.
    pub store: Arc<Store>,
    /// The only writer to the store.
    pub indexer: Indexer,
    /// Read-only hybrid retrieval.
    pub search: HybridSearch,
    /// Crawl bounds applied when operations construct a crawler.
    pub crawl_limits: CrawlLimits,
    /// Result count for search operations.
    pub top_k: usize,
}

impl KbService {
    /// Wire a service from an already-open store and encoder.
    pub fn new(store: Arc<Store>, encoder: Arc<dyn TextEncoder>, config: &AppConfig) -> Self {
        let indexer = Indexer::new(store.clone(), encoder.clone());
        let search = HybridSearch::new(store.clone(), encoder);

        Self {
            store,
            indexer,
            search,
            crawl_limits: CrawlLimits {
                max_pages: config.crawl.max_pages,
                batch_size: config.crawl.batch_size,
                timeout_secs: config.crawl.timeout_secs,
            },
            top_k: config.search.top_k,
        }
    }

    /// Open the store under `data_dir` and wire a service.
    pub async fn open(
        data_dir: &Path,
        encoder: Arc<dyn TextEncoder>,
        config: &AppConfig,
    ) -> Result<Self> {
        let db_path = data_dir.join(DB_FILE_NAME);
        let store = Arc::new(Store::open(&db_path).await?);

        info!(db = %db_path.display(), "knowledge base opened");

        Ok(Self::new(store, encoder, config))
    }
}
