//! Content-addressed, idempotent page indexing.
//!
//! A page becomes one document plus up to three view chunks. Chunk ids are
//! deterministic digests of `"{url}::view::{i}"`, so a forced re-index
//! overwrites instead of duplicating. The document is always written before
//! its chunks; removal deletes the document first, then the chunks.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use mwkb_embedding::{TextEncoder, truncate_chars};
use mwkb_shared::{DocumentMeta, IndexOutcome, Page, Result, VIEW_LABELS};
use mwkb_storage::{ChunkRecord, Store};

/// Character cap for the `full_content` view.
const FULL_CONTENT_CAP: usize = 2000;

/// The only writer to the store.
pub struct Indexer {
    store: Arc<Store>,
    encoder: Arc<dyn TextEncoder>,
}

impl Indexer {
    pub fn new(store: Arc<Store>, encoder: Arc<dyn TextEncoder>) -> Self {
        Self { store, encoder }
    }

    /// Index one page. Returns the URL when a write occurred, `None` when
    /// the page already existed and `force` was not set.
    #[instrument(skip(self, page), fields(url = %page.url))]
    pub async fn index_page(&self, page: &Page, force: bool) -> Result<Option<String>> {
        if !force && self.store.document_exists(&page.url).await? {
            debug!(url = %page.url, "skipping already-indexed page");
            return Ok(None);
        }

        let blob = page.enriched_blob();
        self.store
            .upsert_document(
                &DocumentMeta {
                    url: page.url.clone(),
                    title: page.title.clone(),
                    breadcrumb: page.breadcrumb.clone(),
                    domain: page.domain.clone(),
                },
                &blob,
            )
            .await?;

        for (i, view) in views_of(page, &blob).into_iter().enumerate() {
            if view.trim().is_empty() {
                continue;
            }
            let embedding = self.encoder.encode(&view)?;
            self.store
                .upsert_chunk(&ChunkRecord {
                    id: chunk_id(&page.url, i),
                    parent_url: page.url.clone(),
                    title: page.title.clone(),
                    breadcrumb: page.breadcrumb.clone(),
                    view_type: VIEW_LABELS[i].to_string(),
                    domain: page.domain.clone(),
                    body: view,
                    embedding,
                })
                .await?;
        }

        debug!(url = %page.url, "indexed page");
        Ok(Some(page.url.clone()))
    }

    /// Index a batch of pages, partitioning into newly written and skipped.
    pub async fn index_pages<'a, I>(&self, pages: I, force: bool) -> Result<IndexOutcome>
    where
        I: IntoIterator<Item = &'a Page>,
    {
        let mut outcome = IndexOutcome::default();

        for page in pages {
            match self.index_page(page, force).await? {
                Some(url) => outcome.indexed.push(url),
                None => outcome.skipped.push(page.url.clone()),
            }
        }

        if !outcome.skipped.is_empty() {
            info!(
                indexed = outcome.indexed.len(),
                skipped = outcome.skipped.len(),
                "index batch had already-indexed pages"
            );
        }

        Ok(outcome)
    }

    /// Remove one page and its chunks. Best-effort: store errors are
    /// logged, not propagated.
    #[instrument(skip(self))]
    pub async fn remove_page(&self, url: &str) {
        if let Err(e) = self.store.delete_document(url).await {
            warn!(url, error = %e, "document delete failed");
        }
        if let Err(e) = self.store.delete_chunks_by_parent(url).await {
            warn!(url, error = %e, "chunk delete failed");
        }
    }

    /// Remove every document and chunk for a domain. Best-effort.
    #[instrument(skip(self))]
    pub async fn remove_domain(&self, domain: &str) {
        if let Err(e) = self.store.delete_documents_by_domain(domain).await {
            warn!(domain, error = %e, "domain document delete failed");
        }
        if let Err(e) = self.store.delete_chunks_by_domain(domain).await {
            warn!(domain, error = %e, "domain chunk delete failed");
        }
    }

    /// Document metadata, optionally filtered by domain.
    pub async fn list_pages(&self, domain: Option<&str>) -> Result<Vec<DocumentMeta>> {
        self.store.list_documents(domain).await
    }

    /// Full stored text of a page.
    pub async fn page_text(&self, url: &str) -> Result<Option<String>> {
        self.store.get_document(url).await
    }
}

/// The three textual projections of a page, in [`VIEW_LABELS`] order.
fn views_of(page: &Page, blob: &str) -> [String; 3] {
    [
        page.breadcrumb.clone(),
        format!("{} - {}", page.title, page.breadcrumb),
        truncate_chars(blob, FULL_CONTENT_CAP),
    ]
}

/// 128-bit hex digest of `"{url}::view::{i}"`.
fn chunk_id(url: &str, view_index: usize) -> String {
    let digest = Sha256::digest(format!("{url}::view::{view_index}").as_bytes());
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}
