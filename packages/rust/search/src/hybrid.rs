//! Dense + BM25 hybrid ranking producing whole-page results.
//!
//! The dense phase nominates candidates; BM25 can only rescore them.
//! Blending is 70/30 in dense's favor, and a candidate without lexical
//! evidence keeps its dense score unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use mwkb_embedding::TextEncoder;
use mwkb_shared::{Result, SearchResult};
use mwkb_storage::Store;

use crate::bm25::{Bm25Okapi, tokenize};

/// Weight of the dense score in the blend.
const DENSE_WEIGHT: f64 = 0.7;

/// Weight of the normalized BM25 score in the blend.
const BM25_WEIGHT: f64 = 0.3;

/// Cap on dense candidates pulled per query.
const MAX_CANDIDATES: usize = 40;

/// Read-only hybrid search over the shared store.
pub struct HybridSearch {
    store: Arc<Store>,
    encoder: Arc<dyn TextEncoder>,
}

impl HybridSearch {
    pub fn new(store: Arc<Store>, encoder: Arc<dyn TextEncoder>) -> Self {
        Self { store, encoder }
    }

    /// Top `top_k` pages for a natural-language query, scores descending.
    #[instrument(skip_all, fields(query_len = query.len(), top_k))]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        // Dense phase: nearest chunks across all views, collapsed to the
        // best similarity per parent page. First occurrence fixes the
        // tie-break order.
        let query_embedding = self.encoder.encode(query)?;
        let n = (4 * top_k).min(MAX_CANDIDATES);
        let hits = self.store.query_chunks(&query_embedding, n).await?;

        let mut order: Vec<String> = Vec::new();
        let mut dense: HashMap<String, f64> = HashMap::new();
        let mut meta: HashMap<String, (String, String)> = HashMap::new();

        for hit in hits {
            let similarity = 1.0 - hit.distance;
            match dense.get(&hit.parent_url) {
                None => {
                    order.push(hit.parent_url.clone());
                    meta.insert(
                        hit.parent_url.clone(),
                        (hit.title.clone(), hit.breadcrumb.clone()),
                    );
                    dense.insert(hit.parent_url, similarity);
                }
                Some(&best) if similarity > best => {
                    meta.insert(
                        hit.parent_url.clone(),
                        (hit.title.clone(), hit.breadcrumb.clone()),
                    );
                    dense.insert(hit.parent_url, similarity);
                }
                Some(_) => {}
            }
        }

        if order.is_empty() {
            return Ok(Vec::new());
        }

        // Lexical phase: BM25 over the candidates' stored texts, normalized
        // by the max score. Candidates without lexical evidence drop out of
        // the BM25 map entirely.
        let bm25_scores = self.bm25_rescore(query, &order).await?;

        debug!(
            candidates = order.len(),
            with_bm25 = bm25_scores.len(),
            "blending scores"
        );

        // Blend and rank. Stable sort keeps dense insertion order on ties.
        let mut ranked: Vec<(String, f64)> = order
            .into_iter()
            .map(|url| {
                let d = dense[&url];
                let score = match bm25_scores.get(&url) {
                    Some(b) => DENSE_WEIGHT * d + BM25_WEIGHT * b,
                    None => d,
                };
                (url, score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);

        // Assemble whole-page results, dropping any document that has
        // vanished since the dense phase.
        let mut results = Vec::with_capacity(ranked.len());
        for (url, score) in ranked {
            let Some(content) = self.store.get_document(&url).await? else {
                continue;
            };
            let (title, breadcrumb) = meta.remove(&url).unwrap_or_default();
            results.push(SearchResult {
                url,
                title,
                breadcrumb,
                score: round4(score.clamp(0.0, 1.0)),
                content,
            });
        }

        Ok(results)
    }

    /// Normalized BM25 scores for the candidate URLs, zero scores dropped.
    async fn bm25_rescore(
        &self,
        query: &str,
        candidates: &[String],
    ) -> Result<HashMap<String, f64>> {
        let mut corpus: Vec<Vec<String>> = Vec::with_capacity(candidates.len());
        for url in candidates {
            let text = self.store.get_document(url).await?.unwrap_or_default();
            corpus.push(tokenize(&text));
        }

        if corpus.is_empty() {
            return Ok(HashMap::new());
        }

        let bm25 = Bm25Okapi::new(&corpus);
        let scores = bm25.scores(&tokenize(query));

        let max = scores.iter().cloned().fold(0.0f64, f64::max);
        let denom = if max > 0.0 { max } else { 1.0 };

        Ok(candidates
            .iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .map(|(url, score)| (url.clone(), score / denom))
            .collect())
    }
}

/// Round to four decimal places for the wire format.
fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use mwkb_embedding::stub::HashEncoder;
    use mwkb_shared::DocumentMeta;
    use mwkb_storage::ChunkRecord;
    use uuid::Uuid;

    async fn test_store() -> Arc<Store> {
        let tmp = std::env::temp_dir().join(format!("mwkb_search_{}.db", Uuid::now_v7()));
        Arc::new(Store::open(&tmp).await.expect("open test db"))
    }

    /// Seed one page with a document row and its three view chunks.
    async fn seed_page(store: &Store, encoder: &dyn TextEncoder, url: &str, title: &str, body: &str) {
        let breadcrumb = format!("Docs > {title}");
        let blob = format!("Navigation: {breadcrumb}\nTitle: {title}\n\n{body}");
        store
            .upsert_document(
                &DocumentMeta {
                    url: url.into(),
                    title: title.into(),
                    breadcrumb: breadcrumb.clone(),
                    domain: "docs.example.com".into(),
                },
                &blob,
            )
            .await
            .unwrap();

        let views = [
            breadcrumb.clone(),
            format!("{title} - {breadcrumb}"),
            blob.clone(),
        ];
        for (i, view) in views.iter().enumerate() {
            store
                .upsert_chunk(&ChunkRecord {
                    id: format!("{url}::{i}"),
                    parent_url: url.into(),
                    title: title.into(),
                    breadcrumb: breadcrumb.clone(),
                    view_type: mwkb_shared::VIEW_LABELS[i].into(),
                    domain: "docs.example.com".into(),
                    body: view.clone(),
                    embedding: encoder.encode(view).unwrap(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn search_ranks_lexically_and_semantically_matching_page_first() {
        let store = test_store().await;
        let encoder: Arc<dyn TextEncoder> = Arc::new(HashEncoder::new());

        seed_page(
            &store,
            encoder.as_ref(),
            "https://docs.example.com/docs/compound-actions",
            "Compound Actions",
            "Compound actions chain multiple steps together.",
        )
        .await;
        seed_page(
            &store,
            encoder.as_ref(),
            "https://docs.example.com/docs/billing",
            "Billing",
            "Invoices and quota management.",
        )
        .await;

        let search = HybridSearch::new(store, encoder);
        let results = search.search("compound actions", 5).await.unwrap();

        assert!(!results.is_empty());
        assert!(results[0].url.contains("compound-actions"));
    }

    #[tokio::test]
    async fn search_shape_invariants_hold() {
        let store = test_store().await;
        let encoder: Arc<dyn TextEncoder> = Arc::new(HashEncoder::new());

        for i in 0..6 {
            seed_page(
                &store,
                encoder.as_ref(),
                &format!("https://docs.example.com/docs/page-{i}"),
                &format!("Page {i}"),
                "script actions run inline code",
            )
            .await;
        }

        let search = HybridSearch::new(store, encoder);
        let results = search.search("script actions", 3).await.unwrap();

        assert!(results.len() <= 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for r in &results {
            assert!((0.0..=1.0).contains(&r.score));
        }
        let mut urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        urls.dedup();
        assert_eq!(urls.len(), results.len());
    }

    #[tokio::test]
    async fn candidates_without_lexical_evidence_keep_dense_score() {
        let store = test_store().await;
        let encoder: Arc<dyn TextEncoder> = Arc::new(HashEncoder::new());

        seed_page(
            &store,
            encoder.as_ref(),
            "https://docs.example.com/docs/switch",
            "Switch",
            "switch statements branch on values",
        )
        .await;
        seed_page(
            &store,
            encoder.as_ref(),
            "https://docs.example.com/docs/unrelated",
            "Unrelated",
            "nothing in common here",
        )
        .await;

        let search = HybridSearch::new(store, encoder);
        let results = search.search("switch statements", 10).await.unwrap();

        // Both pages are dense candidates; only one has BM25 evidence.
        let urls: Vec<&str> = results.iter().map(|r| r.url.as_str()).collect();
        assert!(urls[0].contains("/switch"));
        assert!(urls.iter().any(|u| u.contains("/unrelated")));
    }

    #[tokio::test]
    async fn vanished_documents_are_dropped_from_results() {
        let store = test_store().await;
        let encoder: Arc<dyn TextEncoder> = Arc::new(HashEncoder::new());

        seed_page(
            &store,
            encoder.as_ref(),
            "https://docs.example.com/docs/ghost",
            "Ghost",
            "ghost page content",
        )
        .await;
        // Document removed, chunks left behind.
        store
            .delete_document("https://docs.example.com/docs/ghost")
            .await
            .unwrap();

        let search = HybridSearch::new(store, encoder);
        let results = search.search("ghost page", 5).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_store_returns_empty() {
        let store = test_store().await;
        let encoder: Arc<dyn TextEncoder> = Arc::new(HashEncoder::new());
        let search = HybridSearch::new(store, encoder);

        let results = search.search("anything", 10).await.unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn rounding_is_four_decimals() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(1.0), 1.0);
        assert_eq!(round4(0.0), 0.0);
    }
}
