//! The five `mw_kb_*` tool operations and their dispatch table.
//!
//! Parameter objects deserialize with serde and are validated before any
//! side effect. Operation errors never escape [`dispatch`]: they are
//! serialized as `{"status": "error", "message": …}` for the caller.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use mwkb_crawler::{CrawlLimits, Crawler};
use mwkb_shared::{KbError, Result, url as urls};

use crate::service::KbService;

/// Tool names, part of the wire contract.
pub const TOOL_INDEX_PAGES: &str = "mw_kb_index_pages";
pub const TOOL_INDEX_DOMAIN: &str = "mw_kb_index_domain";
pub const TOOL_LIST: &str = "mw_kb_list";
pub const TOOL_REMOVE: &str = "mw_kb_remove";
pub const TOOL_SEARCH: &str = "mw_kb_search";

/// All tool names, for listings and help output.
pub const TOOL_NAMES: [&str; 5] = [
    TOOL_INDEX_PAGES,
    TOOL_INDEX_DOMAIN,
    TOOL_LIST,
    TOOL_REMOVE,
    TOOL_SEARCH,
];

// ---------------------------------------------------------------------------
// Parameter objects
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IndexPagesParams {
    /// Page URLs to fetch and index individually (no link-following).
    pub urls: Vec<String>,
    /// Overwrite pages that already exist in the knowledge base.
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct IndexDomainParams {
    /// Full URL of the site's sitemap.xml.
    pub sitemap_url: String,
    /// Base URL of the documentation domain.
    pub base_url: String,
    /// Maximum number of pages to crawl and index.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Overwrite pages that already exist in the knowledge base.
    #[serde(default)]
    pub force_refresh: bool,
}

fn default_max_pages() -> usize {
    300
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Restrict the listing to one domain.
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoveParams {
    /// Specific page URLs to remove.
    #[serde(default)]
    pub urls: Option<Vec<String>>,
    /// Domain whose pages should all be removed.
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    /// Natural-language query.
    pub query: String,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run a tool by name. Parameter and execution errors are folded into an
/// error result object rather than propagated.
pub async fn dispatch(service: &KbService, tool: &str, params: Value) -> Value {
    let result = match tool {
        TOOL_INDEX_PAGES => match parse_params::<IndexPagesParams>(tool, params) {
            Ok(p) => index_pages(service, p).await,
            Err(e) => Err(e),
        },
        TOOL_INDEX_DOMAIN => match parse_params::<IndexDomainParams>(tool, params) {
            Ok(p) => index_domain(service, p).await,
            Err(e) => Err(e),
        },
        TOOL_LIST => match parse_params::<ListParams>(tool, params) {
            Ok(p) => list(service, p).await,
            Err(e) => Err(e),
        },
        TOOL_REMOVE => match parse_params::<RemoveParams>(tool, params) {
            Ok(p) => remove(service, p).await,
            Err(e) => Err(e),
        },
        TOOL_SEARCH => match parse_params::<SearchParams>(tool, params) {
            Ok(p) => search(service, p).await,
            Err(e) => Err(e),
        },
        other => Err(KbError::validation(format!("unknown tool: {other}"))),
    };

    match result {
        Ok(value) => value,
        Err(e) => json!({ "status": "error", "message": e.to_string() }),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(tool: &str, params: Value) -> Result<T> {
    // A request with no params at all is the empty parameter object.
    let params = if params.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params)
        .map_err(|e| KbError::validation(format!("invalid arguments for {tool}: {e}")))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Fetch and index an explicit list of page URLs.
#[instrument(skip_all, fields(url_count = params.urls.len(), force = params.force_refresh))]
pub async fn index_pages(service: &KbService, params: IndexPagesParams) -> Result<Value> {
    if params.urls.is_empty() {
        return Err(KbError::validation("urls must not be empty"));
    }

    let base = urls::parse(&params.urls[0])?;
    let crawler = Crawler::new(base, service.crawl_limits.clone())?;
    let pages = crawler.fetch_many(&params.urls).await;

    let outcome = service
        .indexer
        .index_pages(pages.values(), params.force_refresh)
        .await?;

    info!(
        indexed = outcome.indexed.len(),
        skipped = outcome.skipped.len(),
        "index_pages complete"
    );

    Ok(json!({
        "status": "success",
        "indexed_count": outcome.indexed.len(),
        "skipped_count": outcome.skipped.len(),
        "indexed_urls": outcome.indexed,
        "skipped_urls": outcome.skipped,
    }))
}

/// Crawl a documentation domain from its sitemap and index every page.
#[instrument(skip_all, fields(base = %params.base_url, max_pages = params.max_pages))]
pub async fn index_domain(service: &KbService, params: IndexDomainParams) -> Result<Value> {
    let base = urls::parse(&params.base_url)?;

    let limits = CrawlLimits {
        max_pages: params.max_pages,
        ..service.crawl_limits.clone()
    };
    let crawler = Crawler::new(base, limits)?;
    let pages = crawler.crawl_domain(Some(&params.sitemap_url)).await;
    let total_found = pages.len();

    let outcome = service
        .indexer
        .index_pages(pages.values(), params.force_refresh)
        .await?;

    info!(
        total_found,
        indexed = outcome.indexed.len(),
        skipped = outcome.skipped.len(),
        "index_domain complete"
    );

    Ok(json!({
        "status": "success",
        "domain": params.base_url,
        "total_pages_found": total_found,
        "indexed_count": outcome.indexed.len(),
        "skipped_count": outcome.skipped.len(),
        "indexed_urls": outcome.indexed,
        "skipped_urls": outcome.skipped,
    }))
}

/// List indexed pages grouped by domain.
#[instrument(skip_all, fields(domain = params.domain.as_deref().unwrap_or("-")))]
pub async fn list(service: &KbService, params: ListParams) -> Result<Value> {
    let pages = service.indexer.list_pages(params.domain.as_deref()).await?;

    let mut grouped: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for page in &pages {
        grouped.entry(page.domain.clone()).or_default().push(json!({
            "url": page.url,
            "title": page.title,
            "navigation_path": page.breadcrumb,
        }));
    }

    Ok(json!({
        "total_pages": pages.len(),
        "domains": grouped,
    }))
}

/// Remove pages by URL and/or every page of a domain.
#[instrument(skip_all)]
pub async fn remove(service: &KbService, params: RemoveParams) -> Result<Value> {
    let no_urls = params.urls.as_ref().is_none_or(|u| u.is_empty());
    if no_urls && params.domain.is_none() {
        return Err(KbError::validation(
            "remove requires urls and/or a domain",
        ));
    }

    let mut removed: Vec<String> = Vec::new();

    if let Some(urls) = params.urls {
        for url in urls {
            service.indexer.remove_page(&url).await;
            removed.push(url);
        }
    }

    if let Some(domain) = params.domain {
        service.indexer.remove_domain(&domain).await;
        removed.push(format!("all pages from domain: {domain}"));
    }

    info!(removed = removed.len(), "remove complete");

    Ok(json!({
        "status": "success",
        "removed": removed,
    }))
}

/// Hybrid search over the whole knowledge base.
#[instrument(skip_all, fields(query_len = params.query.len()))]
pub async fn search(service: &KbService, params: SearchParams) -> Result<Value> {
    if params.query.trim().is_empty() {
        return Err(KbError::validation("query must not be empty"));
    }

    let results = service.search.search(&params.query, service.top_k).await?;

    Ok(json!({
        "query": params.query,
        "total_results": results.len(),
        "results": results
            .iter()
            .enumerate()
            .map(|(i, r)| json!({
                "rank": i + 1,
                "url": r.url,
                "title": r.title,
                "navigation_path": r.breadcrumb,
                "relevance_score": r.score,
                "content": r.content,
            }))
            .collect::<Vec<_>>(),
    }))
}
