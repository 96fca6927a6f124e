//! Batched BFS crawler over a single documentation domain.
//!
//! The crawler fetches pages with a browser-like HTTP client, normalizes
//! them via [`crate::html`], and walks intra-domain links breadth-first in
//! concurrent batches. Per-URL failures are logged and dropped; they never
//! abort a crawl.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info, instrument, warn};
use url::Url;

use mwkb_shared::{KbError, Page, Result, url as urls};

use crate::html;
use crate::sitemap;

/// Desktop Chrome User-Agent so documentation sites don't block the crawler.
const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

const ACCEPT_LANG: &str = "en-US,en;q=0.5";

// ---------------------------------------------------------------------------
// CrawlLimits
// ---------------------------------------------------------------------------

/// Bounds applied to a domain crawl.
#[derive(Debug, Clone)]
pub struct CrawlLimits {
    /// Maximum pages collected by [`Crawler::crawl_domain`].
    pub max_pages: usize,
    /// Concurrent fetches per BFS batch.
    pub batch_size: usize,
    /// Total per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_pages: 300,
            batch_size: 10,
            timeout_secs: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Concurrent documentation crawler scoped to one domain.
pub struct Crawler {
    client: Client,
    base_url: Url,
    domain: String,
    limits: CrawlLimits,
}

impl Crawler {
    /// Create a crawler rooted at `base_url`.
    pub fn new(base_url: Url, limits: CrawlLimits) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANG));

        let client = Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(limits.timeout_secs))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| KbError::Network(format!("failed to build HTTP client: {e}")))?;

        let domain = urls::host_of(&base_url);

        Ok(Self {
            client,
            base_url,
            domain,
            limits,
        })
    }

    /// The domain this crawler is scoped to.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Fetch and normalize a single page.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch_one(&self, url: &str) -> Result<Page> {
        let parsed = urls::parse(url)?;
        fetch_page(&self.client, &parsed).await
    }

    /// Fetch many pages concurrently. Per-URL failures are logged at warning
    /// level and dropped from the result.
    #[instrument(skip_all, fields(url_count = urls.len()))]
    pub async fn fetch_many(&self, urls: &[String]) -> BTreeMap<String, Page> {
        let mut handles = Vec::with_capacity(urls.len());

        for raw in urls {
            let parsed = match urls::parse(raw) {
                Ok(u) => u,
                Err(e) => {
                    warn!(url = %raw, error = %e, "skipping unparseable URL");
                    continue;
                }
            };
            let client = self.client.clone();
            handles.push(tokio::spawn(async move {
                let canonical = urls::canonicalize(&parsed);
                (canonical, fetch_page(&client, &parsed).await)
            }));
        }

        let mut pages = BTreeMap::new();
        for handle in handles {
            match handle.await {
                Ok((url, Ok(page))) => {
                    pages.insert(url, page);
                }
                Ok((url, Err(e))) => {
                    warn!(url = %url, error = %e, "skipped page");
                }
                Err(e) => {
                    warn!(error = %e, "fetch task panicked");
                }
            }
        }
        pages
    }

    /// Seeded BFS within the crawler's domain, bounded by `max_pages`.
    ///
    /// When `sitemap_url` is given its `<loc>` entries seed the queue; on
    /// parse failure or an empty sitemap the crawl falls back to the base
    /// URL alone.
    #[instrument(skip_all, fields(base = %self.base_url, sitemap = sitemap_url.unwrap_or("-")))]
    pub async fn crawl_domain(&self, sitemap_url: Option<&str>) -> BTreeMap<String, Page> {
        let mut seeds: Vec<String> = Vec::new();
        if let Some(sitemap_url) = sitemap_url {
            seeds = self.fetch_sitemap(sitemap_url).await;
        }
        if seeds.is_empty() {
            seeds = vec![urls::canonicalize(&self.base_url)];
        }

        info!(
            seeds = seeds.len(),
            max_pages = self.limits.max_pages,
            "starting domain crawl"
        );

        let mut queue: VecDeque<String> = seeds.iter().cloned().collect();
        let mut seen: HashSet<String> = seeds.into_iter().collect();
        let mut pages: BTreeMap<String, Page> = BTreeMap::new();

        while !queue.is_empty() && pages.len() < self.limits.max_pages {
            let batch_len = self.limits.batch_size.min(queue.len());
            let batch: Vec<String> = queue.drain(..batch_len).collect();

            let mut handles = Vec::with_capacity(batch.len());
            for url in batch {
                let client = self.client.clone();
                handles.push(tokio::spawn(async move {
                    let result = match urls::parse(&url) {
                        Ok(parsed) => fetch_page(&client, &parsed).await,
                        Err(e) => Err(e),
                    };
                    (url, result)
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok((url, Ok(page))) => {
                        if pages.len() >= self.limits.max_pages {
                            continue;
                        }
                        for link in &page.links {
                            if seen.insert(link.clone()) {
                                queue.push_back(link.clone());
                            }
                        }
                        pages.insert(url, page);
                    }
                    Ok((url, Err(e))) => {
                        warn!(url = %url, error = %e, "skipped page");
                    }
                    Err(e) => {
                        warn!(error = %e, "fetch task panicked");
                    }
                }
            }
        }

        info!(pages = pages.len(), "domain crawl complete");
        pages
    }

    /// Fetch and parse the sitemap, returning domain-scoped seed URLs.
    /// Any failure demotes to an empty list.
    async fn fetch_sitemap(&self, sitemap_url: &str) -> Vec<String> {
        let response = match self.client.get(sitemap_url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %sitemap_url, error = %e, "sitemap fetch failed");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(url = %sitemap_url, %status, "sitemap returned non-success status");
            return Vec::new();
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url = %sitemap_url, error = %e, "sitemap body read failed");
                return Vec::new();
            }
        };

        let seeds = sitemap::parse_sitemap(&body, &self.domain);
        debug!(url = %sitemap_url, seeds = seeds.len(), "sitemap parsed");
        seeds
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch a single URL and normalize the response into a [`Page`].
async fn fetch_page(client: &Client, url: &Url) -> Result<Page> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| KbError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(KbError::Network(format!("{url}: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| KbError::Network(format!("{url}: body read failed: {e}")))?;

    debug!(url = %url, bytes = body.len(), "fetched page");

    let normalized = html::normalize(url, &body);

    Ok(Page {
        url: urls::canonicalize(url),
        domain: urls::host_of(url),
        title: normalized.title,
        breadcrumb: normalized.breadcrumb,
        content: normalized.content,
        links: normalized.links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn limits(max_pages: usize) -> CrawlLimits {
        CrawlLimits {
            max_pages,
            batch_size: 10,
            timeout_secs: 15,
        }
    }

    async fn mount_page(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_one_normalizes_page() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/docs/switch",
            r#"<html><head><title>Switch</title></head>
               <body><main><p>Switch docs.</p><a href="/docs/action">Action</a></main></body></html>"#,
        )
        .await;

        let base = Url::parse(&server.uri()).unwrap();
        let crawler = Crawler::new(base, limits(10)).unwrap();
        let page = crawler
            .fetch_one(&format!("{}/docs/switch", server.uri()))
            .await
            .unwrap();

        assert_eq!(page.title, "Switch");
        assert_eq!(page.domain, crawler.domain());
        assert!(page.content.contains("Switch docs."));
        assert_eq!(page.links.len(), 1);
        assert!(page.links[0].ends_with("/docs/action"));
    }

    #[tokio::test]
    async fn fetch_one_rejects_non_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let crawler = Crawler::new(base, limits(10)).unwrap();
        let result = crawler
            .fetch_one(&format!("{}/missing", server.uri()))
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("404"));
    }

    #[tokio::test]
    async fn fetch_many_drops_failures() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/ok",
            "<html><body><main><h1>OK</h1></main></body></html>",
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let base = Url::parse(&server.uri()).unwrap();
        let crawler = Crawler::new(base, limits(10)).unwrap();
        let pages = crawler
            .fetch_many(&[
                format!("{}/ok", server.uri()),
                format!("{}/broken", server.uri()),
            ])
            .await;

        assert_eq!(pages.len(), 1);
        assert!(pages.keys().next().unwrap().ends_with("/ok"));
    }

    #[tokio::test]
    async fn crawl_domain_follows_links_from_base() {
        let server = MockServer::start().await;
        mount_page(
            &server,
            "/",
            r#"<html><body><main><h1>Root</h1><a href="/a">A</a><a href="/b">B</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/a",
            r#"<html><body><main><h1>A</h1><a href="/b">B</a></main></body></html>"#,
        )
        .await;
        mount_page(
            &server,
            "/b",
            "<html><body><main><h1>B</h1></main></body></html>",
        )
        .await;

        let base = Url::parse(&server.uri()).unwrap();
        let crawler = Crawler::new(base, limits(10)).unwrap();
        let pages = crawler.crawl_domain(None).await;

        assert_eq!(pages.len(), 3);
        for page in pages.values() {
            assert_eq!(page.domain, crawler.domain());
        }
    }

    #[tokio::test]
    async fn crawl_domain_seeds_from_sitemap() {
        let server = MockServer::start().await;
        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
    <url><loc>{0}/docs/switch</loc></url>
    <url><loc>{0}/docs/action</loc></url>
    <url><loc>https://elsewhere.example.org/docs/foreign</loc></url>
</urlset>"#,
            server.uri()
        );

        mount_page(&server, "/sitemap.xml", &sitemap).await;
        mount_page(
            &server,
            "/docs/switch",
            "<html><head><title>Switch</title></head><body><main><p>s</p></main></body></html>",
        )
        .await;
        mount_page(
            &server,
            "/docs/action",
            "<html><head><title>Action</title></head><body><main><p>a</p></main></body></html>",
        )
        .await;

        let base = Url::parse(&server.uri()).unwrap();
        let crawler = Crawler::new(base, limits(10)).unwrap();
        let pages = crawler
            .crawl_domain(Some(&format!("{}/sitemap.xml", server.uri())))
            .await;

        assert_eq!(pages.len(), 2);
        assert!(pages.keys().all(|u| u.contains("/docs/")));
    }

    #[tokio::test]
    async fn crawl_domain_falls_back_when_sitemap_is_broken() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("this is not xml"))
            .mount(&server)
            .await;
        mount_page(
            &server,
            "/",
            "<html><body><main><h1>Base</h1></main></body></html>",
        )
        .await;

        let base = Url::parse(&server.uri()).unwrap();
        let crawler = Crawler::new(base, limits(10)).unwrap();
        let pages = crawler
            .crawl_domain(Some(&format!("{}/sitemap.xml", server.uri())))
            .await;

        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn crawl_domain_respects_max_pages() {
        let server = MockServer::start().await;

        // A chain of pages each linking to the next, longer than the cap.
        for i in 0..6 {
            let route = if i == 0 {
                "/".to_string()
            } else {
                format!("/p{i}")
            };
            let body = format!(
                r#"<html><body><main><h1>Page {i}</h1><a href="/p{}">next</a></main></body></html>"#,
                i + 1
            );
            mount_page(&server, &route, &body).await;
        }

        let base = Url::parse(&server.uri()).unwrap();
        let crawler = Crawler::new(
            base,
            CrawlLimits {
                max_pages: 3,
                batch_size: 2,
                timeout_secs: 15,
            },
        )
        .unwrap();
        let pages = crawler.crawl_domain(None).await;

        assert!(pages.len() <= 3);
    }
}
