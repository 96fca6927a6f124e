//! HTML normalization: title, breadcrumb, body text, and link extraction.
//!
//! Turns a fetched `(url, html)` pair into a [`NormalizedPage`]. Script,
//! style, and iframe subtrees never contribute text; navigation chrome is
//! stripped from the selected main region before rendering.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use mwkb_shared::url as urls;

/// Collapses runs of whitespace inside a text fragment.
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Normalized content extracted from one HTML page.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    /// Extracted title.
    pub title: String,
    /// Navigation path with ` > ` separators.
    pub breadcrumb: String,
    /// Plain-text body of the main region.
    pub content: String,
    /// Same-domain links, canonical, insertion-ordered, deduplicated.
    pub links: Vec<String>,
}

/// Normalize a fetched page.
pub fn normalize(url: &Url, html: &str) -> NormalizedPage {
    let doc = Html::parse_document(html);
    let domain = urls::host_of(url);

    let title = extract_title(&doc, url);
    let breadcrumb = extract_breadcrumb(&doc, url);
    let content = extract_content(&doc);
    let links = extract_links(&doc, url, &domain);

    debug!(
        url = %url,
        title = %title,
        content_len = content.len(),
        links = links.len(),
        "normalized page"
    );

    NormalizedPage {
        title,
        breadcrumb,
        content,
        links,
    }
}

// ---------------------------------------------------------------------------
// Title
// ---------------------------------------------------------------------------

/// Title from `<title>`, falling back to the first `h1`, then the last URL
/// path segment.
fn extract_title(doc: &Html, url: &Url) -> String {
    let title_sel = Selector::parse("title").unwrap();
    if let Some(el) = doc.select(&title_sel).next() {
        let text = element_text(&el);
        if !text.is_empty() {
            return text;
        }
    }

    let h1_sel = Selector::parse("h1").unwrap();
    if let Some(el) = doc.select(&h1_sel).next() {
        let text = element_text(&el);
        if !text.is_empty() {
            return text;
        }
    }

    url.path()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| url.as_str())
        .to_string()
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Main-region selectors in priority order; the body is the fallback.
const MAIN_SELECTORS: [&str; 5] = ["main", "article", ".content", ".docs-content", r#"[role="main"]"#];

/// Render the main region as plain text, one line per text fragment.
fn extract_content(doc: &Html) -> String {
    let region = select_main_region(doc);

    let Some(region) = region else {
        return String::new();
    };

    let mut fragments: Vec<String> = Vec::new();
    collect_text(&region, &mut fragments);
    fragments.join("\n")
}

/// First matching main-region element, or the document body.
fn select_main_region(doc: &Html) -> Option<ElementRef<'_>> {
    for raw in MAIN_SELECTORS {
        let sel = Selector::parse(raw).unwrap();
        if let Some(el) = doc.select(&sel).next() {
            return Some(el);
        }
    }

    let body_sel = Selector::parse("body").unwrap();
    doc.select(&body_sel).next()
}

/// Subtrees that never contribute text.
fn is_noise_tag(name: &str) -> bool {
    matches!(name, "script" | "style" | "iframe")
}

/// Navigation chrome stripped from the main region.
fn is_chrome(element: &scraper::node::Element) -> bool {
    match element.name() {
        "nav" | "footer" | "aside" => true,
        _ => element
            .classes()
            .any(|c| c == "sidebar" || c == "nav" || c == "toc"),
    }
}

/// Depth-first text collection, skipping noise and chrome subtrees.
fn collect_text(el: &ElementRef<'_>, out: &mut Vec<String>) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => {
                let trimmed = text.text.trim();
                if !trimmed.is_empty() {
                    out.push(WS_RE.replace_all(trimmed, " ").into_owned());
                }
            }
            Node::Element(element) => {
                if is_noise_tag(element.name()) || is_chrome(element) {
                    continue;
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(&child_el, out);
                }
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// Every `<a href>` in the document, resolved and canonicalized, filtered to
/// the page's own domain, deduplicated preserving insertion order.
fn extract_links(doc: &Html, base: &Url, domain: &str) -> Vec<String> {
    let a_sel = Selector::parse("a[href]").unwrap();
    let mut seen: HashSet<String> = HashSet::new();
    let mut links: Vec<String> = Vec::new();

    for el in doc.select(&a_sel) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        let Some(resolved) = urls::resolve(base, href) else {
            continue;
        };
        let Ok(parsed) = Url::parse(&resolved) else {
            continue;
        };
        if urls::host_of(&parsed) != domain {
            continue;
        }
        if seen.insert(resolved.clone()) {
            links.push(resolved);
        }
    }

    links
}

// ---------------------------------------------------------------------------
// Breadcrumb
// ---------------------------------------------------------------------------

/// Breadcrumb derivation, three strategies in order, first nonempty wins.
fn extract_breadcrumb(doc: &Html, url: &Url) -> String {
    if let Some(crumb) = structured_breadcrumb(doc) {
        return crumb;
    }
    if let Some(crumb) = sidebar_breadcrumb(doc) {
        return crumb;
    }
    path_breadcrumb(url)
}

/// Strategy 1: a dedicated breadcrumb element.
fn structured_breadcrumb(doc: &Html) -> Option<String> {
    let crumb_sel =
        Selector::parse(r#"nav[aria-label="breadcrumb"], [class*="breadcrumb"]"#).unwrap();
    let el = doc.select(&crumb_sel).next()?;

    let a_sel = Selector::parse("a").unwrap();
    let mut parts: Vec<String> = el
        .select(&a_sel)
        .map(|a| element_text(&a))
        .filter(|t| !t.is_empty())
        .collect();

    let current_sel = Selector::parse(r#"span[aria-current="page"]"#).unwrap();
    if let Some(current) = el.select(&current_sel).next() {
        let text = element_text(&current);
        if !text.is_empty() {
            parts.push(text);
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" > "))
    }
}

/// Strategy 2: walk up from the active sidebar item, collecting the nearest
/// preceding heading-like label at each level. Accepted only when at least
/// two segments were gathered.
fn sidebar_breadcrumb(doc: &Html) -> Option<String> {
    let sidebar_sel = Selector::parse(
        r#"nav.sidebar, .sidebar-nav, aside nav, [class*="sidebar"], [class*="nav-tree"]"#,
    )
    .unwrap();
    let sidebar = doc.select(&sidebar_sel).next()?;

    let active_sel = Selector::parse(
        r#"a.active, a[aria-current="page"], li.active a, .selected a, [class*="active"] a"#,
    )
    .unwrap();
    let active = sidebar.select(&active_sel).next()?;

    let mut parts: Vec<String> = Vec::new();
    let mut node = active.parent();

    while let Some(n) = node {
        if n.id() == sidebar.id() {
            break;
        }
        for sibling in n.prev_siblings() {
            if let Some(label) = ElementRef::wrap(sibling) {
                if matches!(
                    label.value().name(),
                    "h3" | "h4" | "h5" | "strong" | "span"
                ) {
                    let text = element_text(&label);
                    if !text.is_empty() && !parts.contains(&text) {
                        parts.insert(0, text);
                    }
                    break;
                }
            }
        }
        node = n.parent();
    }

    parts.push(element_text(&active));
    if parts.len() > 1 {
        Some(parts.join(" > "))
    } else {
        None
    }
}

/// Strategy 3: title-cased URL path segments.
fn path_breadcrumb(url: &Url) -> String {
    let parts: Vec<String> = url
        .path()
        .split('/')
        .filter(|p| !p.is_empty())
        .map(title_case_segment)
        .collect();

    if parts.is_empty() {
        url.as_str().to_string()
    } else {
        parts.join(" > ")
    }
}

/// `"compound-actions"` → `"Compound Actions"`.
fn title_case_segment(segment: &str) -> String {
    segment
        .replace(['-', '_'], " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whitespace-collapsed text of one element.
fn element_text(el: &ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    WS_RE.replace_all(raw.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://docs.example.com/docs/compound-actions").unwrap()
    }

    #[test]
    fn title_from_title_tag() {
        let html = "<html><head><title>  Compound Actions  </title></head><body></body></html>";
        let page = normalize(&page_url(), html);
        assert_eq!(page.title, "Compound Actions");
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = "<html><body><h1>From Heading</h1></body></html>";
        let page = normalize(&page_url(), html);
        assert_eq!(page.title, "From Heading");
    }

    #[test]
    fn title_falls_back_to_url_segment() {
        let html = "<html><body><p>no headings</p></body></html>";
        let page = normalize(&page_url(), html);
        assert_eq!(page.title, "compound-actions");
    }

    #[test]
    fn content_prefers_main_region() {
        let html = r#"<html><body>
            <nav>Site navigation</nav>
            <main><p>Important body text.</p></main>
            <footer>Copyright</footer>
        </body></html>"#;
        let page = normalize(&page_url(), html);
        assert!(page.content.contains("Important body text."));
        assert!(!page.content.contains("Site navigation"));
        assert!(!page.content.contains("Copyright"));
    }

    #[test]
    fn content_strips_scripts_and_chrome() {
        let html = r#"<html><body><main>
            <script>var x = 1;</script>
            <style>.a { color: red }</style>
            <iframe src="https://ads.example.com"></iframe>
            <aside>Related links</aside>
            <div class="sidebar">Sidebar text</div>
            <div class="toc">On this page</div>
            <p>Kept   text
            with   spaces.</p>
        </main></body></html>"#;
        let page = normalize(&page_url(), html);
        assert!(page.content.contains("Kept text with spaces."));
        assert!(!page.content.contains("var x"));
        assert!(!page.content.contains("color"));
        assert!(!page.content.contains("Related links"));
        assert!(!page.content.contains("Sidebar text"));
        assert!(!page.content.contains("On this page"));
    }

    #[test]
    fn content_never_contains_tags() {
        let html = r#"<html><body><main>
            <h2>Section</h2><p>Text with <strong>bold</strong> parts.</p>
        </main></body></html>"#;
        let page = normalize(&page_url(), html);
        assert!(!page.content.contains('<'));
        assert!(page.content.contains("Section"));
        assert!(page.content.contains("bold"));
    }

    #[test]
    fn links_are_same_domain_and_deduplicated() {
        let html = r##"<html><body>
            <a href="/docs/switch">Switch</a>
            <a href="/docs/switch/">Switch again</a>
            <a href="/docs/action#anchor">Action</a>
            <a href="https://other.example.org/page">External</a>
            <a href="mailto:help@example.com">Mail</a>
            <a href="#top">Top</a>
        </body></html>"##;
        let page = normalize(&page_url(), html);
        assert_eq!(
            page.links,
            vec![
                "https://docs.example.com/docs/switch".to_string(),
                "https://docs.example.com/docs/action".to_string(),
            ]
        );
    }

    #[test]
    fn breadcrumb_from_structured_element() {
        let html = r#"<html><body>
            <nav aria-label="breadcrumb">
                <a href="/">Home</a>
                <a href="/docs">Docs</a>
                <span aria-current="page">Compound Actions</span>
            </nav>
            <main><p>Body</p></main>
        </body></html>"#;
        let page = normalize(&page_url(), html);
        assert_eq!(page.breadcrumb, "Home > Docs > Compound Actions");
    }

    #[test]
    fn breadcrumb_from_breadcrumb_class() {
        let html = r#"<html><body>
            <div class="rm-breadcrumbs"><a>Guides</a><a>Actions</a></div>
            <main><p>Body</p></main>
        </body></html>"#;
        let page = normalize(&page_url(), html);
        assert_eq!(page.breadcrumb, "Guides > Actions");
    }

    #[test]
    fn breadcrumb_from_active_sidebar_item() {
        let html = r#"<html><body>
            <nav class="sidebar">
                <h3>Getting Started</h3>
                <ul>
                    <li><a href="/docs/intro">Intro</a></li>
                    <li><a class="active" href="/docs/compound-actions">Compound Actions</a></li>
                </ul>
            </nav>
            <main><p>Body</p></main>
        </body></html>"#;
        let page = normalize(&page_url(), html);
        assert_eq!(page.breadcrumb, "Getting Started > Compound Actions");
    }

    #[test]
    fn sidebar_with_single_segment_falls_through_to_path() {
        // Active item but no heading labels above it: fewer than 2 segments.
        let html = r#"<html><body>
            <nav class="sidebar"><a class="active" href="/x">Lonely</a></nav>
            <main><p>Body</p></main>
        </body></html>"#;
        let page = normalize(&page_url(), html);
        assert_eq!(page.breadcrumb, "Docs > Compound Actions");
    }

    #[test]
    fn breadcrumb_path_fallback_title_cases_segments() {
        let html = "<html><body><main><p>Body</p></main></body></html>";
        let url = Url::parse("https://docs.example.com/getting_started/api-reference").unwrap();
        let page = normalize(&url, html);
        assert_eq!(page.breadcrumb, "Getting Started > Api Reference");
    }
}
