//! Sitemap 0.9 parsing for crawl seeding.
//!
//! Only `<url><loc>` entries under the sitemaps.org 0.9 namespace are
//! consumed; nested sitemap indexes are not followed. Parse failures yield
//! an empty list so the caller can fall back to its base URL.

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;
use url::Url;

use mwkb_shared::url as urls;

/// The sitemaps.org 0.9 namespace a well-formed sitemap declares.
const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Extract canonical page URLs from sitemap XML, keeping only entries whose
/// host matches `base_domain`.
pub fn parse_sitemap(xml: &str, base_domain: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);

    let mut urls: Vec<String> = Vec::new();
    let mut ns_ok = false;
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"urlset" => {
                    ns_ok = e.attributes().flatten().any(|attr| {
                        attr.key.as_ref().starts_with(b"xmlns")
                            && attr.value.as_ref() == SITEMAP_NS.as_bytes()
                    });
                }
                b"url" => in_url = true,
                b"loc" => in_loc = in_url,
                _ => {}
            },
            Ok(Event::Text(ref t)) if ns_ok && in_loc => {
                if let Ok(text) = t.unescape() {
                    if let Ok(parsed) = Url::parse(text.trim()) {
                        if urls::host_of(&parsed) == base_domain {
                            urls.push(urls::canonicalize(&parsed));
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"url" => in_url = false,
                b"loc" => in_loc = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(error = %e, "sitemap XML malformed, returning partial result");
                break;
            }
            _ => {}
        }
    }

    urls
}
