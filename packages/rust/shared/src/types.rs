//! Core domain types for the mwkb knowledge base.

use serde::{Deserialize, Serialize};

/// View labels in projection order. A page produces at most one chunk per
/// view; the index into this table is part of each chunk's identity.
pub const VIEW_LABELS: [&str; 3] = ["breadcrumb", "title_path", "full_content"];

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A single URL's normalized content record, as produced by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Canonical absolute URL (fragment- and trailing-slash-stripped).
    pub url: String,
    /// Network-location part of the URL.
    pub domain: String,
    /// Extracted page title.
    pub title: String,
    /// Hierarchical navigation path with ` > ` separators.
    pub breadcrumb: String,
    /// Cleaned, whitespace-normalized body text.
    pub content: String,
    /// Intra-domain links discovered on the page, canonical, insertion-ordered.
    pub links: Vec<String>,
}

impl Page {
    /// Serialize the page into the enriched text blob stored as the document body.
    pub fn enriched_blob(&self) -> String {
        format!(
            "Navigation: {}\nTitle: {}\n\n{}",
            self.breadcrumb, self.title, self.content
        )
    }
}

// ---------------------------------------------------------------------------
// DocumentMeta
// ---------------------------------------------------------------------------

/// Metadata carried by a stored document, returned by list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// Canonical URL (the document key).
    pub url: String,
    /// Page title.
    pub title: String,
    /// Navigation path.
    pub breadcrumb: String,
    /// Network-location the page belongs to.
    pub domain: String,
}

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// A whole-page hit from hybrid search, ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// Canonical URL of the matching page.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Navigation path.
    pub breadcrumb: String,
    /// Blended relevance score in `[0, 1]`, rounded to 4 decimals.
    pub score: f64,
    /// The full stored document text.
    pub content: String,
}

// ---------------------------------------------------------------------------
// IndexOutcome
// ---------------------------------------------------------------------------

/// Result of a batch index operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexOutcome {
    /// URLs newly written to the store.
    pub indexed: Vec<String>,
    /// URLs skipped because they already existed and no overwrite was forced.
    pub skipped: Vec<String>,
}
