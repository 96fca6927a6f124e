//! Concurrent documentation crawler.
//!
//! This crate provides:
//! - [`html`] — HTML normalization: title, breadcrumb, body text, and
//!   intra-domain link extraction from a fetched page
//! - [`sitemap`] — sitemap 0.9 parsing for crawl seeding
//! - [`engine`] — the batched BFS [`Crawler`] over a single domain

pub mod engine;
pub mod html;
pub mod sitemap;

pub use engine::{CrawlLimits, Crawler};
pub use html::NormalizedPage;
