//! Shared types, error model, and configuration for the mwkb knowledge base.
//!
//! This crate is the foundation depended on by all other mwkb crates.
//! It provides:
//! - [`KbError`] — the unified error type
//! - Domain types ([`Page`], [`DocumentMeta`], [`SearchResult`], [`IndexOutcome`])
//! - URL canonicalization ([`url::canonicalize`], [`url::resolve`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;
pub mod url;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlSection, SearchSection, StorageSection, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{KbError, Result};
pub use types::{DocumentMeta, IndexOutcome, Page, SearchResult, VIEW_LABELS};
