//! Core services and tool operations for the mwkb knowledge base.
//!
//! This crate ties together crawling, indexing, and hybrid search behind
//! the five `mw_kb_*` tool operations exposed by the transport layer.

pub mod indexer;
pub mod ops;
pub mod service;

pub use indexer::Indexer;
pub use service::KbService;
