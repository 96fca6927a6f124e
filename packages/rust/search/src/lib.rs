//! Hybrid retrieval over the knowledge base.
//!
//! Blends dense-vector similarity from the chunks collection with
//! BM25-Okapi lexical evidence over the dense candidates' full texts.

mod bm25;
mod hybrid;

pub use bm25::{Bm25Okapi, tokenize};
pub use hybrid::HybridSearch;
