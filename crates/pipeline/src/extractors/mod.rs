// ABOUTME: Selector-driven extraction over streamed documents.
// ABOUTME: Includes the selector compiler/cache and the streaming Page extractor.

//! Content extraction module.
//!
//! Submodules:
//! - `selector`: caches selectors compiled for the streaming rewriter.
//! - `stream`: runs selector queries over a fetched document without building a DOM.

pub mod selector;
pub mod stream;
