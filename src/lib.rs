//! booksearch - hybrid book retrieval service
//!
//! Turns free-text book queries into structured attribute filters, retrieves
//! candidates from a dense and a sparse vector space fused with reciprocal rank
//! fusion, reranks them with a cross-encoder, and caches both the structured
//! queries and the assembled responses.

pub mod cache;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod query;
pub mod retrieval;
pub mod server;
pub mod vector_store;

pub use error::{BookSearchError, Result};
