//! Library backends and embedders for Lectern.
//!
//! - [`InMemoryLibrary`]: BM25 keyword search, cosine vector search and the
//!   metadata catalog over an in-process article set, loadable from JSON.
//! - [`HashingEmbedder`]: deterministic offline embeddings.
//! - `ApiEmbedder` (feature `api`): hosted embeddings through siumai.
//! - `PgLibrary` (feature `postgres`): PostgreSQL full-text search, pgvector
//!   and catalog queries over the ingestion tables.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod embedders;
pub mod memory;
mod taxonomy;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use embedders::HashingEmbedder;
pub use memory::{InMemoryLibrary, LibrarySnapshot, OwnedCategory};

#[cfg(feature = "api")]
pub use embedders::ApiEmbedder;

#[cfg(feature = "postgres")]
pub use postgres::PgLibrary;
