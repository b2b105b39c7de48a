//! Embedding model implementations.
//!
//! [`HashingEmbedder`] is deterministic and offline; it only yields
//! meaningful vector scores when the stored article embeddings were produced
//! by the same embedder. [`ApiEmbedder`] calls a hosted embedding model.

pub mod hashing;

#[cfg(feature = "api")]
pub mod api;

pub use hashing::HashingEmbedder;

#[cfg(feature = "api")]
pub use api::ApiEmbedder;
