//! Core data types for the Lectern engine.
//!
//! Everything here is request-scoped except the library records, which are
//! read from the structured store.

pub mod answer;
pub mod library;
pub mod query;
pub mod retrieval;

// Re-export all types for convenience
pub use answer::*;
pub use library::*;
pub use query::*;
pub use retrieval::*;
