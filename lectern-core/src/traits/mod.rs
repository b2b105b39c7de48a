//! Collaborator traits.
//!
//! Every external dependency of the answering engine sits behind one of these
//! traits and is handed to the engine explicitly, so any of them can be
//! replaced with a test double.

pub mod audit;
pub mod catalog;
pub mod embedder;
pub mod generator;
pub mod search;
pub mod tokens;

// Re-export all traits for convenience
pub use audit::*;
pub use catalog::*;
pub use embedder::*;
pub use generator::*;
pub use search::*;
pub use tokens::*;
