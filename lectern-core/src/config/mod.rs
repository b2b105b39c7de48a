//! Configuration structures.
//!
//! Configuration is plain serde data loaded from JSON or TOML. Every section
//! has defaults, so a file only needs the values it changes.

pub mod ask;
pub mod llm;
pub mod loader;

pub use ask::*;
pub use llm::*;
pub use loader::{ConfigFormat, substitute_env_variables};
