//! cf-core: shared job types, errors and configuration.
//!
//! This crate is the foundational dependency for the other cf-* crates,
//! providing the job descriptor and its encode parameters, the unified error
//! type, and the application configuration including the size and loop
//! limits the pipeline enforces.

pub mod config;
pub mod error;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use job::*;
