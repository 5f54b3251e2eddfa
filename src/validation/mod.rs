//! Validation functionality
//!
//! Structural checks applied whenever a schema tree is assembled.

pub mod tree;

pub use tree::{NodePath, check_unique_options, index_roots};
