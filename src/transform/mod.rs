//! Transformation engine
//!
//! Pure operations over a [`SchemaTree`](crate::models::SchemaTree):
//! substitute-options, remove, add and move, each addressed by schema id and
//! each returning a new validated tree with a changelog.

pub mod error;
pub mod ops;
pub mod options;
pub mod pipeline;

pub use error::{TransformError, TransformResult};
pub use ops::{
    Change, ROOT, TransformOutcome, Transformation, add, move_node, remove, substitute_options,
};
pub use options::{options_from_csv, options_from_json, read_options_file};
pub use pipeline::Pipeline;
