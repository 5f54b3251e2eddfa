//! Schema model
//!
//! In-memory representation of an extraction schema: an ordered forest of
//! typed nodes (sections, multivalues, tuples, datapoints).

pub mod error;
pub mod node;
pub mod tree;

pub use error::{SchemaResult, SchemaValidationError};
pub use node::{
    Category, DataType, DatapointAttributes, MultivalueAttributes, NodeKind, SchemaNode,
    SchemaOption, SectionAttributes, TupleAttributes,
};
pub use tree::{DEFAULT_FORMAT_VERSION, PreOrder, SchemaTree};
