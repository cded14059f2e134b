//! Position, type, and schema primitives shared by the scaf toolchain.
//!
//! This crate is the analysis-agnostic base layer: a compiler frontend for
//! the scaf DSL (in the `scaf` crate) builds its symbol table, diagnostics,
//! and expression environments out of the `Type`, `Span`, `Schema`, and
//! `AnalysisOptions` types defined here.

pub mod error;
pub mod options;
pub mod position;
pub mod schema;
pub mod types;

pub use error::Error;
pub use options::AnalysisOptions;
pub use position::{Position, Span};
pub use schema::{load_schema, Direction, Field, Model, Relationship, Schema, SchemaError};
pub use types::{parse_type, Primitive, Type};
