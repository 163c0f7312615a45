//! Schema-directed extraction and typed binding of bodies
//!
//! [`content`] and [`partial_content`] project a parsed body onto a
//! [`BodySchema`], recursively. [`decode_body`] then binds the resulting
//! [`BodyContent`] into a Rust type described with [`impl_decode!`](crate::impl_decode).

mod content;
pub mod decode;
mod extract;
mod schema;

pub use content::{Attribute, Block, BodyContent};
pub use decode::{decode_body, implied_body_schema, BlockField, Cardinality, Decode};
pub use extract::{content, partial_content};
pub use schema::{AttributeSchema, BlockSchema, BodySchema, SchemaMode};
