//! Parameter tree
//!
//! Generic model of a device's addressable namespace: internal nodes with
//! named children and leaves carrying limits metadata and, once populated, a
//! current value. Built by [`SchemaWalker`], populated by [`ValueQuerier`] and
//! serialized through [`flatten`].

pub mod flatten;
pub mod node;
pub mod query;
pub mod walker;

pub use flatten::{flatten, unflatten, unflatten_with};
pub use node::{LeafNode, LimitsDescriptor, Located, ParameterNode, ParameterTree};
pub use query::ValueQuerier;
pub use walker::SchemaWalker;
