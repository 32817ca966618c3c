//! The dynamic type registry and value representation.
//!
//! Replaces the teacher's compile-time `FromWireValue`/`ToWireValue` traits
//! with runtime dispatch keyed by the server's own `pg_type` catalogue, per
//! the "dynamic typing in value codecs" redesign.

pub mod codecs;
pub mod registry;
pub mod value;

pub use registry::{TypeKind, TypeRegistry, TypeRow, RELOAD_TYPES_QUERY};
pub use value::ColumnValue;
