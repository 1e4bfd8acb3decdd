//! Collection schemas and the array-field guard.
//!
//! The store is schemaless about values but every collection registers a
//! declaration of its named fields, enough for the engines to prove that
//! a field targeted by an array operation really is an array before any
//! write is attempted.

mod field;
mod guard;

pub use field::{CollectionSchema, ElementSchema, FieldDef, FieldKind};
pub use guard::FieldTypeGuard;
