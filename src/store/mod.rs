//! The document-store boundary.
//!
//! `DocumentStore` is the narrow driver contract the engines consume:
//! schema introspection, find-by-id, a MongoDB-style
//! `find_one_and_update` with positional array filters, a small
//! aggregation pass, and physical delete. `MemoryStore` is the in-memory
//! implementation shipped with the crate; anything that can satisfy the
//! trait (a real MongoDB driver, a fake for tests) slots in the same way.

mod driver;
mod filter;
mod memory;
mod path;
mod pipeline;
mod update;

pub use driver::DocumentStore;
pub use filter::{Clause, Filter};
pub use memory::MemoryStore;
pub use path::{ArrayField, FieldPath, Segment};
pub use pipeline::{Pipeline, Stage};
pub use update::{ArrayFilter, PullMatch, Update, UpdateOp, UpdateOptions};
