//! The nesting-depth engine family.
//!
//! One engine per nesting depth, all sharing the element envelope and
//! state machine in [`lifecycle`]:
//!
//! - [`DocumentService`]: depth 0, top-level document CRUD
//! - [`FlatArrayEngine`]: depth 1, `parent -> items[]`
//! - [`NestedArrayEngine`]: depth 2, `parent -> items[] -> subs[]`
//! - [`DoubleNestedArrayEngine`]: depth 3, one level deeper
//!
//! Domain services instantiate an engine with a store handle and a
//! collection name, then expose narrower named methods that forward to
//! it with fixed [`ArrayField`](crate::store::ArrayField) selectors.

pub mod lifecycle;

mod document;
mod double;
mod flat;
mod nested;

pub use document::DocumentService;
pub use double::DoubleNestedArrayEngine;
pub use flat::FlatArrayEngine;
pub use lifecycle::ElementState;
pub use nested::NestedArrayEngine;
