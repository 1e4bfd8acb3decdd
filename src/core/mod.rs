pub mod error;
pub mod types;

pub use error::{EngineError, Result};
pub use types::{ActorId, Document, DocumentId};
