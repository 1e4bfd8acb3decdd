use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error taxonomy of the engine family.
///
/// `Configuration` marks engine misuse (a bad field name supplied by a
/// domain service) and is fatal; `NotFound` and `Conflict` are the two
/// classes domain services translate for their transport layer. Nothing
/// is retried or swallowed here.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{entity} '{id}' is {state}, requested transition rejected")]
    Conflict {
        entity: &'static str,
        id: String,
        state: &'static str,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString, state: &'static str) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
            state,
        }
    }

    /// True for the NotFound class, regardless of which entity was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
