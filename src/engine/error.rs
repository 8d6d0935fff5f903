use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Referenced row does not exist for this tenant. Carries the row kind.
    NotFound(&'static str, Ulid),
    /// Hold passed its `expires_at` before confirmation.
    Expired(Ulid),
    /// Slot is taken by the booking or hold with this id.
    Conflict(Ulid),
    Validation(String),
    LimitExceeded(&'static str),
    Storage(String),
}

impl EngineError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            EngineError::Expired(id) => write!(f, "hold expired: {id}"),
            EngineError::Conflict(id) => write!(f, "slot already taken by {id}"),
            EngineError::Validation(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Storage(e.to_string())
    }
}
