use thiserror::Error;

use super::loader::LoadError;
use super::stylesheet::StylesheetError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("a handler for event {0:?} is already registered")]
    DuplicateHandler(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("guest module does not export {entry_point:?}; found exports: [{}]", .exports.join(", "))]
    ContractViolation {
        entry_point: String,
        exports: Vec<String>,
    },
    #[error("guest module failed to load: {0}")]
    Load(#[from] LoadError),
    #[error("stylesheet import failed: {0}")]
    Stylesheet(#[from] StylesheetError),
    #[error("cannot resolve {reference:?}: {reason}")]
    InvalidUrl { reference: String, reason: String },
    #[error("guest entry point failed: {0}")]
    Guest(String),
}

impl BridgeError {
    /// Whether the error leaves the bridge unable to continue its session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::ContractViolation { .. } | BridgeError::Load(_) | BridgeError::Guest(_)
        )
    }
}
