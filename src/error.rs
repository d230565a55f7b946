use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Failed to read {object} property {property}: {reason}")]
    ReadFailed {
        object: String,
        property: u32,
        reason: String,
    },

    #[error("Failed to write {object} property {property}: {reason}")]
    WriteFailed {
        object: String,
        property: u32,
        reason: String,
    },

    #[error("Malformed read response: {0}")]
    MalformedResponse(String),

    #[error("Object not configured for {0}")]
    NotConfigured(&'static str),

    #[error("No remote value configured for mode {0}")]
    MappingGap(String),

    #[error("Cannot encode value of kind {0}")]
    UnsupportedValueKind(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
