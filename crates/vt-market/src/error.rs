//! Error Types for Market Data

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketError>;

#[derive(Error, Debug)]
pub enum MarketError {
    /// Payload matches none of the known upstream shapes
    #[error("Unrecognized market payload: {0}")]
    UnrecognizedShape(String),

    /// Upstream answered, but reported a failure
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MarketError {
    /// Stable code for API error bodies
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnrecognizedShape(_) => "UNRECOGNIZED_SHAPE",
            Self::Upstream(_) => "UPSTREAM_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Serialization(_) => "INVALID_RESPONSE",
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => "No se pudo conectar con el proveedor de datos".into(),
            _ => "No se pudieron cargar los datos del mercado".into(),
        }
    }
}
