//! Payment Error Types

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Method outside the five supported gateways
    #[error("Unsupported payment method")]
    UnsupportedMethod,

    /// Gateway credentials missing
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// Request failed local validation
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Submitted total does not match the plan price
    #[error("Amount mismatch for {months} month(s): expected {expected}, got {submitted}")]
    AmountMismatch {
        months: u32,
        expected: Decimal,
        submitted: Decimal,
    },

    /// No plan sells this duration
    #[error("No plan for {0} month(s)")]
    UnknownPlan(u32),

    /// Provider rejected the call or answered with something unusable
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// Outbound HTTP call failed before a response arrived
    #[error("Transport error: {0}")]
    Transport(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Order not present in the store
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// Build a provider error
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Storage(_))
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::UnsupportedMethod => "Método de pago no soportado".into(),
            Self::NotConfigured(provider) => format!("{provider} no está configurado"),
            Self::InvalidRequest(msg) => format!("Solicitud inválida: {msg}"),
            Self::AmountMismatch { .. } => "El monto no coincide con el plan seleccionado".into(),
            Self::UnknownPlan(_) => "La duración seleccionada no está disponible".into(),
            Self::Provider { provider, .. } => {
                format!("Error al procesar el pago con {provider}. Intenta de nuevo.")
            }
            Self::Transport(_) => "No se pudo contactar a la pasarela de pago".into(),
            _ => "Error al procesar el pago".into(),
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
