// src/error.rs

use crate::types::{AlertId, AlertStatus, ResourceId, ThresholdId};

/// Result type used throughout the watchtower library
pub type WatchtowerResult<T> = Result<T, WatchtowerError>;

/// All possible errors that can occur in the watchtower library
#[derive(thiserror::Error, Debug)]
pub enum WatchtowerError {
    /// A threshold definition or update failed validation
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Threshold not registered
    #[error("Threshold '{threshold_id}' not found")]
    ThresholdNotFound { threshold_id: ThresholdId },

    /// Alert not known to the alert store
    #[error("Alert '{alert_id}' not found")]
    AlertNotFound { alert_id: AlertId },

    /// Alert lifecycle transition not allowed from the current status
    #[error("Alert '{alert_id}' cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        alert_id: AlertId,
        from: AlertStatus,
        to: AlertStatus,
    },

    /// Not enough samples to run a trend analysis
    #[error("Insufficient data: {required} data points required, {actual} available")]
    InsufficientData { required: usize, actual: usize },

    /// The actuator failed and the rollback restored the previous capacity
    #[error("Scaling of '{resource_id}' failed: {message}")]
    ScalingFailed { resource_id: ResourceId, message: String },

    /// The actuator failed and so did the rollback; needs manual intervention
    #[error("Rollback of '{resource_id}' failed after scaling error ({scaling_error}): {rollback_error}")]
    RollbackFailed {
        resource_id: ResourceId,
        scaling_error: String,
        rollback_error: String,
    },

    /// Callback execution failed
    #[error("Callback execution failed for '{operation}': {message}")]
    CallbackFailed { operation: String, message: String },

    /// Engine is not running or has stopped
    #[error("Watchtower engine is not running: {message}")]
    EngineNotRunning { message: String },

    /// Channel communication error (internal)
    #[error("Internal channel error: {message}")]
    ChannelError { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// IO-related errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Generic error for unexpected situations
    #[error("Unexpected error: {message}")]
    Unexpected { message: String },
}

/// Helper methods for creating common errors
impl WatchtowerError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn threshold_not_found<S: Into<String>>(threshold_id: S) -> Self {
        Self::ThresholdNotFound {
            threshold_id: threshold_id.into(),
        }
    }

    pub fn alert_not_found<S: Into<String>>(alert_id: S) -> Self {
        Self::AlertNotFound {
            alert_id: alert_id.into(),
        }
    }

    pub fn invalid_transition<S: Into<String>>(alert_id: S, from: AlertStatus, to: AlertStatus) -> Self {
        Self::InvalidTransition {
            alert_id: alert_id.into(),
            from,
            to,
        }
    }

    pub fn insufficient_data(required: usize, actual: usize) -> Self {
        Self::InsufficientData { required, actual }
    }

    pub fn scaling_failed<S: Into<String>>(resource_id: S, message: S) -> Self {
        Self::ScalingFailed {
            resource_id: resource_id.into(),
            message: message.into(),
        }
    }

    pub fn callback_failed<S: Into<String>>(operation: S, message: S) -> Self {
        Self::CallbackFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn engine_not_running<S: Into<String>>(message: S) -> Self {
        Self::EngineNotRunning {
            message: message.into(),
        }
    }

    pub fn unexpected<S: Into<String>>(message: S) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }
}

/// Convert from channel send errors
impl<T> From<tokio::sync::mpsc::error::SendError<T>> for WatchtowerError {
    fn from(error: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Self::ChannelError {
            message: format!("Failed to send on channel: {}", error),
        }
    }
}

/// Convert from channel receive errors
impl From<tokio::sync::oneshot::error::RecvError> for WatchtowerError {
    fn from(error: tokio::sync::oneshot::error::RecvError) -> Self {
        Self::ChannelError {
            message: format!("Failed to receive on channel: {}", error),
        }
    }
}

#[cfg(feature = "config-toml")]
impl From<toml::de::Error> for WatchtowerError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config {
            message: format!("Invalid TOML configuration: {}", error),
        }
    }
}
