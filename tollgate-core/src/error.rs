//! Error types for Tollgate operations

use crate::enums::UsageResponseStatus;
use crate::EntityId;
use thiserror::Error;

/// Entity type discriminator used in storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    User,
    Tool,
    Subscription,
    UsageLog,
    ApiKey,
    RefreshToken,
}

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound {
        entity_type: EntityType,
        id: EntityId,
    },

    #[error("{entity_type:?} already exists: {reason}")]
    AlreadyExists {
        entity_type: EntityType,
        reason: String,
    },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Failures produced by the tool-invocation pipeline.
///
/// The display strings double as the `error` field of the uniform invocation
/// outcome, so they are caller-facing and stable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    #[error("User does not have an active subscription")]
    NoActiveSubscription,

    #[error("User has exceeded their token limit")]
    QuotaExceeded,

    #[error("Tool not found or inactive")]
    ToolUnavailable,

    #[error("Circuit breaker is open for tool {tool_id}")]
    CircuitOpen { tool_id: EntityId },

    #[error("Tool invocation timed out")]
    Timeout,

    #[error("Tool returned status code: {status}")]
    UpstreamStatus { status: u16 },

    #[error("Tool invocation failed: {reason}")]
    Transport { reason: String },

    #[error("Invalid response from tool: {reason}")]
    InvalidResponse { reason: String },

    #[error("Usage persistence failed: {reason}")]
    Persistence { reason: String },
}

impl InvokeError {
    /// Whether this failure happened before the external-call stage.
    ///
    /// Cheap rejections are not metered: no usage row is written for them.
    pub fn is_cheap_rejection(&self) -> bool {
        matches!(
            self,
            Self::NoActiveSubscription | Self::QuotaExceeded | Self::ToolUnavailable
        )
    }

    /// Status recorded on the usage row for this failure.
    pub fn response_status(&self) -> UsageResponseStatus {
        match self {
            Self::Timeout => UsageResponseStatus::Timeout,
            _ => UsageResponseStatus::Error,
        }
    }
}

impl From<StorageError> for InvokeError {
    fn from(err: StorageError) -> Self {
        Self::Persistence {
            reason: err.to_string(),
        }
    }
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level error for Tollgate operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TollgateError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for Tollgate operations.
pub type TollgateResult<T> = Result<T, TollgateError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_cheap_rejections_are_unmetered() {
        assert!(InvokeError::NoActiveSubscription.is_cheap_rejection());
        assert!(InvokeError::QuotaExceeded.is_cheap_rejection());
        assert!(InvokeError::ToolUnavailable.is_cheap_rejection());
        assert!(!InvokeError::Timeout.is_cheap_rejection());
        assert!(!InvokeError::CircuitOpen {
            tool_id: Uuid::nil()
        }
        .is_cheap_rejection());
    }

    #[test]
    fn test_response_status_mapping() {
        assert_eq!(
            InvokeError::Timeout.response_status(),
            UsageResponseStatus::Timeout
        );
        assert_eq!(
            InvokeError::UpstreamStatus { status: 503 }.response_status(),
            UsageResponseStatus::Error
        );
        assert_eq!(
            InvokeError::CircuitOpen {
                tool_id: Uuid::nil()
            }
            .response_status(),
            UsageResponseStatus::Error
        );
    }

    #[test]
    fn test_caller_facing_messages() {
        assert_eq!(
            InvokeError::ToolUnavailable.to_string(),
            "Tool not found or inactive"
        );
        assert_eq!(
            InvokeError::NoActiveSubscription.to_string(),
            "User does not have an active subscription"
        );
        assert_eq!(
            InvokeError::QuotaExceeded.to_string(),
            "User has exceeded their token limit"
        );
    }
}
