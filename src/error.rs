//! Error taxonomy for the task execution substrate — JSON-RPC error codes +
//! the wire-level kinds the request handler and cache/topic adapter raise.

use crate::types::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// Substrate-specific error codes
// ---------------------------------------------------------------------------

/// The requested task was not found.
pub const TASK_NOT_FOUND: i64 = -32001;

/// The task cannot be canceled in its current state.
pub const TASK_NOT_CANCELABLE: i64 = -32002;

/// Push notifications are not supported by this agent.
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;

/// Streaming was requested but the agent card declares `capabilities.streaming = false`.
pub const STREAMING_NOT_SUPPORTED: i64 = -32004;

// ---------------------------------------------------------------------------
// A2AError enum
// ---------------------------------------------------------------------------

/// Unified error type for the task execution substrate.
///
/// The protocol variants map 1:1 to the JSON-RPC error codes above. The
/// remaining variants (`Transport`, `Timeout`, `Other`) never surface as
/// those codes directly — they are wrapped into `InternalError` at the
/// request handler boundary, since they describe failures of the
/// cache/topic adapter rather than the A2A wire protocol.
#[derive(Debug, Clone, thiserror::Error)]
pub enum A2AError {
    /// Request payload validation error (code -32600).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Method not found (code -32601).
    #[error("Method not found: {message}")]
    MethodNotFound {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Invalid parameters (code -32602).
    #[error("Invalid params: {message}")]
    InvalidParams {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Internal error (code -32603).
    #[error("Internal error: {message}")]
    InternalError {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Task not found (code -32001).
    #[error("Task not found: {message}")]
    TaskNotFound {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Task cannot be canceled (code -32002).
    #[error("Task not cancelable: {message}")]
    TaskNotCancelable {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Push notifications not supported (code -32003).
    #[error("Push notification not supported: {message}")]
    PushNotificationNotSupported {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Streaming not supported (code -32004).
    #[error("Streaming not supported: {message}")]
    StreamingNotSupported {
        /// Human-readable error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    // -- Adapter/transport-side errors (not wire codes; collapse to InternalError) --
    /// Transport-level error talking to the cache/topic service (connection
    /// refused, DNS failure, and similar non-HTTP-status failures).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A cache/topic request or an awaited event stream timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Non-2xx, non-404 HTTP response from the cache/topic service.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Invalid JSON received from the cache/topic service.
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Catch-all for errors that don't fit another category.
    #[error("{0}")]
    Other(String),
}

/// Convenience result type for operations in this crate.
pub type A2AResult<T> = Result<T, A2AError>;

impl A2AError {
    /// Create an `InvalidRequest` with a message and no data.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `MethodNotFound` with a message and no data.
    pub fn method_not_found(message: impl Into<String>) -> Self {
        Self::MethodNotFound {
            message: message.into(),
            data: None,
        }
    }

    /// Create an `InvalidParams` with a message and no data.
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParams {
            message: message.into(),
            data: None,
        }
    }

    /// Create an `InternalError` with a message and no data.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `TaskNotFound` with a message and no data.
    pub fn task_not_found(message: impl Into<String>) -> Self {
        Self::TaskNotFound {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `TaskNotCancelable` with a message and no data.
    pub fn task_not_cancelable(message: impl Into<String>) -> Self {
        Self::TaskNotCancelable {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `PushNotificationNotSupported` with a message and no data.
    pub fn push_notification_not_supported(message: impl Into<String>) -> Self {
        Self::PushNotificationNotSupported {
            message: message.into(),
            data: None,
        }
    }

    /// Create a `StreamingNotSupported` with a message and no data.
    pub fn streaming_not_supported(message: impl Into<String>) -> Self {
        Self::StreamingNotSupported {
            message: message.into(),
            data: None,
        }
    }

    /// Returns the JSON-RPC error code for this error variant.
    ///
    /// Adapter/transport-side variants don't carry a wire code of their own;
    /// they collapse to -32603 (internal error).
    pub fn code(&self) -> i64 {
        match self {
            A2AError::InvalidRequest { .. } => INVALID_REQUEST,
            A2AError::MethodNotFound { .. } => METHOD_NOT_FOUND,
            A2AError::InvalidParams { .. } => INVALID_PARAMS,
            A2AError::InternalError { .. } => INTERNAL_ERROR,
            A2AError::TaskNotFound { .. } => TASK_NOT_FOUND,
            A2AError::TaskNotCancelable { .. } => TASK_NOT_CANCELABLE,
            A2AError::PushNotificationNotSupported { .. } => PUSH_NOTIFICATION_NOT_SUPPORTED,
            A2AError::StreamingNotSupported { .. } => STREAMING_NOT_SUPPORTED,
            A2AError::Transport(_)
            | A2AError::Timeout(_)
            | A2AError::Http { .. }
            | A2AError::InvalidJson(_)
            | A2AError::Other(_) => INTERNAL_ERROR,
        }
    }

    /// Returns the default human-readable message for this error variant.
    pub fn default_message(&self) -> &str {
        match self {
            A2AError::InvalidRequest { .. } => "Request payload validation error",
            A2AError::MethodNotFound { .. } => "Method not found",
            A2AError::InvalidParams { .. } => "Invalid parameters",
            A2AError::InternalError { .. } => "Internal error",
            A2AError::TaskNotFound { .. } => "Task not found",
            A2AError::TaskNotCancelable { .. } => "Task cannot be canceled",
            A2AError::PushNotificationNotSupported { .. } => "Push Notification is not supported",
            A2AError::StreamingNotSupported { .. } => "Streaming is not supported",
            A2AError::Transport(_) => "Transport error",
            A2AError::Timeout(_) => "Request timed out",
            A2AError::Http { .. } => "HTTP error",
            A2AError::InvalidJson(_) => "Invalid JSON",
            A2AError::Other(_) => "Error",
        }
    }

    /// `true` for adapter/transport failures worth retrying (network error
    /// or 5xx); `false` for 4xx and protocol-level errors.
    pub fn is_transient(&self) -> bool {
        match self {
            A2AError::Transport(_) | A2AError::Timeout(_) => true,
            A2AError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<A2AError> for JsonRpcError {
    fn from(err: A2AError) -> Self {
        let code = err.code();
        let message = err.to_string();
        let data = match &err {
            A2AError::InvalidRequest { data, .. }
            | A2AError::MethodNotFound { data, .. }
            | A2AError::InvalidParams { data, .. }
            | A2AError::InternalError { data, .. }
            | A2AError::TaskNotFound { data, .. }
            | A2AError::TaskNotCancelable { data, .. }
            | A2AError::PushNotificationNotSupported { data, .. }
            | A2AError::StreamingNotSupported { data, .. } => data.clone(),
            _ => None,
        };
        JsonRpcError {
            code,
            message,
            data,
        }
    }
}

impl From<serde_json::Error> for A2AError {
    fn from(err: serde_json::Error) -> Self {
        A2AError::InvalidJson(err.to_string())
    }
}

impl From<reqwest::Error> for A2AError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            A2AError::Timeout(err.to_string())
        } else if err.is_connect() {
            A2AError::Transport(err.to_string())
        } else {
            A2AError::Other(err.to_string())
        }
    }
}
