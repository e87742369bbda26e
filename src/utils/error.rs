use thiserror::Error;

/// Main error type for the SelfLayer client
#[derive(Debug, Error)]
pub enum SelflayerError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),
}

/// Failures raised by the API gateway.
///
/// Every remote failure maps to exactly one variant. HTTP failures keep the
/// server-provided message; `status()` recovers the original code.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Unauthorized { message: String },

    #[error("Permission denied: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation failed: {message}")]
    Validation { status: Option<u16>, message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Request error: {0}")]
    Transport(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => ApiError::Unauthorized { message },
            403 => ApiError::Forbidden { message },
            404 => ApiError::NotFound { message },
            400 | 422 => ApiError::Validation { status: Some(status), message },
            429 => ApiError::RateLimited { message },
            _ => ApiError::Server { status, message },
        }
    }

    /// Client-side validation failure raised before any request is sent
    pub fn invalid_request(message: impl Into<String>) -> Self {
        ApiError::Validation { status: None, message: message.into() }
    }

    /// HTTP status code that produced this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized { .. } => Some(401),
            ApiError::Forbidden { .. } => Some(403),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Validation { status, .. } => *status,
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Server { status, .. } => Some(*status),
            ApiError::Transport(_) | ApiError::Timeout(_) | ApiError::InvalidResponse(_) => None,
        }
    }

    /// Message without the classification prefix
    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized { message }
            | ApiError::Forbidden { message }
            | ApiError::NotFound { message }
            | ApiError::Validation { message, .. }
            | ApiError::RateLimited { message }
            | ApiError::Server { message, .. } => message,
            ApiError::Transport(message)
            | ApiError::Timeout(message)
            | ApiError::InvalidResponse(message) => message,
        }
    }
}

/// Local configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key cannot be empty")]
    EmptyApiKey,

    #[error("Invalid API key format. SelfLayer API keys must start with 'sl_live_' or 'sl_test_'")]
    InvalidApiKey,

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Home directory could not be determined")]
    NoHomeDirectory,

    #[error("Configuration is read-only in offline mode")]
    ReadOnly,

    #[error("Config file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while parsing or resolving a user command
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}. Type /help for available commands.")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(String),

    #[error("Invalid {kind} number: {value}")]
    InvalidIndex { kind: String, value: String },

    #[error("{kind} #{index} not found. Use {list_command} to list {plural}.")]
    IndexNotFound {
        kind: String,
        index: usize,
        list_command: String,
        plural: String,
    },

    #[error("SelfLayer API key required. Use /key to set it or set SELFLAYER_API_KEY environment variable.")]
    MissingCredential,

    #[error("{0}")]
    File(String),
}

/// Result alias for gateway calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for client operations
pub type SelflayerResult<T> = Result<T, SelflayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(ApiError::from_status(401, "bad key"), ApiError::Unauthorized { .. }));
        assert!(matches!(ApiError::from_status(403, "nope"), ApiError::Forbidden { .. }));
        assert!(matches!(ApiError::from_status(404, "gone"), ApiError::NotFound { .. }));
        assert!(matches!(ApiError::from_status(422, "bad"), ApiError::Validation { .. }));
        assert!(matches!(ApiError::from_status(400, "bad"), ApiError::Validation { .. }));
        assert!(matches!(ApiError::from_status(429, "slow"), ApiError::RateLimited { .. }));
        assert!(matches!(ApiError::from_status(503, "down"), ApiError::Server { status: 503, .. }));
        assert!(matches!(ApiError::from_status(302, "moved"), ApiError::Server { status: 302, .. }));
    }

    #[test]
    fn test_status_round_trips_for_http_errors() {
        for code in [400u16, 401, 403, 404, 422, 429, 500, 502] {
            assert_eq!(ApiError::from_status(code, "x").status(), Some(code));
        }
    }

    #[test]
    fn test_non_http_errors_have_no_status() {
        assert_eq!(ApiError::Timeout("profile".to_string()).status(), None);
        assert_eq!(ApiError::Transport("refused".to_string()).status(), None);
        assert_eq!(ApiError::invalid_request("empty").status(), None);
    }

    #[test]
    fn test_message_strips_classification() {
        let error = ApiError::from_status(404, "Note not found");
        assert_eq!(error.message(), "Note not found");
        assert_eq!(error.to_string(), "Not found: Note not found");
    }

    #[test]
    fn test_selflayer_error_from_api_error() {
        let error: SelflayerError = ApiError::from_status(401, "expired").into();

        match error {
            SelflayerError::Api(ApiError::Unauthorized { message }) => assert_eq!(message, "expired"),
            _ => panic!("Expected Api error"),
        }
    }

    #[test]
    fn test_index_not_found_display() {
        let error = CommandError::IndexNotFound {
            kind: "Note".to_string(),
            index: 7,
            list_command: "/n".to_string(),
            plural: "notes".to_string(),
        };
        assert_eq!(error.to_string(), "Note #7 not found. Use /n to list notes.");
    }

    #[test]
    fn test_config_error_display() {
        let error: SelflayerError = ConfigError::InvalidApiKey.into();
        assert!(error.to_string().contains("sl_live_"));
    }
}
