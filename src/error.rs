use axum::http::StatusCode;
use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Error types for the size sorter
#[derive(Error, Debug)]
pub enum GmailError {
    /// No credentials in the session, or they could not be refreshed
    #[error("Not authenticated")]
    Unauthenticated,

    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// OAuth flow failed (authorization URL, code exchange, refresh)
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// The OAuth callback did not match the flow started by this session
    #[error("Invalid OAuth state: {0}")]
    InvalidState(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// A fetched message is missing a required field or carries an impossible value
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Negative byte count handed to the classifier
    #[error("Invalid message size: {0} bytes")]
    InvalidSize(i64),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GmailError {
    /// Whether the failure came from the remote message source
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GmailError::ApiError(_)
                | GmailError::RateLimitExceeded
                | GmailError::NetworkError(_)
                | GmailError::ServerError { .. }
                | GmailError::MessageNotFound(_)
                | GmailError::BadRequest(_)
                | GmailError::Forbidden(_)
                | GmailError::InvalidMessageFormat(_)
        )
    }

    /// HTTP status used when this error is reported by the JSON API
    pub fn status_code(&self) -> StatusCode {
        match self {
            GmailError::Unauthenticated => StatusCode::UNAUTHORIZED,
            GmailError::AuthError(_) | GmailError::InvalidState(_) => StatusCode::BAD_REQUEST,
            e if e.is_upstream() => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => GmailError::RateLimitExceeded,
                    404 => GmailError::MessageNotFound("Resource not found".to_string()),
                    400 => GmailError::BadRequest(message),
                    401 => GmailError::Unauthenticated,
                    403 => GmailError::Forbidden(message),
                    500..=599 => GmailError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => GmailError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => GmailError::BadRequest(format!("{}", err)),
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(ref err) => {
                GmailError::AuthError(format!("Missing token: {}", err))
            }
            _ => GmailError::ApiError(error.to_string()),
        }
    }
}
