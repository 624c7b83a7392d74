//! Normalized transport errors and the user-facing classification layer.
//!
//! Every failure inside [`crate::api::client::ApiClient`] converges on a
//! single [`ApiError`]. Domain services then pass that error through
//! [`ErrorHandler::handle`], which logs it with a call-site context and turns
//! it into the [`ServiceError`] surfaced to callers.

use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use tracing::error;

/// Status used for failures that never produced an HTTP response.
pub const STATUS_NETWORK: u16 = 0;
/// Status reported when a request exceeds its timeout.
pub const STATUS_TIMEOUT: u16 = 408;

pub const MSG_TIMEOUT: &str = "Request timeout";
pub const MSG_AUTHENTICATION: &str = "Authentication failed - please check your API key";
pub const MSG_PERMISSION: &str = "Access denied - insufficient permissions";
pub const MSG_RATE_LIMIT: &str = "Rate limit exceeded - please wait before trying again";
pub const MSG_SERVER: &str = "Server error - please try again later";
pub const MSG_UNEXPECTED: &str = "An unexpected error occurred";

/// The one error shape produced by the transport client.
///
/// `status == 0` marks a non-HTTP failure (connection refused, DNS, an
/// undecodable body); `status == 408` marks a client-side timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
    pub code: Option<String>,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            code: None,
            details: None,
        }
    }

    pub fn timeout() -> Self {
        Self::new(MSG_TIMEOUT, STATUS_TIMEOUT)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(message, STATUS_NETWORK)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            code: Some("decode_error".to_string()),
            ..Self::network(message)
        }
    }

    /// Builds the error for a non-2xx response from its raw body text.
    ///
    /// The body is parsed as JSON when possible; otherwise it is wrapped as
    /// `{"message": <text or status text>}` so `details` is always present.
    pub fn from_http_body(status: u16, status_text: &str, body: &str) -> Self {
        let details = serde_json::from_str::<Value>(body).unwrap_or_else(|_| {
            let message = if body.is_empty() { status_text } else { body };
            serde_json::json!({ "message": message })
        });

        let message = details
            .get("message")
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}: {status_text}"));
        let code = details
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            message,
            status,
            code,
            details: Some(details),
        }
    }

    /// Server errors and rate limiting are transient; everything else is final.
    pub fn is_retryable(&self) -> bool {
        self.status >= 500 || self.status == 429
    }

    pub fn is_network(&self) -> bool {
        self.status == STATUS_NETWORK || self.status == STATUS_TIMEOUT
    }

    fn validation_detail(&self) -> String {
        match self.details.as_ref().and_then(|details| details.get("detail")) {
            Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
            Some(Value::Null) | None => self.message.clone(),
            Some(Value::String(_)) => self.message.clone(),
            Some(other) => other.to_string(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for ApiError {}

/// Errors surfaced to callers of the domain services.
#[derive(Debug)]
pub enum ServiceError {
    /// HTTP 401.
    Authentication,
    /// HTTP 403.
    PermissionDenied,
    /// HTTP 429.
    RateLimited,
    /// HTTP 422, carrying the backend's detail text.
    Validation(String),
    /// HTTP 500.
    Server,
    /// Any other normalized failure, surfaced with its message verbatim.
    Api(ApiError),
    /// A non-transport error, passed through unchanged.
    Other(Box<dyn StdError + Send + Sync>),
    /// A failure carrying nothing worth showing.
    Unexpected,
    /// The service locator was accessed before it was configured.
    ConfigurationRequired,
    /// A locally rejected request (e.g. an empty chat message).
    InvalidRequest(String),
}

impl ServiceError {
    /// Status code of the underlying HTTP failure, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ServiceError::Authentication => Some(401),
            ServiceError::PermissionDenied => Some(403),
            ServiceError::RateLimited => Some(429),
            ServiceError::Validation(_) => Some(422),
            ServiceError::Server => Some(500),
            ServiceError::Api(err) => Some(err.status),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Authentication => write!(f, "{MSG_AUTHENTICATION}"),
            ServiceError::PermissionDenied => write!(f, "{MSG_PERMISSION}"),
            ServiceError::RateLimited => write!(f, "{MSG_RATE_LIMIT}"),
            ServiceError::Validation(detail) => write!(f, "Validation error: {detail}"),
            ServiceError::Server => write!(f, "{MSG_SERVER}"),
            ServiceError::Api(err) => write!(f, "{}", err.message),
            ServiceError::Other(err) => write!(f, "{err}"),
            ServiceError::Unexpected => write!(f, "{MSG_UNEXPECTED}"),
            ServiceError::ConfigurationRequired => write!(
                f,
                "ServiceFactory must be initialized with config on first use"
            ),
            ServiceError::InvalidRequest(reason) => write!(f, "{reason}"),
        }
    }
}

impl StdError for ServiceError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ServiceError::Api(err) => Some(err),
            ServiceError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<ApiError> for ServiceError {
    fn from(err: ApiError) -> Self {
        ServiceError::Api(err)
    }
}

/// Classifies and translates failures for the domain services.
pub struct ErrorHandler;

impl ErrorHandler {
    /// Only normalized transport errors can be retried.
    pub fn is_retryable(err: &(dyn StdError + 'static)) -> bool {
        err.downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_retryable)
    }

    /// Logs `err` with `context` and returns the error the caller must raise.
    ///
    /// Call sites always propagate the result; there is no recovery path.
    pub fn handle(err: impl Into<Box<dyn StdError + Send + Sync>>, context: &str) -> ServiceError {
        let err = err.into();
        error!(context = %context, error = %err, "Service call failed");

        let err = match err.downcast::<ApiError>() {
            Ok(api_error) => return Self::classify(*api_error),
            Err(other) => other,
        };

        match err.downcast::<ServiceError>() {
            Ok(service_error) => *service_error,
            Err(other) if other.to_string().is_empty() => ServiceError::Unexpected,
            Err(other) => ServiceError::Other(other),
        }
    }

    fn classify(err: ApiError) -> ServiceError {
        match err.status {
            401 => ServiceError::Authentication,
            403 => ServiceError::PermissionDenied,
            429 => ServiceError::RateLimited,
            422 => ServiceError::Validation(err.validation_detail()),
            500 => ServiceError::Server,
            _ => ServiceError::Api(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn http_body_with_message_uses_it() {
        let err = ApiError::from_http_body(404, "Not Found", r#"{"message":"not found"}"#);
        assert_eq!(err.message, "not found");
        assert_eq!(err.status, 404);
        assert_eq!(err.details, Some(json!({"message": "not found"})));
    }

    #[test]
    fn http_body_without_message_falls_back_to_status_line() {
        let err = ApiError::from_http_body(404, "Not Found", r#"{"detail":"missing"}"#);
        assert_eq!(err.message, "HTTP 404: Not Found");
        assert_eq!(err.details, Some(json!({"detail": "missing"})));
    }

    #[test]
    fn http_body_plain_text_becomes_message() {
        let err = ApiError::from_http_body(502, "Bad Gateway", "upstream exploded");
        assert_eq!(err.message, "upstream exploded");
        assert_eq!(err.details, Some(json!({"message": "upstream exploded"})));

        let empty = ApiError::from_http_body(503, "Service Unavailable", "");
        assert_eq!(empty.message, "Service Unavailable");
    }

    #[test]
    fn http_body_code_is_extracted() {
        let err = ApiError::from_http_body(
            400,
            "Bad Request",
            r#"{"message":"bad","code":"E_BAD"}"#,
        );
        assert_eq!(err.code.as_deref(), Some("E_BAD"));
    }

    #[test]
    fn retryable_statuses() {
        for status in [500, 502, 503, 599, 429] {
            assert!(ApiError::new("x", status).is_retryable(), "{status}");
        }
        for status in [0, 400, 401, 403, 404, 408, 422] {
            assert!(!ApiError::new("x", status).is_retryable(), "{status}");
        }
    }

    #[test]
    fn non_api_errors_are_never_retryable() {
        let io = std::io::Error::other("boom");
        assert!(!ErrorHandler::is_retryable(&io));
        assert!(ErrorHandler::is_retryable(&ApiError::new("x", 503)));
    }

    #[test]
    fn handle_maps_statuses_to_messages() {
        let cases = [
            (401, MSG_AUTHENTICATION),
            (403, MSG_PERMISSION),
            (429, MSG_RATE_LIMIT),
            (500, MSG_SERVER),
        ];
        for (status, expected) in cases {
            let err = ErrorHandler::handle(ApiError::new("raw", status), "ctx");
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn handle_validation_prefers_detail() {
        let mut err = ApiError::new("Unprocessable", 422);
        err.details = Some(json!({"detail": "name is required"}));
        assert_eq!(
            ErrorHandler::handle(err, "ctx").to_string(),
            "Validation error: name is required"
        );

        let bare = ApiError::new("Unprocessable", 422);
        assert_eq!(
            ErrorHandler::handle(bare, "ctx").to_string(),
            "Validation error: Unprocessable"
        );
    }

    #[test]
    fn handle_passes_other_statuses_through() {
        let err = ErrorHandler::handle(ApiError::new("not found", 404), "ctx");
        assert_eq!(err.to_string(), "not found");
        assert_eq!(err.status(), Some(404));

        let timeout = ErrorHandler::handle(ApiError::timeout(), "ctx");
        assert_eq!(timeout.to_string(), MSG_TIMEOUT);
    }

    #[test]
    fn handle_reraises_foreign_errors_unchanged() {
        let err = ErrorHandler::handle(std::io::Error::other("disk on fire"), "ctx");
        assert!(matches!(err, ServiceError::Other(_)));
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn handle_keeps_service_errors_and_empty_errors() {
        let err = ErrorHandler::handle(ServiceError::InvalidRequest("nope".into()), "ctx");
        assert!(matches!(err, ServiceError::InvalidRequest(_)));

        let empty = ErrorHandler::handle(std::io::Error::other(""), "ctx");
        assert!(matches!(empty, ServiceError::Unexpected));
        assert_eq!(empty.to_string(), MSG_UNEXPECTED);
    }
}
