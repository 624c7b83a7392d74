//! Backend transport: the HTTP client, its configuration, the normalized
//! error type and the retry policy layered on top.

pub mod client;
pub mod config;
pub mod error;
pub mod retry;

pub use client::{ApiClient, ApiResponse, HealthStatus, RequestOptions, ResponseBody};
pub use config::{ConfigValidationError, ServiceConfig, ServiceSettings};
pub use error::{ApiError, ErrorHandler, ServiceError};
pub use retry::{with_retry, RetryPolicy};
