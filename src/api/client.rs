//! HTTP transport shared by every domain service.

use crate::api::config::ServiceConfig;
use crate::api::error::ApiError;
use crate::utils::url::construct_api_url;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

/// Parsed body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    fn into_value(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }
}

/// Uniform wrapper returned by every successful call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub success: bool,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            data,
            success: true,
            error: None,
        }
    }
}

impl ApiResponse<ResponseBody> {
    /// Decodes the payload into `T`. Text payloads decode as JSON strings.
    pub fn decode<T: DeserializeOwned>(self) -> Result<ApiResponse<T>, ApiError> {
        let data = serde_json::from_value(self.data.into_value())
            .map_err(|err| ApiError::decode(format!("Failed to decode response: {err}")))?;
        Ok(ApiResponse {
            data,
            success: self.success,
            error: self.error,
        })
    }
}

/// Per-call request description.
///
/// Caller headers win over the defaults; `skip_auth` strips `Authorization`
/// even when the caller supplied one.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub timeout: Option<Duration>,
    pub skip_auth: bool,
}

impl RequestOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }
}

/// Payload of `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Backend HTTP client.
///
/// The API key sits behind a lock so it can be rotated while services hold
/// shared references; headers are rebuilt for every call.
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    default_timeout: Duration,
    api_key: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| ApiError::network(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            default_timeout: config.timeout(),
            api_key: RwLock::new(config.api_key().map(str::to_string)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn set_api_key(&self, api_key: impl Into<String>) {
        let api_key = api_key.into();
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) =
            Some(api_key).filter(|key| !key.is_empty());
    }

    pub fn clear_api_key(&self) {
        *self.api_key.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn current_api_key(&self) -> Option<String> {
        self.api_key
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Default headers merged with the caller's, as they will be sent.
    pub fn build_headers(&self, options: &RequestOptions) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = self.current_api_key() {
            let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|err| ApiError::network(format!("Invalid API key header: {err}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| ApiError::network(format!("Invalid header name '{name}': {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| ApiError::network(format!("Invalid header value: {err}")))?;
            headers.insert(name, value);
        }

        if options.skip_auth {
            headers.remove(AUTHORIZATION);
        }

        Ok(headers)
    }

    /// Performs one request and normalizes its outcome.
    ///
    /// The timeout covers both sending and reading the body. The timer lives
    /// inside the awaited future, so it is dropped on every exit path.
    pub async fn request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<ResponseBody>, ApiError> {
        let url = construct_api_url(&self.base_url, path);
        let headers = self.build_headers(&options)?;
        let timeout = options.timeout.unwrap_or(self.default_timeout);

        let mut request = self
            .http
            .request(options.method.clone(), &url)
            .headers(headers);
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(body) = &options.body {
            request = request.body(body.to_string());
        }

        debug!(method = %options.method, url = %url, "Sending API request");

        match tokio::time::timeout(timeout, Self::execute(request)).await {
            Ok(result) => {
                if let Err(err) = &result {
                    debug!(url = %url, status = err.status, error = %err, "API request failed");
                }
                result
            }
            Err(_) => {
                warn!(url = %url, timeout_ms = timeout.as_millis() as u64, "API request timed out");
                Err(ApiError::timeout())
            }
        }
    }

    async fn execute(request: reqwest::RequestBuilder) -> Result<ApiResponse<ResponseBody>, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|err| ApiError::network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or("");
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    debug!(status = status.as_u16(), error = %err, "Could not read error body");
                    String::new()
                }
            };
            return Err(ApiError::from_http_body(status.as_u16(), status_text, &body));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("application/json"));

        let data = if is_json {
            let value = response
                .json::<Value>()
                .await
                .map_err(|err| ApiError::decode(format!("Invalid JSON response: {err}")))?;
            ResponseBody::Json(value)
        } else {
            let text = response
                .text()
                .await
                .map_err(|err| ApiError::network(err.to_string()))?;
            ResponseBody::Text(text)
        };

        Ok(ApiResponse::ok(data))
    }

    async fn send_typed<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.request(path, options).await?.decode()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.get_with(path, RequestOptions::default()).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse<T>, ApiError> {
        self.send_typed(
            path,
            RequestOptions {
                method: Method::GET,
                ..options
            },
        )
        .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let options = RequestOptions {
            method: Method::POST,
            body: Some(encode_body(body)?),
            ..Default::default()
        };
        self.send_typed(path, options).await
    }

    /// POST without a request body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.send_typed(path, RequestOptions::method(Method::POST)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let options = RequestOptions {
            method: Method::PUT,
            body: Some(encode_body(body)?),
            ..Default::default()
        };
        self.send_typed(path, options).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.send_typed(path, RequestOptions::method(Method::DELETE))
            .await
    }

    /// `GET /health` without credentials.
    pub async fn health(&self) -> Result<ApiResponse<HealthStatus>, ApiError> {
        self.get_with(
            "/health",
            RequestOptions {
                skip_auth: true,
                ..Default::default()
            },
        )
        .await
    }
}

fn encode_body<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body)
        .map_err(|err| ApiError::decode(format!("Failed to encode request body: {err}")))
}

#[cfg(test)]
mod tests;
