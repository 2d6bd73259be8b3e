use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, warn};

/// Request payload encodings used by the gateways
pub enum RequestBody<'a> {
    Empty,
    Json(&'a JsonValue),
    Form(&'a [(&'a str, String)]),
}

/// Error body shape shared by most gateway APIs
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(default, alias = "code")]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    provider: &'static str,
    timeout: Duration,
}

impl PaymentHttpClient {
    pub fn new(provider: &'static str, timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            provider,
            timeout,
        })
    }

    /// Sends one request authenticated with HTTP basic auth (secret key as
    /// username, empty password) and decodes the JSON response.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        secret_key: &str,
        body: RequestBody<'_>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .timeout(self.timeout)
            .basic_auth(secret_key, Some(""));

        for (k, v) in additional_headers {
            request = request.header(*k, *v);
        }
        request = match body {
            RequestBody::Empty => request,
            RequestBody::Json(payload) => request.json(payload),
            RequestBody::Form(fields) => request.form(fields),
        };

        debug!(provider = self.provider, method = %method, url = url, "gateway request");

        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError {
                message: format!("{} request failed: {}", self.provider, e),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
                provider: self.provider.to_string(),
                message: format!("invalid provider JSON response: {}", e),
                provider_code: None,
                retryable: false,
            });
        }

        if status.as_u16() == 429 {
            return Err(PaymentError::RateLimitError {
                message: format!("{} rate limit exceeded", self.provider),
                retry_after_seconds: None,
            });
        }

        let parsed = serde_json::from_str::<GatewayErrorBody>(&text).ok();
        let provider_code = parsed
            .as_ref()
            .and_then(|b| b.error_code.clone())
            .or_else(|| Some(status.as_u16().to_string()));

        warn!(
            provider = self.provider,
            status = %status,
            provider_code = ?provider_code,
            "gateway rejected request"
        );

        Err(PaymentError::ProviderError {
            provider: self.provider.to_string(),
            message: format!(
                "HTTP {}: {}",
                status,
                parsed.and_then(|b| b.message).unwrap_or(text)
            ),
            provider_code,
            retryable: status.is_server_error(),
        })
    }
}

/// Constant-time comparison for shared secrets
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
