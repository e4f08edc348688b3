//! Resilient outbound HTTP client.
//!
//! One logical request on behalf of a user: resolve their credential, attach
//! it using the host's transport convention, call with bounded
//! exponential-backoff retry on transient failures, and return the parsed
//! JSON payload or a classified [`ApiError`]. Retry attempts are strictly
//! sequential; callers only ever see the final outcome.

pub mod error;
pub mod retry;

pub use error::ApiError;
pub use retry::{RetryPolicy, RETRYABLE_STATUS_CODES};

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::credentials::{KeyResolver, Service, UserId};

/// How the resolved credential rides on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Gateway style: `X-RapidAPI-Key` + `X-RapidAPI-Host` header pair.
    RapidApiHeaders,
    /// Platform-API style: a single query parameter holding the key.
    QueryParam(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One logical outbound request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub service: Service,
    /// Logical upstream host, e.g. `www.googleapis.com`. Also the value of
    /// the `X-RapidAPI-Host` header for gateway requests.
    pub host: String,
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub method: Method,
    pub body: Option<serde_json::Value>,
    pub auth: Auth,
}

impl RequestSpec {
    pub fn get(service: Service, host: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            service,
            host: host.into(),
            endpoint: endpoint.into(),
            params: Vec::new(),
            method: Method::Get,
            body: None,
            auth: match service {
                Service::RapidApi => Auth::RapidApiHeaders,
                Service::Youtube => Auth::QueryParam("key"),
            },
        }
    }

    pub fn post(
        service: Service,
        host: impl Into<String>,
        endpoint: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            body: Some(body),
            method: Method::Post,
            ..Self::get(service, host, endpoint)
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Append a list-valued parameter, comma-joined per platform convention.
    pub fn with_list_param(mut self, key: impl Into<String>, values: &[&str]) -> Self {
        self.params.push((key.into(), values.join(",")));
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }
}

/// Outcome of a single attempt. The retry loop drives on this tag; nothing
/// is thrown across it.
enum AttemptOutcome<T> {
    Success(T),
    Retryable(RetryableFailure),
    Fatal(ApiError),
}

enum RetryableFailure {
    Upstream(ApiError),
    Network(reqwest::Error),
}

impl RetryableFailure {
    fn describe(&self) -> String {
        match self {
            RetryableFailure::Upstream(err) => err.to_string(),
            RetryableFailure::Network(err) => format!("network error: {err}"),
        }
    }

    fn into_error(self, attempts: u32) -> ApiError {
        match self {
            RetryableFailure::Upstream(err) => err,
            RetryableFailure::Network(err) => {
                debug!(error = %err, "network failure after final attempt");
                ApiError::Network { attempts }
            }
        }
    }
}

/// Issues outbound requests with credential resolution and retry.
pub struct ApiClient {
    http: reqwest::Client,
    resolver: Arc<KeyResolver>,
    policy: RetryPolicy,
    base_url_override: Option<String>,
}

impl ApiClient {
    pub fn new(resolver: Arc<KeyResolver>) -> Self {
        Self {
            http: reqwest::Client::new(),
            resolver,
            policy: RetryPolicy::default(),
            base_url_override: None,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Point every request at `base_url` instead of `https://{host}`. The
    /// logical host still rides in the gateway header. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Issue one logical request and parse the 2xx body as `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        user_id: &UserId,
        spec: &RequestSpec,
    ) -> Result<T, ApiError> {
        self.request_cancellable(user_id, spec, &CancellationToken::new())
            .await
    }

    /// Like [`Self::request`], aborting the in-flight attempt and skipping
    /// any pending backoff wait when `cancel` fires.
    pub async fn request_cancellable<T: DeserializeOwned>(
        &self,
        user_id: &UserId,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let key = self.resolver.resolve(user_id, spec.service).await?;

        let mut attempt: u32 = 0;
        loop {
            match self.attempt::<T>(&key, spec, cancel).await {
                AttemptOutcome::Success(value) => return Ok(value),
                AttemptOutcome::Fatal(err) => return Err(err),
                AttemptOutcome::Retryable(failure) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts {
                        return Err(failure.into_error(self.policy.max_attempts));
                    }

                    let delay = self.policy.backoff(attempt - 1);
                    warn!(
                        service = %spec.service,
                        endpoint = %spec.endpoint,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        failure = %failure.describe(),
                        "request failed, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn attempt<T: DeserializeOwned>(
        &self,
        key: &SecretString,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> AttemptOutcome<T> {
        let url = format!("{}{}", self.base_url(spec), spec.endpoint);

        let mut request = match spec.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
        };
        request = request.query(&spec.params);

        match spec.auth {
            Auth::RapidApiHeaders => {
                request = request
                    .header("X-RapidAPI-Key", key.expose_secret())
                    .header("X-RapidAPI-Host", &spec.host);
            }
            Auth::QueryParam(name) => {
                request = request.query(&[(name, key.expose_secret())]);
            }
        }

        if let Some(body) = &spec.body {
            request = request.json(body);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return AttemptOutcome::Fatal(ApiError::Cancelled),
            response = request.send() => response,
        };

        let response = match response {
            Ok(response) => response,
            // No HTTP response at all: retry exactly like a transient status.
            Err(err) => return AttemptOutcome::Retryable(RetryableFailure::Network(err)),
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.ok().filter(|s| !s.is_empty());
            let err = ApiError::Upstream {
                service: spec.service,
                status,
                message,
                retryable: retry::is_retryable_status(status),
            };
            return if retry::is_retryable_status(status) {
                AttemptOutcome::Retryable(RetryableFailure::Upstream(err))
            } else {
                AttemptOutcome::Fatal(err)
            };
        }

        match response.json::<T>().await {
            Ok(value) => AttemptOutcome::Success(value),
            Err(err) => AttemptOutcome::Fatal(ApiError::Decode(err)),
        }
    }

    fn base_url(&self, spec: &RequestSpec) -> String {
        match &self.base_url_override {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}", spec.host),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_auth_follows_service_convention() {
        let spec = RequestSpec::get(Service::RapidApi, "some.p.rapidapi.com", "/search");
        assert_eq!(spec.auth, Auth::RapidApiHeaders);

        let spec = RequestSpec::get(Service::Youtube, "www.googleapis.com", "/youtube/v3/search");
        assert_eq!(spec.auth, Auth::QueryParam("key"));
    }

    #[test]
    fn list_params_are_comma_joined() {
        let spec = RequestSpec::get(Service::Youtube, "www.googleapis.com", "/youtube/v3/videos")
            .with_list_param("part", &["snippet", "statistics"])
            .with_param("id", "abc");
        assert_eq!(
            spec.params,
            vec![
                ("part".to_string(), "snippet,statistics".to_string()),
                ("id".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn post_spec_carries_body() {
        let spec = RequestSpec::post(
            Service::RapidApi,
            "some.p.rapidapi.com",
            "/submit",
            serde_json::json!({"q": "cats"}),
        );
        assert_eq!(spec.method, Method::Post);
        assert!(spec.body.is_some());
    }
}
