//! debi HTTP Client
//!
//! Thin JSON-over-HTTPS wrapper around the debi REST API.

use std::time::Duration;

use reqwest::{Method, StatusCode, header::ACCEPT};
use serde::Serialize;
use serde_json::Value;

use crate::error::{DebiError, Result};

/// Sandbox API host
pub const SANDBOX_URL: &str = "https://api.debi-test.pro";

/// Production API host
pub const LIVE_URL: &str = "https://api.debi.pro";

/// Client configuration
#[derive(Clone, Debug)]
pub struct DebiConfig {
    /// Bearer token from the debi dashboard
    pub api_key: String,

    /// Talk to the sandbox environment
    pub sandbox: bool,

    /// Explicit base URL, overrides the sandbox/live choice
    pub base_url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for DebiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            sandbox: true,
            base_url: None,
            timeout_secs: 30,
        }
    }
}

impl DebiConfig {
    /// Read `DEBI_API_KEY`, `DEBI_SANDBOX`, `DEBI_API_BASE_URL` and `DEBI_TIMEOUT_SECS`.
    ///
    /// A missing key is not an error here; callers decide what to do with an
    /// unauthenticated client (see [`DebiClient::has_token`]).
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_key: std::env::var("DEBI_API_KEY")
                .map(|k| k.trim().to_string())
                .unwrap_or_default(),
            sandbox: env_flag("DEBI_SANDBOX", defaults.sandbox),
            base_url: std::env::var("DEBI_API_BASE_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            timeout_secs: std::env::var("DEBI_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.trim().parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }

    /// Effective base URL
    pub fn endpoint(&self) -> &str {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/'),
            None if self.sandbox => SANDBOX_URL,
            None => LIVE_URL,
        }
    }
}

/// Read a boolean environment variable, falling back to `default` when unset.
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map_or(default, |v| parse_flag(&v))
}

/// `1`, `true`, `yes` and `on` are true; anything else is false.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// debi API client
pub struct DebiClient {
    http: reqwest::Client,
    config: DebiConfig,
}

impl DebiClient {
    /// Create a sandbox client for the given API key
    pub fn new(api_key: &str) -> Result<Self> {
        Self::from_config(DebiConfig {
            api_key: api_key.to_string(),
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: DebiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("debi-rust/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DebiError::Config(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(DebiConfig::from_env())
    }

    /// Whether an API key is configured
    pub fn has_token(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    pub const fn config(&self) -> &DebiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.endpoint();
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Send a request and decode the JSON response.
    ///
    /// Non-2xx answers become [`DebiError::RequestFailed`] carrying the
    /// provider's error message. An empty success body decodes to `null`.
    pub async fn request<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path);
        tracing::debug!(%method, %url, "debi request");

        let mut builder = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.config.api_key)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_message(status, &text);
            tracing::warn!(
                %method,
                path,
                status = status.as_u16(),
                %message,
                "debi request failed"
            );
            return Err(DebiError::RequestFailed {
                status: status.as_u16(),
                message,
            });
        }

        decode_body(&text)
    }
}

fn decode_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| DebiError::InvalidResponse(e.to_string()))
}

/// Pull a readable message out of an error body.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let found = value
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| value.get("message").and_then(Value::as_str))
            .or_else(|| value.get("error").and_then(Value::as_str));
        if let Some(message) = found {
            return message.to_string();
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body.to_string()
    }
}
