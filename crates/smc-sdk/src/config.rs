// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the SMC client.

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{Result, SdkError};

/// How the session authenticates against the management server.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// API client key created under the server's administrator settings.
    ApiKey(String),
    /// Administrator user name and password.
    Login { user: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::Login { user, .. } => f
                .debug_struct("Login")
                .field("user", user)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Configuration for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Base URL of the management server, e.g. `https://192.168.1.1:8082`.
    pub base_url: Url,
    /// API version to use. Discovered from the server when `None`.
    pub api_version: Option<String>,
    /// Authentication material.
    pub credentials: Credentials,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Spacing between status checks when waiting on an operation.
    pub poll_interval: Duration,
    /// Upper bound for waits. `None` waits until the operation is terminal.
    pub wait_timeout: Option<Duration>,
}

impl SdkConfig {
    /// Create a configuration with default timeouts.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.scheme() != "http" && base_url.scheme() != "https" {
            return Err(SdkError::Config(format!(
                "unsupported url scheme '{}'",
                base_url.scheme()
            )));
        }

        Ok(Self {
            base_url,
            api_version: None,
            credentials,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
            wait_timeout: None,
        })
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SMC_API_URL`: Server URL (required)
    /// - `SMC_API_VERSION`: API version (default: discovered)
    /// - `SMC_API_KEY`: API client key
    /// - `SMC_USER` / `SMC_PWD`: Login credentials, used when no API key is set
    /// - `SMC_CONNECT_TIMEOUT_MS`: Connection timeout in milliseconds (default: 10000)
    /// - `SMC_REQUEST_TIMEOUT_MS`: Request timeout in milliseconds (default: 30000)
    /// - `SMC_POLL_INTERVAL_MS`: Poll interval in milliseconds (default: 3000)
    /// - `SMC_WAIT_TIMEOUT_MS`: Wait timeout in milliseconds (default: none)
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("SMC_API_URL")
            .map_err(|_| SdkError::Config("SMC_API_URL is required".to_string()))?;

        let credentials = match (
            env::var("SMC_API_KEY").ok(),
            env::var("SMC_USER").ok(),
            env::var("SMC_PWD").ok(),
        ) {
            (Some(key), _, _) if !key.is_empty() => Credentials::ApiKey(key),
            (_, Some(user), Some(password)) => Credentials::Login { user, password },
            _ => {
                return Err(SdkError::Config(
                    "either SMC_API_KEY or SMC_USER and SMC_PWD must be set".to_string(),
                ));
            }
        };

        let mut config = Self::new(&base_url, credentials)?;
        config.api_version = env::var("SMC_API_VERSION").ok().filter(|v| !v.is_empty());
        config.connect_timeout = Duration::from_millis(millis_var("SMC_CONNECT_TIMEOUT_MS", 10_000)?);
        config.request_timeout = Duration::from_millis(millis_var("SMC_REQUEST_TIMEOUT_MS", 30_000)?);
        config.poll_interval = Duration::from_millis(millis_var("SMC_POLL_INTERVAL_MS", 3_000)?);
        config.wait_timeout = match env::var("SMC_WAIT_TIMEOUT_MS") {
            Ok(v) => Some(Duration::from_millis(v.parse().map_err(|e| {
                SdkError::Config(format!("invalid SMC_WAIT_TIMEOUT_MS: {}", e))
            })?)),
            Err(_) => None,
        };

        Ok(config)
    }

    /// Pin the API version instead of discovering it.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound waits on remote operations.
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Base URL without a trailing slash.
    pub(crate) fn base(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

fn millis_var(name: &str, default: u64) -> Result<u64> {
    match env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|e| SdkError::Config(format!("invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
