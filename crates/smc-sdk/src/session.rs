// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Scoped, authenticated session with the management server.

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::config::{Credentials, SdkConfig};
use crate::element::{ElementKind, RemoteRef};
use crate::error::{Result, SdkError};
use crate::http::HttpTransport;
use crate::transport::{ActionRequest, Method, RawResponse, Transport};

/// An authenticated session.
///
/// Logging out happens on [`Session::close`] or, on every other exit path,
/// when the session is dropped. Every SDK operation takes the session (or
/// its [`transport`](Session::transport)) explicitly.
#[derive(Debug)]
pub struct Session {
    transport: HttpTransport,
    config: SdkConfig,
    api_version: String,
    active: bool,
}

impl Session {
    /// Resolve the API version and log in.
    #[instrument(skip(config), fields(url = %config.base_url))]
    pub fn open(config: SdkConfig) -> Result<Self> {
        let api_version = match &config.api_version {
            Some(version) => version.clone(),
            None => discover_version(&config)?,
        };

        let root = format!("{}/{}", config.base(), api_version);
        let transport = HttpTransport::new(root, config.connect_timeout, config.request_timeout);

        let body = match &config.credentials {
            Credentials::ApiKey(key) => json!({ "authenticationkey": key }),
            Credentials::Login { user, password } => json!({ "login": user, "pwd": password }),
        };
        transport.send(
            &transport.url("login"),
            &ActionRequest::post().with_body(body),
        )?;

        info!(api_version = %api_version, "Logged in to management server");

        Ok(Self {
            transport,
            config,
            api_version,
            active: true,
        })
    }

    /// Create a session from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::open(SdkConfig::from_env()?)
    }

    /// Log out, surfacing any error.
    pub fn close(mut self) -> Result<()> {
        self.active = false;
        self.logout()
    }

    /// API version in use.
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Session configuration.
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// Shared transport, cheap to clone into worker threads.
    ///
    /// It stays authenticated only while this session is alive.
    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    fn logout(&self) -> Result<()> {
        let request = ActionRequest {
            method: Method::Put,
            ..ActionRequest::default()
        };
        self.transport
            .send(&self.transport.url("logout"), &request)?;
        debug!("Logged out");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            if let Err(e) = self.logout() {
                warn!(error = %e, "Logout failed");
            }
        }
    }
}

impl Transport for Session {
    fn create(&self, kind: &ElementKind, body: &Value) -> Result<RemoteRef> {
        self.transport.create(kind, body)
    }

    fn invoke(
        &self,
        target: &RemoteRef,
        action: &str,
        request: &ActionRequest,
    ) -> Result<RawResponse> {
        self.transport.invoke(target, action, request)
    }

    fn read(&self, href: &str) -> Result<Value> {
        self.transport.read(href)
    }

    fn lookup(&self, kind: &ElementKind, name: &str) -> Result<RemoteRef> {
        self.transport.lookup(kind, name)
    }

    fn list(&self, kind: &ElementKind) -> Result<Vec<RemoteRef>> {
        self.transport.list(kind)
    }

    fn delete(&self, target: &RemoteRef) -> Result<()> {
        self.transport.delete(target)
    }
}

/// Ask the server which API versions it offers and pick the newest.
fn discover_version(config: &SdkConfig) -> Result<String> {
    let probe = HttpTransport::new(config.base(), config.connect_timeout, config.request_timeout);
    let doc = probe
        .send(&probe.url("api"), &ActionRequest::get())?
        .json()?;
    newest_version(&doc).ok_or_else(|| {
        SdkError::UnexpectedResponse("server advertised no api version".to_string())
    })
}

fn newest_version(doc: &Value) -> Option<String> {
    doc.get("version")?
        .as_array()?
        .iter()
        .filter_map(|v| v.get("rel").and_then(Value::as_str))
        .max_by_key(|rel| version_key(rel))
        .map(str::to_string)
}

fn version_key(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}
