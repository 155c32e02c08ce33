// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Blocking HTTP transport built on `ureq`.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::element::{ElementKind, RemoteRef, find_link, parse_listing};
use crate::error::{Result, SdkError};
use crate::transport::{ActionRequest, Method, RawResponse, Transport, server_message};

/// Largest response body the transport will buffer.
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// [`Transport`] over the management server's REST API.
///
/// Clones share the connection pool and the session cookie, so one
/// transport can serve pollers on many threads.
#[derive(Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
    root: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("root", &self.root)
            .finish()
    }
}

impl HttpTransport {
    /// Create a transport rooted at `{base}/{version}`.
    pub fn new(root: impl Into<String>, connect_timeout: Duration, request_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout(request_timeout)
            .user_agent(concat!("smc-sdk/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            root: root.into().trim_end_matches('/').to_string(),
        }
    }

    /// Versioned API root, e.g. `https://smc:8082/6.10`.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Absolute URL for a path below the API root.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.root, path.trim_start_matches('/'))
        }
    }

    /// Issue a request against an absolute URL.
    pub(crate) fn send(&self, url: &str, request: &ActionRequest) -> Result<RawResponse> {
        debug!(method = request.method.as_str(), url = %url, "Sending request");

        let mut req = self
            .agent
            .request(request.method.as_str(), url)
            .set(
                "Accept",
                request.accept.as_deref().unwrap_or("application/json"),
            );
        for (key, value) in &request.params {
            req = req.query(key, value);
        }

        let result = match &request.body {
            Some(body) => req.send_json(body),
            None => req.call(),
        };

        match result {
            Ok(response) => into_raw(response),
            Err(ureq::Error::Status(status, response)) => {
                let raw = into_raw(response)?;
                Err(SdkError::Server {
                    status,
                    message: server_message(&raw.body),
                })
            }
            Err(ureq::Error::Transport(err)) => Err(SdkError::Connection(err.to_string())),
        }
    }

    fn read_element(&self, target: &RemoteRef) -> Result<Value> {
        self.read(target.href())
    }
}

fn into_raw(response: ureq::Response) -> Result<RawResponse> {
    read_limited(response, MAX_BODY_BYTES)
}

/// Buffer the response. Bodies longer than `limit` are an error, never
/// truncated.
fn read_limited(response: ureq::Response, limit: u64) -> Result<RawResponse> {
    let status = response.status();
    let content_type = response.header("Content-Type").map(str::to_string);
    let location = response.header("Location").map(str::to_string);

    let mut body = Vec::new();
    response
        .into_reader()
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)
        .map_err(|e| SdkError::Connection(format!("failed to read response body: {}", e)))?;
    if body.len() as u64 > limit {
        return Err(SdkError::UnexpectedResponse(format!(
            "response body exceeds {} bytes",
            limit
        )));
    }

    Ok(RawResponse {
        status,
        content_type,
        location,
        body,
    })
}

impl Transport for HttpTransport {
    #[instrument(skip(self, body), fields(kind = %kind))]
    fn create(&self, kind: &ElementKind, body: &Value) -> Result<RemoteRef> {
        let url = self.url(&format!("elements/{}", kind.as_str()));
        let response = self.send(&url, &ActionRequest::post().with_body(body.clone()))?;

        let href = response.location.ok_or_else(|| {
            SdkError::UnexpectedResponse(format!("create {} returned no location", kind))
        })?;
        let name = body.get("name").and_then(Value::as_str).map(str::to_string);
        debug!(href = %href, "Element created");
        Ok(RemoteRef::new(kind.clone(), href, name))
    }

    #[instrument(skip(self, request), fields(target = %target, action = %action))]
    fn invoke(
        &self,
        target: &RemoteRef,
        action: &str,
        request: &ActionRequest,
    ) -> Result<RawResponse> {
        let element = self.read_element(target)?;
        let link = find_link(&element, action).ok_or_else(|| SdkError::ActionNotFound {
            action: action.to_string(),
            target: target.to_string(),
        })?;
        self.send(&link.href, request)
    }

    fn read(&self, href: &str) -> Result<Value> {
        self.send(&self.url(href), &ActionRequest::get())?.json()
    }

    #[instrument(skip(self), fields(kind = %kind))]
    fn lookup(&self, kind: &ElementKind, name: &str) -> Result<RemoteRef> {
        let url = self.url(&format!("elements/{}", kind.as_str()));
        let request = ActionRequest::get()
            .with_param("filter", name)
            .with_param("exact_match", "true");
        let listing = parse_listing(&self.send(&url, &request)?.json()?)?;

        listing
            .into_iter()
            .find(|r| r.name() == Some(name))
            .map(|r| RemoteRef::new(kind.clone(), r.href(), Some(name.to_string())))
            .ok_or_else(|| SdkError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }

    #[instrument(skip(self), fields(kind = %kind))]
    fn list(&self, kind: &ElementKind) -> Result<Vec<RemoteRef>> {
        let url = self.url(&format!("elements/{}", kind.as_str()));
        let listing = parse_listing(&self.send(&url, &ActionRequest::get())?.json()?)?;
        Ok(listing
            .into_iter()
            .map(|r| match r.kind() {
                ElementKind::Other(tag) if tag.is_empty() => {
                    RemoteRef::new(kind.clone(), r.href(), r.name().map(str::to_string))
                }
                _ => r,
            })
            .collect())
    }

    #[instrument(skip(self), fields(target = %target))]
    fn delete(&self, target: &RemoteRef) -> Result<()> {
        let request = ActionRequest {
            method: Method::Delete,
            ..ActionRequest::default()
        };
        self.send(target.href(), &request)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let t = HttpTransport::new(
            "http://smc:8082/6.10/",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        assert_eq!(t.root(), "http://smc:8082/6.10");
        assert_eq!(t.url("elements/report_design"), "http://smc:8082/6.10/elements/report_design");
        assert_eq!(t.url("/login"), "http://smc:8082/6.10/login");
        assert_eq!(
            t.url("https://other:8082/6.10/elements/report_file/1"),
            "https://other:8082/6.10/elements/report_file/1"
        );
    }

    #[test]
    fn test_body_within_limit() {
        let response = ureq::Response::new(200, "OK", "abcd").unwrap();
        let raw = read_limited(response, 4).unwrap();
        assert_eq!(raw.status, 200);
        assert_eq!(raw.body, b"abcd");
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let response = ureq::Response::new(200, "OK", "abcde").unwrap();
        match read_limited(response, 4) {
            Err(SdkError::UnexpectedResponse(msg)) => assert!(msg.contains("exceeds 4 bytes")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
