// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request/response boundary to the management server.
//!
//! Everything above this module addresses server state through a
//! [`Transport`]. The production implementation is
//! [`HttpTransport`](crate::HttpTransport); tests substitute in-memory fakes.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::element::{ElementKind, RemoteRef};
use crate::error::Result;

/// HTTP method of an action request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// Request issued against an element action link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionRequest {
    pub method: Method,
    /// Query parameters.
    pub params: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<Value>,
    /// `Accept` header; JSON when `None`.
    pub accept: Option<String>,
}

impl ActionRequest {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post() -> Self {
        Self {
            method: Method::Post,
            ..Self::default()
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }
}

/// Undecoded server answer.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// `Location` header, set when the action created an element.
    pub location: Option<String>,
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Decode the body as JSON. An empty body decodes to `null`.
    pub fn json(&self) -> Result<Value> {
        if self.body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Body as UTF-8 text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Operations the SDK needs from the management server.
///
/// Implementations must be safe to call from several threads at once.
pub trait Transport: Send + Sync {
    /// Create an element of `kind` from `body`.
    fn create(&self, kind: &ElementKind, body: &Value) -> Result<RemoteRef>;

    /// Run the action link named `action` on `target`.
    ///
    /// Non-2xx answers are returned as `SdkError::Server`.
    fn invoke(&self, target: &RemoteRef, action: &str, request: &ActionRequest)
    -> Result<RawResponse>;

    /// Read the JSON document at `href`.
    fn read(&self, href: &str) -> Result<Value>;

    /// Find the element of `kind` named exactly `name`.
    fn lookup(&self, kind: &ElementKind, name: &str) -> Result<RemoteRef>;

    /// List all elements of `kind`.
    fn list(&self, kind: &ElementKind) -> Result<Vec<RemoteRef>>;

    /// Delete `target`.
    fn delete(&self, target: &RemoteRef) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn create(&self, kind: &ElementKind, body: &Value) -> Result<RemoteRef> {
        (**self).create(kind, body)
    }

    fn invoke(
        &self,
        target: &RemoteRef,
        action: &str,
        request: &ActionRequest,
    ) -> Result<RawResponse> {
        (**self).invoke(target, action, request)
    }

    fn read(&self, href: &str) -> Result<Value> {
        (**self).read(href)
    }

    fn lookup(&self, kind: &ElementKind, name: &str) -> Result<RemoteRef> {
        (**self).lookup(kind, name)
    }

    fn list(&self, kind: &ElementKind) -> Result<Vec<RemoteRef>> {
        (**self).list(kind)
    }

    fn delete(&self, target: &RemoteRef) -> Result<()> {
        (**self).delete(target)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn create(&self, kind: &ElementKind, body: &Value) -> Result<RemoteRef> {
        (**self).create(kind, body)
    }

    fn invoke(
        &self,
        target: &RemoteRef,
        action: &str,
        request: &ActionRequest,
    ) -> Result<RawResponse> {
        (**self).invoke(target, action, request)
    }

    fn read(&self, href: &str) -> Result<Value> {
        (**self).read(href)
    }

    fn lookup(&self, kind: &ElementKind, name: &str) -> Result<RemoteRef> {
        (**self).lookup(kind, name)
    }

    fn list(&self, kind: &ElementKind) -> Result<Vec<RemoteRef>> {
        (**self).list(kind)
    }

    fn delete(&self, target: &RemoteRef) -> Result<()> {
        (**self).delete(target)
    }
}

/// Extract a human readable message from an error body.
pub(crate) fn server_message(body: &[u8]) -> String {
    if let Ok(doc) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = doc.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
        if let Some(details) = doc.get("details").and_then(Value::as_array) {
            let joined: Vec<&str> = details.iter().filter_map(Value::as_str).collect();
            if !joined.is_empty() {
                return joined.join("; ");
            }
        }
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        "no message".to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use serde_json::json;

    #[test]
    fn test_action_request_builder() {
        let req = ActionRequest::post()
            .with_param("name", "myreport")
            .with_param("start_time", 1000)
            .with_body(json!({"senders": []}))
            .with_accept("application/pdf");

        assert_eq!(req.method, Method::Post);
        assert_eq!(req.params.get("name").map(String::as_str), Some("myreport"));
        assert_eq!(req.params.get("start_time").map(String::as_str), Some("1000"));
        assert!(req.body.is_some());
        assert_eq!(req.accept.as_deref(), Some("application/pdf"));
        assert_eq!(ActionRequest::get().method.as_str(), "GET");
    }

    #[test]
    fn test_raw_response_json() {
        let empty = RawResponse::default();
        assert_eq!(empty.json().unwrap(), Value::Null);

        let resp = RawResponse {
            status: 200,
            body: br#"{"in_progress": true}"#.to_vec(),
            ..Default::default()
        };
        assert_eq!(resp.json().unwrap()["in_progress"], true);

        let bad = RawResponse {
            status: 200,
            body: b"<html>".to_vec(),
            ..Default::default()
        };
        assert!(matches!(bad.json(), Err(SdkError::Serialization(_))));
    }

    #[test]
    fn test_server_message_extraction() {
        assert_eq!(server_message(br#"{"message": "policy locked"}"#), "policy locked");
        assert_eq!(
            server_message(br#"{"details": ["first", "second"]}"#),
            "first; second"
        );
        assert_eq!(server_message(b"  plain failure \n"), "plain failure");
        assert_eq!(server_message(b""), "no message");
    }
}
