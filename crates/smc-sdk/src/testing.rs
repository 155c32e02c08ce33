// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use serde_json::Value;

use crate::element::{ElementKind, RemoteRef};
use crate::error::{Result, SdkError};
use crate::transport::{ActionRequest, RawResponse, Transport};

/// Canned answer to an action invocation.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Json(Value),
    Bytes(&'static str, Vec<u8>),
    Created(String),
    Status(u16, String),
    Oversized,
    Down,
}

impl Reply {
    fn into_result(self) -> Result<RawResponse> {
        match self {
            Reply::Json(doc) => Ok(RawResponse {
                status: 200,
                content_type: Some("application/json".into()),
                location: None,
                body: serde_json::to_vec(&doc)?,
            }),
            Reply::Bytes(content_type, body) => Ok(RawResponse {
                status: 200,
                content_type: Some(content_type.into()),
                location: None,
                body,
            }),
            Reply::Created(href) => Ok(RawResponse {
                status: 201,
                location: Some(href),
                ..RawResponse::default()
            }),
            Reply::Status(status, message) => Err(SdkError::Server { status, message }),
            Reply::Oversized => Err(SdkError::UnexpectedResponse(
                "response body exceeds 268435456 bytes".into(),
            )),
            Reply::Down => Err(SdkError::Connection("connection refused".into())),
        }
    }
}

/// Scripted server. Queued answers are consumed in order; the last one
/// repeats.
#[derive(Default)]
pub(crate) struct FakeTransport {
    elements: Mutex<Vec<RemoteRef>>,
    docs: Mutex<HashMap<String, VecDeque<Value>>>,
    actions: Mutex<HashMap<(String, String), VecDeque<Reply>>>,
    created: Mutex<Vec<(ElementKind, Value)>>,
    invoked: Mutex<Vec<(String, String, ActionRequest)>>,
    reads: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
}

fn next<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(self, element: RemoteRef) -> Self {
        self.elements.lock().push(element);
        self
    }

    pub fn on_read(&self, href: &str, doc: Value) -> &Self {
        self.docs
            .lock()
            .entry(href.to_string())
            .or_default()
            .push_back(doc);
        self
    }

    pub fn on_action(&self, href: &str, action: &str, reply: Reply) -> &Self {
        self.actions
            .lock()
            .entry((href.to_string(), action.to_string()))
            .or_default()
            .push_back(reply);
        self
    }

    pub fn invocations(&self) -> Vec<(String, String, ActionRequest)> {
        self.invoked.lock().clone()
    }

    pub fn created(&self) -> Vec<(ElementKind, Value)> {
        self.created.lock().clone()
    }

    pub fn reads_of(&self, href: &str) -> usize {
        self.reads.lock().iter().filter(|h| h.as_str() == href).count()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn create(&self, kind: &ElementKind, body: &Value) -> Result<RemoteRef> {
        let mut created = self.created.lock();
        created.push((kind.clone(), body.clone()));
        let href = format!("http://smc/elements/{}/{}", kind, created.len());
        let name = body.get("name").and_then(Value::as_str).map(str::to_string);
        Ok(RemoteRef::new(kind.clone(), href, name))
    }

    fn invoke(
        &self,
        target: &RemoteRef,
        action: &str,
        request: &ActionRequest,
    ) -> Result<RawResponse> {
        self.invoked
            .lock()
            .push((target.href().to_string(), action.to_string(), request.clone()));
        let reply = self
            .actions
            .lock()
            .get_mut(&(target.href().to_string(), action.to_string()))
            .and_then(next);
        match reply {
            Some(reply) => reply.into_result(),
            None => Err(SdkError::ActionNotFound {
                action: action.to_string(),
                target: target.to_string(),
            }),
        }
    }

    fn read(&self, href: &str) -> Result<Value> {
        self.reads.lock().push(href.to_string());
        self.docs
            .lock()
            .get_mut(href)
            .and_then(next)
            .ok_or_else(|| SdkError::Server {
                status: 404,
                message: format!("no such element: {}", href),
            })
    }

    fn lookup(&self, kind: &ElementKind, name: &str) -> Result<RemoteRef> {
        self.elements
            .lock()
            .iter()
            .find(|e| e.kind() == kind && e.name() == Some(name))
            .cloned()
            .ok_or_else(|| SdkError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }

    fn list(&self, kind: &ElementKind) -> Result<Vec<RemoteRef>> {
        Ok(self
            .elements
            .lock()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect())
    }

    fn delete(&self, target: &RemoteRef) -> Result<()> {
        self.deleted.lock().push(target.href().to_string());
        Ok(())
    }
}
