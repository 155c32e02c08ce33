// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Starting asynchronous operations and following their task documents.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::element::RemoteRef;
use crate::error::{Result, SdkError};
use crate::operation::{OperationHandle, PollResult, TaskStatus};
use crate::poller::{OperationPoller, StatusProbe};
use crate::transport::{ActionRequest, Method, Transport};

/// Filters and options for report generation.
///
/// Each time filter is a pair that is sent only when both halves are set
/// (zero counts as unset). Both styles may be combined; the server decides
/// which one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Start of the legacy time range, epoch milliseconds.
    pub start_time: Option<i64>,
    /// End of the legacy time range, epoch milliseconds.
    pub end_time: Option<i64>,
    /// End of the reporting period, epoch milliseconds.
    pub launch_time: Option<i64>,
    /// Length of the reporting period in seconds.
    pub overriding_duration: Option<i64>,
    /// Read log data from elasticsearch storage. Only sent with the
    /// `launch_time`/`overriding_duration` pair.
    pub use_elasticsearch: bool,
    /// Restrict the report to these log senders.
    pub senders: Vec<RemoteRef>,
    /// Extra query parameters the SDK does not model.
    pub extra_params: BTreeMap<String, String>,
    /// Extra JSON body fields the SDK does not model.
    pub extra_body: Map<String, Value>,
}

fn present(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_range(mut self, start_ms: i64, end_ms: i64) -> Self {
        self.start_time = Some(start_ms);
        self.end_time = Some(end_ms);
        self
    }

    pub fn with_period(mut self, launch_time_ms: i64, duration_secs: i64) -> Self {
        self.launch_time = Some(launch_time_ms);
        self.overriding_duration = Some(duration_secs);
        self
    }

    pub fn with_elasticsearch(mut self, enabled: bool) -> Self {
        self.use_elasticsearch = enabled;
        self
    }

    pub fn with_sender(mut self, sender: RemoteRef) -> Self {
        self.senders.push(sender);
        self
    }

    pub fn with_extra_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_params.insert(key.into(), value.into());
        self
    }

    /// Build the `generate` action request.
    pub fn to_request(&self) -> ActionRequest {
        let mut request = ActionRequest::post();
        request.params = self.extra_params.clone();

        if let (Some(start), Some(end)) = (present(self.start_time), present(self.end_time)) {
            request.params.insert("start_time".into(), start.to_string());
            request.params.insert("end_time".into(), end.to_string());
        }
        if let (Some(launch), Some(duration)) =
            (present(self.launch_time), present(self.overriding_duration))
        {
            request.params.insert("launch_time".into(), launch.to_string());
            request
                .params
                .insert("overriding_duration".into(), duration.to_string());
            request
                .params
                .insert("use_elasticsearch".into(), self.use_elasticsearch.to_string());
        }

        let mut body = self.extra_body.clone();
        if !self.senders.is_empty() {
            let hrefs = self
                .senders
                .iter()
                .map(|s| Value::String(s.href().to_string()))
                .collect();
            body.insert("senders".into(), Value::Array(hrefs));
        }
        if !body.is_empty() {
            request.body = Some(Value::Object(body));
        }
        request
    }
}

/// Start `action` on `target` and return a handle for the resulting task.
///
/// Requests are always sent as `POST`. A rejection by the server becomes
/// [`SdkError::SubmissionFailed`]; connection problems pass through
/// unchanged.
#[instrument(skip(transport, request), fields(target = %target))]
pub fn submit<T: Transport + ?Sized>(
    transport: &T,
    target: &RemoteRef,
    action: &str,
    request: &ActionRequest,
) -> Result<OperationHandle> {
    let request = ActionRequest {
        method: Method::Post,
        ..request.clone()
    };

    let response = transport
        .invoke(target, action, &request)
        .map_err(|e| match e {
            SdkError::Server { status, message } => SdkError::SubmissionFailed {
                operation: action.to_string(),
                target: target.to_string(),
                reason: format!("{} (http {})", message, status),
            },
            other => other,
        })?;

    let task = TaskStatus::parse(&response.json()?)?;
    let follower = task.follower.clone().ok_or_else(|| {
        SdkError::UnexpectedResponse(format!("{} on {} returned no follower", action, target))
    })?;

    info!(action = %action, job_id = %follower, "Operation submitted");
    Ok(OperationHandle::new(target.clone(), action, follower).with_initial(task.to_poll_result()))
}

/// Status probe that follows a task document.
#[derive(Debug, Clone)]
pub struct TaskProbe<T> {
    transport: T,
}

impl<T: Transport> TaskProbe<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: Transport> StatusProbe for TaskProbe<T> {
    fn probe(&self, handle: &OperationHandle) -> Result<PollResult> {
        let doc = self.transport.read(&handle.job_id)?;
        let task = TaskStatus::parse(&doc)?;
        debug!(
            job_id = %handle.job_id,
            progress = ?task.progress,
            message = ?task.last_message,
            "Task status"
        );
        Ok(task.to_poll_result())
    }
}

/// Poller for operations tracked through a task document.
pub type TaskPoller<T> = OperationPoller<TaskProbe<T>>;

/// Wrap `handle` in a [`TaskPoller`] using `transport` for status checks.
pub fn task_poller<T: Transport>(transport: T, handle: OperationHandle) -> TaskPoller<T> {
    OperationPoller::new(TaskProbe::new(transport), handle)
}
