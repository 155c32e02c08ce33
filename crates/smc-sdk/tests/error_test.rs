// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error type tests for smc-sdk.

use std::error::Error;

use smc_sdk::{PipelineStage, PollError, SdkError};

#[test]
fn test_config_error_display() {
    let err = SdkError::Config("SMC_API_URL not set".to_string());
    assert!(err.to_string().contains("configuration error"));
    assert!(err.to_string().contains("SMC_API_URL"));
}

#[test]
fn test_server_error_display() {
    let err = SdkError::Server {
        status: 409,
        message: "Element is locked".to_string(),
    };
    let display = err.to_string();
    assert!(display.contains("server error"));
    assert!(display.contains("409"));
    assert!(display.contains("Element is locked"));
}

#[test]
fn test_not_found_display() {
    let err = SdkError::NotFound {
        kind: "report_template".to_string(),
        name: "Firewall Weekly Summary".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "report_template not found: Firewall Weekly Summary"
    );
}

#[test]
fn test_submission_failed_display() {
    let err = SdkError::SubmissionFailed {
        operation: "generate".to_string(),
        target: "report_design(name=Daily)".to_string(),
        reason: "Policy is locked".to_string(),
    };
    let display = err.to_string();
    assert!(display.contains("generate"));
    assert!(display.contains("report_design(name=Daily)"));
    assert!(display.contains("Policy is locked"));
}

#[test]
fn test_operation_failed_display() {
    let with_code = SdkError::OperationFailed {
        operation: "generate".to_string(),
        reason: "No log data".to_string(),
        code: Some(12),
    };
    assert_eq!(with_code.to_string(), "generate failed: No log data (code 12)");

    let without_code = SdkError::OperationFailed {
        operation: "generate".to_string(),
        reason: "No log data".to_string(),
        code: None,
    };
    assert_eq!(without_code.to_string(), "generate failed: No log data");
}

#[test]
fn test_export_failed_display() {
    let err = SdkError::ExportFailed {
        target: "report_file(name=AWS #1)".to_string(),
        reason: "generation in progress".to_string(),
    };
    assert!(err.to_string().contains("export of report_file(name=AWS #1) failed"));
}

#[test]
fn test_timeout_display() {
    let err = SdkError::Timeout {
        operation: "generate".to_string(),
        waited_ms: 5000,
    };
    assert!(err.to_string().contains("still pending"));
    assert!(err.to_string().contains("5000"));
}

#[test]
fn test_poll_error_keeps_source() {
    let err = PollError::new(
        "http://smc/elements/task/1",
        SdkError::Connection("reset by peer".to_string()),
    );
    assert!(err.to_string().contains("http://smc/elements/task/1"));
    assert!(err.source().is_some());

    let wrapped: SdkError = err.into();
    assert!(matches!(wrapped, SdkError::Poll(_)));
    assert!(wrapped.to_string().contains("reset by peer"));
}

#[test]
fn test_stage_wrapping() {
    let err = SdkError::Server {
        status: 403,
        message: "forbidden".to_string(),
    }
    .at_stage(PipelineStage::CreateDesign);

    assert_eq!(err.stage(), Some(PipelineStage::CreateDesign));
    assert!(err.to_string().starts_with("create_design stage failed"));
    assert!(err.source().is_some());

    let plain = SdkError::InvalidInput("x".to_string());
    assert_eq!(plain.stage(), None);
}

#[test]
fn test_stage_names() {
    assert_eq!(PipelineStage::Generate.to_string(), "generate");
    assert_eq!(PipelineStage::Wait.as_str(), "wait");
    assert_eq!(PipelineStage::Export.as_str(), "export");
    assert_eq!(PipelineStage::Cleanup.as_str(), "cleanup");
}

#[test]
fn test_from_serde_error() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: SdkError = json_err.into();
    assert!(matches!(err, SdkError::Serialization(_)));
}

#[test]
fn test_from_io_error() {
    let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let err: SdkError = io_err.into();
    assert!(matches!(err, SdkError::Io(_)));
    assert!(err.to_string().contains("read-only"));
}

#[test]
fn test_error_is_debug() {
    let err = SdkError::ActionNotFound {
        action: "export".to_string(),
        target: "report_file(1)".to_string(),
    };
    let debug = format!("{:?}", err);
    assert!(debug.contains("ActionNotFound"));
}
