// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Template to exported report, end to end.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::config::SdkConfig;
use crate::element::{Element, ElementKind};
use crate::error::{PipelineStage, Result, SdkError};
use crate::reports::{
    ExportFormat, ExportOutput, ReportArtifact, ReportDesign, ReportFile, ReportTemplate,
};
use crate::submit::GenerateOptions;
use crate::transport::Transport;

/// Export step of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub format: ExportFormat,
    /// Local file to write; content is returned in memory when `None`.
    pub destination: Option<PathBuf>,
}

/// What a pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub design: ReportDesign,
    /// Artifacts produced by the generation, in server order.
    pub artifacts: Vec<ReportArtifact>,
    /// Export of the newest artifact, when requested.
    pub export: Option<ExportOutput>,
}

/// Runs create design, generate, wait, export and cleanup in order.
///
/// Every error is tagged with the [`PipelineStage`] it happened in.
#[derive(Debug, Clone)]
pub struct ReportPipeline {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub export: Option<ExportTarget>,
    /// Delete the created design once the run is over.
    pub cleanup: bool,
}

impl Default for ReportPipeline {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            timeout: None,
            export: None,
            cleanup: false,
        }
    }
}

impl ReportPipeline {
    /// Pipeline using the poll interval and wait timeout of `config`.
    pub fn from_config(config: &SdkConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            timeout: config.wait_timeout,
            ..Self::default()
        }
    }

    pub fn with_export(mut self, format: ExportFormat, destination: Option<PathBuf>) -> Self {
        self.export = Some(ExportTarget {
            format,
            destination,
        });
        self
    }

    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Create a design named `design_name` from `template` and run it.
    #[instrument(skip(self, transport, template, options), fields(template = %template))]
    pub fn run<T: Transport + ?Sized>(
        &self,
        transport: &T,
        template: &ReportTemplate,
        design_name: &str,
        options: &GenerateOptions,
    ) -> Result<PipelineOutput> {
        let design = template
            .create_design(transport, design_name)
            .map_err(|e| e.at_stage(PipelineStage::CreateDesign))?;

        let outcome = self.run_design(transport, &design, options);

        if !self.cleanup {
            return outcome;
        }
        let cleanup = transport
            .delete(design.remote_ref())
            .map_err(|e| e.at_stage(PipelineStage::Cleanup));
        match (outcome, cleanup) {
            (Ok(output), Ok(())) => {
                info!(design = %design, "Report design removed");
                Ok(output)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), cleanup) => {
                if let Err(cleanup) = cleanup {
                    warn!(error = %cleanup, "Cleanup after failed run also failed");
                }
                Err(e)
            }
        }
    }

    /// Generate an existing design, wait for it and export the newest report.
    #[instrument(skip(self, transport, options), fields(design = %design))]
    pub fn run_design<T: Transport + ?Sized>(
        &self,
        transport: &T,
        design: &ReportDesign,
        options: &GenerateOptions,
    ) -> Result<PipelineOutput> {
        let poller = design
            .generate(transport, options)
            .map_err(|e| e.at_stage(PipelineStage::Generate))?;

        let started = Instant::now();
        let result = poller
            .wait(self.poll_interval, self.timeout)
            .map_err(|e| SdkError::from(e).at_stage(PipelineStage::Wait))?;
        let waited_ms = started.elapsed().as_millis() as u64;
        let resources = result
            .into_result("generate", waited_ms)
            .map_err(|e| e.at_stage(PipelineStage::Wait))?;

        let artifacts = resources
            .into_iter()
            .filter(|r| *r.kind() == ElementKind::ReportFile)
            .map(|r| ReportFile::from_ref_unchecked(r).artifact(transport))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.at_stage(PipelineStage::Wait))?;
        info!(count = artifacts.len(), waited_ms, "Report generated");

        let export = match &self.export {
            None => None,
            Some(target) => Some(
                export_newest(transport, &artifacts, target)
                    .map_err(|e| e.at_stage(PipelineStage::Export))?,
            ),
        };

        Ok(PipelineOutput {
            design: design.clone(),
            artifacts,
            export,
        })
    }
}

fn export_newest<T: Transport + ?Sized>(
    transport: &T,
    artifacts: &[ReportArtifact],
    target: &ExportTarget,
) -> Result<ExportOutput> {
    let newest = artifacts
        .iter()
        .max_by_key(|a| a.creation_time)
        .ok_or_else(|| SdkError::ExportFailed {
            target: "generated report".to_string(),
            reason: "generation produced no report file".to_string(),
        })?;
    newest
        .file
        .export(transport, target.format, target.destination.as_deref())
}
