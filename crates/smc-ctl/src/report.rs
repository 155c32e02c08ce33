// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! `report` subcommands.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use smc_sdk::{
    Element, Engine, ExportFormat, ExportOutput, GenerateOptions, PollResult, ReportDesign,
    ReportFile, ReportOperation, ReportOperationOptions, ReportPipeline, ReportTemplate, Session,
};
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// List report templates
    Templates,

    /// List report designs
    Designs,

    /// List reports generated from a design
    Files {
        /// Report design name
        #[arg(long)]
        design: String,
    },

    /// Create a report design from a template
    CreateDesign {
        /// Report template name
        #[arg(long)]
        template: String,
        /// Name of the new design
        #[arg(long)]
        name: String,
    },

    /// Start generating a report
    Generate {
        /// Report design name
        #[arg(long)]
        design: String,
        #[command(flatten)]
        filters: FilterArgs,
        /// Block until the report is generated
        #[arg(long)]
        wait: bool,
        #[command(flatten)]
        polling: PollArgs,
    },

    /// Export a generated report
    Export {
        /// Generated report name
        #[arg(long)]
        file: String,
        /// pdf, txt or html
        #[arg(long, default_value = "pdf")]
        format: ExportFormat,
        /// Destination file; content goes to stdout when omitted
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Create a design from a template, generate it and export the result
    Run {
        /// Report template name
        #[arg(long)]
        template: String,
        /// Name of the design to create
        #[arg(long)]
        design_name: String,
        #[command(flatten)]
        filters: FilterArgs,
        /// Export format of the newest generated report
        #[arg(long)]
        format: Option<ExportFormat>,
        /// Destination file for the export
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Delete the created design afterwards
        #[arg(long)]
        cleanup: bool,
        #[command(flatten)]
        polling: PollArgs,
    },

    /// Schedule a report operation
    Schedule {
        /// Report design name
        #[arg(long)]
        design: String,
        /// Launch time, epoch seconds
        #[arg(long)]
        launch_secs: Option<i64>,
        /// Period duration in seconds
        #[arg(long)]
        duration_secs: Option<i64>,
        #[arg(long)]
        per_sender: bool,
        #[arg(long)]
        elasticsearch: bool,
        #[arg(long)]
        pdf: bool,
        #[arg(long)]
        txt: bool,
        #[arg(long)]
        html: bool,
        /// Keep generated reports on the server
        #[arg(long)]
        stored: bool,
        /// Mail the reports to this address
        #[arg(long)]
        email: Option<String>,
    },
}

/// Report time filters and senders.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Legacy range start, epoch milliseconds (needs --end-ms)
    #[arg(long)]
    start_ms: Option<i64>,
    /// Legacy range end, epoch milliseconds (needs --start-ms)
    #[arg(long)]
    end_ms: Option<i64>,
    /// End of the reporting period, epoch milliseconds (needs --duration-secs)
    #[arg(long)]
    launch_ms: Option<i64>,
    /// Length of the reporting period in seconds (needs --launch-ms)
    #[arg(long)]
    duration_secs: Option<i64>,
    /// Read log data from elasticsearch
    #[arg(long)]
    elasticsearch: bool,
    /// Engine name to restrict the report to (repeatable)
    #[arg(long = "sender")]
    senders: Vec<String>,
}

impl FilterArgs {
    fn to_options(&self, session: &Session) -> Result<GenerateOptions> {
        let mut options = GenerateOptions {
            start_time: self.start_ms,
            end_time: self.end_ms,
            launch_time: self.launch_ms,
            overriding_duration: self.duration_secs,
            use_elasticsearch: self.elasticsearch,
            ..GenerateOptions::default()
        };
        if self.start_ms.is_some() != self.end_ms.is_some() {
            warn!("--start-ms and --end-ms must be given together; range ignored");
        }
        if self.launch_ms.is_some() != self.duration_secs.is_some() {
            warn!("--launch-ms and --duration-secs must be given together; period ignored");
        }
        for name in &self.senders {
            let engine = Engine::find(session, name)
                .with_context(|| format!("sender {} not found", name))?;
            options.senders.push(engine.remote_ref().clone());
        }
        Ok(options)
    }
}

#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Seconds between status checks
    #[arg(long, default_value_t = 3)]
    poll_secs: u64,
    /// Give up waiting after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl PollArgs {
    fn interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn describe(result: &PollResult) -> String {
    match result {
        PollResult::Pending => "still pending".to_string(),
        PollResult::Succeeded { resources } => {
            let refs: Vec<String> = resources.iter().map(|r| r.to_string()).collect();
            format!("succeeded: {}", refs.join(", "))
        }
        PollResult::Failed { reason, code } => match code {
            Some(code) => format!("failed: {} (code {})", reason, code),
            None => format!("failed: {}", reason),
        },
    }
}

fn print_output(output: ExportOutput) -> Result<()> {
    match output {
        ExportOutput::Written { path, bytes } => {
            println!("Exported {} bytes to {}", bytes, path.display());
        }
        ExportOutput::Content(content) => {
            std::io::stdout()
                .write_all(&content)
                .context("failed to write report to stdout")?;
        }
    }
    Ok(())
}

pub fn handle_command(session: &Session, command: ReportCommand) -> Result<ExitCode> {
    match command {
        ReportCommand::Templates => {
            for template in ReportTemplate::all(session)? {
                println!("{}\t{}", template.name().unwrap_or("-"), template.href());
            }
        }

        ReportCommand::Designs => {
            for design in ReportDesign::all(session)? {
                println!("{}\t{}", design.name().unwrap_or("-"), design.href());
            }
        }

        ReportCommand::Files { design } => {
            let design = ReportDesign::find(session, &design)?;
            for file in design.report_files(session)? {
                let ts = file.timestamps(session)?;
                println!(
                    "{}\tcreated {}\tperiod {} .. {}",
                    file.name().unwrap_or("-"),
                    ts.creation_time.to_rfc3339(),
                    ts.period_begin.to_rfc3339(),
                    ts.period_end.to_rfc3339()
                );
            }
        }

        ReportCommand::CreateDesign { template, name } => {
            let template = ReportTemplate::find(session, &template)?;
            let design = template.create_design(session, &name)?;
            println!("{}", design.href());
        }

        ReportCommand::Generate {
            design,
            filters,
            wait,
            polling,
        } => {
            let design = ReportDesign::find(session, &design)?;
            let poller = design.generate(session, &filters.to_options(session)?)?;
            println!("{}", poller.handle().job_id);
            if !wait {
                return Ok(ExitCode::SUCCESS);
            }

            poller.on_complete(|result| info!(result = %describe(result), "Generation finished"));
            let result = poller.wait(polling.interval(), polling.timeout())?;
            println!("{}", describe(&result));
            if !result.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }

        ReportCommand::Export {
            file,
            format,
            output,
        } => {
            let file = ReportFile::find(session, &file)?;
            print_output(file.export(session, format, output.as_deref())?)?;
        }

        ReportCommand::Run {
            template,
            design_name,
            filters,
            format,
            output,
            cleanup,
            polling,
        } => {
            let template = ReportTemplate::find(session, &template)?;
            let mut pipeline = ReportPipeline::from_config(session.config())
                .with_poll_interval(polling.interval())
                .with_cleanup(cleanup);
            pipeline.timeout = polling.timeout().or(pipeline.timeout);
            if let Some(format) = format {
                pipeline = pipeline.with_export(format, output);
            }

            let result = pipeline.run(
                session,
                &template,
                &design_name,
                &filters.to_options(session)?,
            )?;
            for artifact in &result.artifacts {
                info!(
                    report = %artifact.file,
                    created = %artifact.creation_time.to_rfc3339(),
                    "Report available"
                );
            }
            if let Some(output) = result.export {
                print_output(output)?;
            }
        }

        ReportCommand::Schedule {
            design,
            launch_secs,
            duration_secs,
            per_sender,
            elasticsearch,
            pdf,
            txt,
            html,
            stored,
            email,
        } => {
            let design = ReportDesign::find(session, &design)?;
            let operation = ReportOperation::create(
                session,
                &ReportOperationOptions {
                    launch_time: launch_secs,
                    overriding_duration: duration_secs,
                    report_design: Some(design),
                    report_per_sender: Some(per_sender),
                    use_elasticsearch: elasticsearch,
                    export_in_txt: txt,
                    export_in_pdf: pdf,
                    export_in_html: html,
                    stored,
                    email,
                    name: None,
                },
            )?;
            println!("{}", operation.href());
            let status = operation.status(session)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}
