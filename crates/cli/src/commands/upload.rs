//! upload command - Push a local project to its bucket prefix
//!
//! Every file under the directory is uploaded, in name order, to
//! `<project>/<relative path>`. The first failure stops the upload.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde::Serialize;

use bsync_core::{SyncDirection, SyncSummary};

use super::{connect, project_for};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, SyncProgress};

/// Upload a local project directory
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local project directory
    pub dir: PathBuf,

    /// Project name (defaults to the directory name)
    #[arg(long)]
    pub project: Option<String>,
}

/// Result of an upload or download, for both output formats
#[derive(Debug, Serialize)]
pub(super) struct SyncReport {
    #[serde(flatten)]
    summary: SyncSummary,
    bytes_human: String,
}

impl SyncReport {
    pub(super) fn new(summary: SyncSummary) -> Self {
        let bytes_human = humansize::format_size(summary.bytes, humansize::BINARY);
        Self {
            summary,
            bytes_human,
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        match s.direction {
            SyncDirection::Upload => write!(
                f,
                "Uploaded {} file(s), {} to {}/",
                s.transferred, self.bytes_human, s.project
            )?,
            SyncDirection::Download => write!(
                f,
                "Downloaded {} object(s), {} from {}/",
                s.transferred, self.bytes_human, s.project
            )?,
        }
        if s.skipped > 0 {
            write!(f, ", {} without content", s.skipped)?;
        }
        if let Some(mode) = s.versioning {
            write!(f, " (versioning: {mode})")?;
        }
        Ok(())
    }
}

/// Execute the upload command
pub async fn execute(
    args: UploadArgs,
    output_config: OutputConfig,
    profile: Option<String>,
) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let project = match project_for(args.project.as_deref(), &args.dir) {
        Ok(p) => p,
        Err(e) => {
            formatter.report(&e);
            return ExitCode::UsageError;
        }
    };

    let session = match connect(profile.as_deref()).await {
        Ok(s) => s,
        Err(e) => {
            formatter.report(&e);
            return ExitCode::from(&e);
        }
    };

    let progress = Arc::new(SyncProgress::new(&output_config));
    let orchestrator = session.orchestrator.with_progress(progress.clone());
    let result = orchestrator.upload_project(&project, &args.dir).await;
    progress.finish();

    match result {
        Ok(summary) => {
            formatter.output(&SyncReport::new(summary));
            ExitCode::Success
        }
        Err(e) => {
            formatter.report(&e);
            ExitCode::from(&e)
        }
    }
}
