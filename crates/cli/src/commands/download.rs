//! download command - Pull a project from its bucket prefix
//!
//! With versioning enabled on the bucket every stored version is fetched,
//! each pinned by its version id.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;

use super::upload::SyncReport;
use super::{connect, project_for};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, SyncProgress};

/// Download a project into a local directory
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Local project directory (created if missing)
    pub dir: PathBuf,

    /// Project name (defaults to the directory name)
    #[arg(long)]
    pub project: Option<String>,
}

/// Execute the download command
pub async fn execute(
    args: DownloadArgs,
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
    let result = orchestrator.download_project(&project, &args.dir).await;
    progress.finish();

    match result {
        Ok(summary) => {
            if summary.transferred == 0 && summary.skipped == 0 {
                formatter.warning(&format!("No objects found under {}/", project.name()));
            }
            formatter.output(&SyncReport::new(summary));
            ExitCode::Success
        }
        Err(e) => {
            formatter.report(&e);
            ExitCode::from(&e)
        }
    }
}
