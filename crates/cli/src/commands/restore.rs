//! restore command - Make a previous version current again
//!
//! The chosen version is copied over the live object on the server, so the
//! restore itself becomes the newest version.

use clap::Args;
use serde::Serialize;

use bsync_core::ProjectNamespace;

use super::connect;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Restore a file of a project to an earlier version
#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Project name
    pub project: String,

    /// Path of the file inside the project
    pub path: String,

    /// Version to restore (see `bsync ls`)
    pub version_id: String,
}

#[derive(Debug, Serialize)]
struct RestoreOutput {
    status: &'static str,
    key: String,
    version_id: String,
}

/// Execute the restore command
pub async fn execute(
    args: RestoreArgs,
    output_config: OutputConfig,
    profile: Option<String>,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let project = match ProjectNamespace::new(&args.project) {
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

    match session
        .orchestrator
        .restore_version(&project, &args.path, &args.version_id)
        .await
    {
        Ok(key) => {
            if formatter.is_json() {
                formatter.json(&RestoreOutput {
                    status: "success",
                    key,
                    version_id: args.version_id,
                });
            } else {
                formatter.success(&format!("Restored {key} to version {}", args.version_id));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.report(&e);
            ExitCode::from(&e)
        }
    }
}
