//! ls command - List a project's objects
//!
//! Shows every stored version when the bucket has versioning enabled,
//! otherwise the live objects only.

use clap::Args;
use comfy_table::{Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;

use bsync_core::{ProjectListing, ProjectNamespace, RemoteObject, to_local_relative_path};

use super::connect;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List a project's remote objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Project name
    pub project: String,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    #[serde(flatten)]
    listing: ProjectListing,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: i64,
    total_size_human: String,
}

impl Summary {
    fn of(objects: &[RemoteObject]) -> Self {
        let total_size_bytes = objects.iter().filter_map(|o| o.size_bytes).sum::<i64>();
        Self {
            total_objects: objects.len(),
            total_size_bytes,
            total_size_human: humansize::format_size(
                total_size_bytes.max(0) as u64,
                humansize::BINARY,
            ),
        }
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, output_config: OutputConfig, profile: Option<String>) -> ExitCode {
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

    let listing = match session.orchestrator.list_project(&project).await {
        Ok(listing) => listing,
        Err(e) => {
            formatter.error(&format!("Failed to list {}/: {e}", project.name()));
            return ExitCode::from(&e);
        }
    };

    let summary = Summary::of(&listing.objects);
    if formatter.is_json() {
        formatter.json(&LsOutput { listing, summary });
        return ExitCode::Success;
    }

    formatter.println(&format!(
        "{} {}",
        formatter.dim("Versioning:"),
        listing.versioning.display_state()
    ));

    if listing.objects.is_empty() {
        formatter.println(&format!("No objects under {}/", project.name()));
    } else if !args.summarize {
        formatter.println(&render_table(&project, &listing.objects).to_string());
    }

    formatter.println(&format!(
        "Total: {} object(s), {}",
        summary.total_objects, summary.total_size_human
    ));
    ExitCode::Success
}

fn render_table(project: &ProjectNamespace, objects: &[RemoteObject]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_header(vec!["Path", "Version", "Last modified", "Size"]);

    for object in objects {
        let path = to_local_relative_path(project.name(), &object.key)
            .unwrap_or_else(|_| object.key.clone());
        let version = object.version_id.clone().unwrap_or_else(|| "-".to_string());
        let modified = object
            .last_modified
            .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let size = object
            .size_bytes
            .map(|s| humansize::format_size(s.max(0) as u64, humansize::BINARY))
            .unwrap_or_default();

        table.add_row(vec![path, version, modified, size]);
    }

    table
}
