//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations.

use std::sync::Arc;

use clap::{Parser, Subcommand};

use bsync_core::{ConfigManager, ProfileManager, ProjectNamespace, SyncOrchestrator};
use bsync_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

mod completions;
mod download;
mod ls;
mod profile;
mod restore;
mod status;
mod upload;

/// bsync - versioning-aware project sync for S3-compatible storage
///
/// Mirrors a local project directory to and from the `<project>/` prefix of a
/// bucket. Every run transfers the whole project.
#[derive(Parser, Debug)]
#[command(name = "bsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress bar
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Profile to use instead of the configured default
    #[arg(long, global = true, env = "BSYNC_PROFILE")]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload every file of a local project directory
    Upload(upload::UploadArgs),

    /// Download every object of a project into a local directory
    Download(download::DownloadArgs),

    /// List the objects (and versions) stored for a project
    Ls(ls::LsArgs),

    /// Show the bucket's versioning state
    Status(status::StatusArgs),

    /// Make a previous version of a file current again
    Restore(restore::RestoreArgs),

    /// Manage storage profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let defaults = ConfigManager::new()
        .and_then(|manager| manager.load())
        .map(|config| config.defaults)
        .unwrap_or_default();

    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    }
    .resolve(&defaults);

    if output_config.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    } else if defaults.color == "always" {
        console::set_colors_enabled(true);
        console::set_colors_enabled_stderr(true);
    }

    let profile = cli.profile;
    match cli.command {
        Commands::Upload(args) => upload::execute(args, output_config, profile).await,
        Commands::Download(args) => download::execute(args, output_config, profile).await,
        Commands::Ls(args) => ls::execute(args, output_config, profile).await,
        Commands::Status(args) => status::execute(args, output_config, profile).await,
        Commands::Restore(args) => restore::execute(args, output_config, profile).await,
        Commands::Profile(cmd) => profile::execute(cmd, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

/// Store connection for one command
struct Session {
    profile: String,
    endpoint: String,
    orchestrator: SyncOrchestrator,
}

/// Resolve the profile and connect to its bucket
async fn connect(profile: Option<&str>) -> bsync_core::Result<Session> {
    let profile = ProfileManager::new()?.resolve(profile)?;
    let name = profile.name.clone();
    let endpoint = profile.endpoint.clone();
    let bucket = profile.bucket.clone();

    let client = S3Client::new(profile).await?;
    Ok(Session {
        profile: name,
        endpoint,
        orchestrator: SyncOrchestrator::new(Arc::new(client), bucket),
    })
}

/// Project namespace from an explicit name or the directory's own name
fn project_for(name: Option<&str>, dir: &std::path::Path) -> bsync_core::Result<ProjectNamespace> {
    match name {
        Some(name) => ProjectNamespace::new(name),
        None => ProjectNamespace::from_dir(dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload_with_globals() {
        let cli = Cli::try_parse_from([
            "bsync",
            "--json",
            "--profile",
            "work",
            "upload",
            "./site",
            "--project",
            "blog",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.profile.as_deref(), Some("work"));
        match cli.command {
            Commands::Upload(args) => {
                assert_eq!(args.dir, std::path::PathBuf::from("./site"));
                assert_eq!(args.project.as_deref(), Some("blog"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_restore() {
        let cli = Cli::try_parse_from(["bsync", "restore", "proj", "docs/a.txt", "v42"]).unwrap();
        match cli.command {
            Commands::Restore(args) => {
                assert_eq!(args.project, "proj");
                assert_eq!(args.path, "docs/a.txt");
                assert_eq!(args.version_id, "v42");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_project_for() {
        let dir = std::path::Path::new("/home/me/site");
        assert_eq!(project_for(None, dir).unwrap().name(), "site");
        assert_eq!(project_for(Some("blog"), dir).unwrap().name(), "blog");
        assert!(project_for(Some("a/b"), dir).is_err());
    }
}
