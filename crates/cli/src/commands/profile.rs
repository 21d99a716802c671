//! Profile management commands
//!
//! A profile names one S3-compatible endpoint, the bucket projects are synced
//! into, and the credentials used to reach it.

use clap::Subcommand;
use serde::Serialize;

use bsync_core::{Profile, ProfileManager};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile
    Set(SetArgs),

    /// List configured profiles
    List(ListArgs),

    /// Remove a profile
    Remove(RemoveArgs),
}

/// Arguments for `profile set`
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g., "local", "work")
    pub name: String,

    /// S3 endpoint URL (e.g., "http://localhost:9000")
    pub endpoint: String,

    /// Bucket that holds the project prefixes
    pub bucket: String,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Region used for request signing
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Bucket lookup style: auto, path, or dns
    #[arg(long, default_value = "auto")]
    pub bucket_lookup: String,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

/// Arguments for `profile list`
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show region and lookup style as well
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for `profile remove`
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the profile to remove
    pub name: String,
}

#[derive(Serialize)]
struct ProfileListOutput {
    default: Option<String>,
    profiles: Vec<ProfileInfo>,
}

/// Profile without its credentials
#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    endpoint: String,
    bucket: String,
    region: String,
    bucket_lookup: String,
}

impl From<&Profile> for ProfileInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            endpoint: profile.endpoint.clone(),
            bucket: profile.bucket.clone(),
            region: profile.region.clone(),
            bucket_lookup: profile.bucket_lookup.clone(),
        }
    }
}

#[derive(Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
    message: String,
}

/// Execute a profile subcommand
pub async fn execute(cmd: ProfileCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let manager = match ProfileManager::new() {
        Ok(m) => m,
        Err(e) => {
            formatter.report(&e);
            return ExitCode::GeneralError;
        }
    };

    let result = match cmd {
        ProfileCommands::Set(args) => execute_set(args, &manager, &formatter),
        ProfileCommands::List(args) => execute_list(args, &manager, &formatter),
        ProfileCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    };

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            formatter.report(&e);
            ExitCode::from(&e)
        }
    }
}

fn execute_set(
    args: SetArgs,
    manager: &ProfileManager,
    formatter: &Formatter,
) -> bsync_core::Result<()> {
    let name = args.name.clone();
    let mut profile = Profile::new(
        args.name,
        args.endpoint,
        args.bucket,
        args.access_key,
        args.secret_key,
    );
    profile.region = args.region;
    profile.bucket_lookup = args.bucket_lookup;

    manager.set(profile, args.default)?;
    report_operation(formatter, &name, format!("Profile '{name}' configured"));
    Ok(())
}

fn execute_list(
    args: ListArgs,
    manager: &ProfileManager,
    formatter: &Formatter,
) -> bsync_core::Result<()> {
    let profiles = manager.list()?;
    let default = manager.default_name()?;

    if formatter.is_json() {
        formatter.json(&ProfileListOutput {
            default,
            profiles: profiles.iter().map(ProfileInfo::from).collect(),
        });
        return Ok(());
    }

    if profiles.is_empty() {
        formatter.println("No profiles configured.");
        return Ok(());
    }

    for profile in &profiles {
        let marker = if default.as_deref() == Some(profile.name.as_str()) {
            "*"
        } else {
            " "
        };
        let line = if args.long {
            format!(
                "{marker} {:<12} {} {} (region: {}, lookup: {})",
                profile.name, profile.endpoint, profile.bucket, profile.region, profile.bucket_lookup
            )
        } else {
            format!(
                "{marker} {:<12} {} {}",
                profile.name, profile.endpoint, profile.bucket
            )
        };
        formatter.println(&line);
    }
    Ok(())
}

fn execute_remove(
    args: RemoveArgs,
    manager: &ProfileManager,
    formatter: &Formatter,
) -> bsync_core::Result<()> {
    manager.remove(&args.name)?;
    report_operation(
        formatter,
        &args.name,
        format!("Profile '{}' removed", args.name),
    );
    Ok(())
}

fn report_operation(formatter: &Formatter, profile: &str, message: String) {
    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: profile.to_string(),
            message,
        });
    } else {
        formatter.success(&message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_set_args_defaults() {
        let cli = Cli::try_parse_from([
            "bsync",
            "profile",
            "set",
            "local",
            "http://localhost:9000",
            "projects",
            "key",
            "secret",
        ])
        .unwrap();

        match cli.command {
            Commands::Profile(ProfileCommands::Set(args)) => {
                assert_eq!(args.bucket, "projects");
                assert_eq!(args.region, "us-east-1");
                assert_eq!(args.bucket_lookup, "auto");
                assert!(!args.default);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_profile_info_hides_credentials() {
        let profile = Profile::new("local", "http://localhost:9000", "projects", "key", "secret");
        let json = serde_json::to_value(ProfileInfo::from(&profile)).unwrap();

        assert_eq!(json["name"], "local");
        assert_eq!(json["bucket"], "projects");
        assert!(json.get("access_key").is_none());
        assert!(json.get("secret_key").is_none());
    }
}
