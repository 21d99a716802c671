//! status command - Show the bucket's versioning state

use std::fmt;

use clap::Args;
use serde::Serialize;

use bsync_core::VersioningMode;

use super::connect;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show the versioning state of the profile's bucket
#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Debug, Serialize)]
struct StatusOutput {
    profile: String,
    endpoint: String,
    bucket: String,
    versioning: &'static str,
    mode: VersioningMode,
}

impl fmt::Display for StatusOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Profile:    {}", self.profile)?;
        writeln!(f, "Endpoint:   {}", self.endpoint)?;
        writeln!(f, "Bucket:     {}", self.bucket)?;
        write!(f, "Versioning: {}", self.versioning)
    }
}

/// Execute the status command
///
/// An undeterminable versioning state is reported as UNKNOWN, not as a failure.
pub async fn execute(
    _args: StatusArgs,
    output_config: OutputConfig,
    profile: Option<String>,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let session = match connect(profile.as_deref()).await {
        Ok(s) => s,
        Err(e) => {
            formatter.report(&e);
            return ExitCode::from(&e);
        }
    };

    let mode = session.orchestrator.versioning_state().await;
    formatter.output(&StatusOutput {
        profile: session.profile,
        endpoint: session.endpoint,
        bucket: session.orchestrator.bucket().to_string(),
        versioning: mode.display_state(),
        mode,
    });
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_output() {
        let output = StatusOutput {
            profile: "work".to_string(),
            endpoint: "http://localhost:9000".to_string(),
            bucket: "projects".to_string(),
            versioning: VersioningMode::Suspended.display_state(),
            mode: VersioningMode::Suspended,
        };

        assert!(output.to_string().ends_with("Versioning: SUSPENDED"));

        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["versioning"], "SUSPENDED");
        assert_eq!(json["mode"], "suspended");
    }
}
