//! Output formatting utilities
//!
//! This module provides formatters for CLI output in both human-readable
//! and JSON formats. It also handles progress bars and colored output.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::SyncProgress;

use bsync_core::config::Defaults;

/// Output configuration derived from CLI flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress bar
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}

impl OutputConfig {
    /// Merge command-line flags with the configured defaults
    ///
    /// Flags can only switch a behavior off or to JSON; they never undo a
    /// stricter configured default.
    pub fn resolve(self, defaults: &Defaults) -> Self {
        Self {
            json: self.json || defaults.output == "json",
            no_color: self.no_color || defaults.color == "never",
            no_progress: self.no_progress || !defaults.progress,
            quiet: self.quiet,
        }
    }
}
