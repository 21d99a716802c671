//! Progress display for sync operations
//!
//! One bar tracks the bytes of the item in flight; finished items are printed
//! above it. In quiet or JSON mode, or with progress disabled, nothing is drawn.

use std::time::Duration;

use bsync_core::{ItemEvent, ItemOutcome, ProgressSink, TransferProgress};
use indicatif::{ProgressBar, ProgressStyle};

use super::OutputConfig;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg:40!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg:40!} {bytes}";

/// Progress sink drawing an indicatif bar
pub struct SyncProgress {
    bar: Option<ProgressBar>,
    /// Print a line per finished item
    list_items: bool,
}

impl SyncProgress {
    pub fn new(config: &OutputConfig) -> Self {
        let hidden = config.quiet || config.json || config.no_progress;
        let bar = (!hidden).then(|| {
            let bar = ProgressBar::new(0);
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        });

        Self {
            bar,
            list_items: !config.quiet && !config.json,
        }
    }

    #[cfg(test)]
    fn is_visible(&self) -> bool {
        self.bar.is_some()
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }

    fn style(template: &str) -> ProgressStyle {
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl ProgressSink for SyncProgress {
    fn on_start(&self, key: &str, bytes_total: Option<u64>) {
        let Some(bar) = &self.bar else {
            return;
        };
        match bytes_total {
            Some(total) => {
                bar.set_style(Self::style(BAR_TEMPLATE));
                bar.set_length(total);
            }
            None => bar.set_style(Self::style(SPINNER_TEMPLATE)),
        }
        bar.set_position(0);
        bar.set_message(key.to_string());
    }

    fn on_progress(&self, progress: &TransferProgress) {
        if let Some(bar) = &self.bar {
            bar.set_position(progress.bytes_loaded);
        }
    }

    fn on_item(&self, event: &ItemEvent) {
        if !self.list_items {
            return;
        }

        let line = match (event.outcome, event.version_id.as_deref()) {
            (ItemOutcome::NoBody, _) => format!("- {} (no content)", event.key),
            (ItemOutcome::Transferred { .. }, Some(version)) => {
                format!("{} {} [{version}]", event.phase, event.key)
            }
            (ItemOutcome::Transferred { .. }, None) => format!("{} {}", event.phase, event.key),
        };

        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}
