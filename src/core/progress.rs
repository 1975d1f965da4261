//! Progress reporting for long-running imports using indicatif.

use indicatif::{ProgressBar, ProgressStyle};

/// Style templates for the progress bars used by the CLI.
pub mod styles {
    use super::*;

    /// Progress bar style for per-commit imports.
    pub fn commit_progress() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:30.green/white}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }
}

/// Progress tracker over a known number of commits.
#[derive(Clone)]
pub struct ProgressTracker {
    bar: ProgressBar,
}

impl ProgressTracker {
    /// Create a visible tracker labelled with `prefix` (usually the project name).
    pub fn new(total: usize, prefix: &str) -> Self {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(styles::commit_progress());
        bar.set_prefix(prefix.to_string());
        Self { bar }
    }

    /// Create a hidden tracker (for non-TTY output and tests).
    pub fn hidden(total: usize) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total as u64);
        Self { bar }
    }

    /// Create a tracker that is visible only when `visible` is true.
    pub fn maybe(visible: bool, total: usize, prefix: &str) -> Self {
        if visible {
            Self::new(total, prefix)
        } else {
            Self::hidden(total)
        }
    }

    /// Advance by one commit, showing its sha.
    pub fn advance(&self, sha: &str) {
        self.bar.set_message(short_sha(sha).to_string());
        self.bar.inc(1);
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish and clear the bar.
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn short_sha(sha: &str) -> &str {
    sha.get(..10).unwrap_or(sha)
}
