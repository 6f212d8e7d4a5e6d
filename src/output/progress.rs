use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt::Display;

use super::styling::{bright_yellow, dim};

/// Progress bar for one stage run; hidden when stderr is not a terminal.
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    pub fn start(stage: &str, total: usize) -> Self {
        let pb = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        pb.set_style(bar_style());
        pb.set_prefix(bright_yellow(stage).to_string());
        Self { pb }
    }

    pub fn set_item(&self, item: &impl Display) {
        self.pb.set_message(dim(item).to_string());
    }

    pub fn inc(&self) {
        self.pb.inc(1);
    }

    pub fn start_retry(&self, total: usize) {
        self.pb.set_prefix(bright_yellow("Retry").to_string());
        self.pb.set_length(total as u64);
        self.pb.set_position(0);
    }

    pub fn finish(self) {
        self.pb.finish_and_clear();
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("  {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}
