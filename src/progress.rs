//! Progress bar utilities for replay runs
//!
//! Visual feedback while loading history and stepping through an episode,
//! using the indicatif crate.

use crate::simulation::FillRecord;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar over the steps of one replay episode
pub struct ReplayProgress {
    pub progress: ProgressBar,
    pub total_steps: u64,
    internal_fills: u64,
    external_fills: u64,
}

impl ReplayProgress {
    /// Create a new episode progress bar
    pub fn new(total_steps: u64) -> Self {
        let progress = ProgressBar::new(total_steps);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})\n{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        Self {
            progress,
            total_steps,
            internal_fills: 0,
            external_fills: 0,
        }
    }

    /// Hidden bar for quiet runs and tests
    pub fn hidden(total_steps: u64) -> Self {
        Self {
            progress: ProgressBar::hidden(),
            total_steps,
            internal_fills: 0,
            external_fills: 0,
        }
    }

    /// Advance one step and fold in the fills it produced
    pub fn record_step(&mut self, fills: &FillRecord, best_buy: &str, best_sell: &str) {
        self.internal_fills += fills.internal.len() as u64;
        self.external_fills += fills.external.len() as u64;
        self.progress.inc(1);
        self.progress.set_message(format!(
            "📊 Best {} / {} | fills: {} internal, {} external",
            best_buy, best_sell, self.internal_fills, self.external_fills
        ));
    }

    pub fn fill_counts(&self) -> (u64, u64) {
        (self.internal_fills, self.external_fills)
    }

    /// Mark the episode as complete
    pub fn finish(&self) {
        self.progress.finish_with_message(format!(
            "✅ Replay complete! {} steps, {} internal / {} external fills",
            self.progress.position(),
            self.internal_fills,
            self.external_fills
        ));
    }

    /// Mark the episode as failed
    pub fn finish_with_error(&self, error: &str) {
        self.progress.abandon_with_message(format!("❌ Failed: {}", error));
    }
}

/// Spinner for quick operations
pub struct Spinner {
    pub spinner: ProgressBar,
}

impl Spinner {
    /// Create a new spinner
    pub fn new(message: &str) -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message(message.to_string());

        Self { spinner }
    }

    pub fn update(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    /// Finish spinner with success
    pub fn finish(&self, message: &str) {
        self.spinner.finish_with_message(format!("✅ {}", message));
    }

    /// Finish spinner with error
    pub fn finish_with_error(&self, message: &str) {
        self.spinner.finish_with_message(format!("❌ {}", message));
    }
}
