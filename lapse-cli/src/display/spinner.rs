use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::progress;

/// Spinner shown on stderr while a single lookup is in flight.
pub struct Spinner {
    progress: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
        {
            progress.set_style(style);
        }
        progress.set_message(message.to_string());
        progress.enable_steady_tick(Duration::from_millis(80));
        progress::set_active_bar(progress.clone());

        Self { progress }
    }

}

impl Drop for Spinner {
    fn drop(&mut self) {
        progress::clear_active_bar();
        self.progress.finish_and_clear();
    }
}
