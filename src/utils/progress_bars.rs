use indicatif::{ProgressBar, ProgressStyle};

/// Thin wrapper over an indicatif bar so the engine can report progress
/// without knowing anything about terminal rendering.
pub struct ProgressTracker {
    pub progress_bar: ProgressBar,
}

impl ProgressTracker {
    /// Creates a new ProgressTracker with a standardized style
    ///
    /// # Arguments
    /// * `total` - The total number of items to process
    /// * `description` - Optional description of what's being processed
    pub fn new(total: u64, description: Option<&str>) -> Self {
        let progress_bar = ProgressBar::new(total);
        let message = description.unwrap_or("");

        let template = "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}";

        progress_bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap()
                .progress_chars("##-"),
        );

        progress_bar.set_message(message.to_string());

        // Enable steady tick for smoother updates
        progress_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self { progress_bar }
    }

    /// A tracker that renders nothing; used by tests.
    pub fn hidden() -> Self {
        Self {
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// Finish with a completion message
    pub fn finish_with_message(&self, msg: &str) {
        self.progress_bar.finish_with_message(msg.to_string());
    }

    /// Set tracker step position
    pub fn set_position(&self, position: u64) {
        self.progress_bar.set_position(position);
    }

    /// Increments the progress counter by N steps
    pub fn inc(&self, steps: u64) {
        self.progress_bar.inc(steps);
    }

    /// Updates the message displayed alongside the progress bar
    pub fn update_message(&self, msg: &str) {
        self.progress_bar.set_message(msg.to_string());
    }
}
