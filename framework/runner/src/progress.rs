use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Displays a progress bar while the trials are running to show the user how many are left.
pub(crate) fn start_progress(trials: usize) -> ProgressBar {
    let pb = ProgressBar::new(trials as u64);
    match ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} trials [{elapsed_precise}] {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::warn!("Failed to set progress style: {e}"),
    }
    pb.enable_steady_tick(Duration::from_secs(1));
    pb
}
