use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const SEARCH_TICKS: [&str; 7] = [
    "▹▹▹▹▹", "▸▹▹▹▹", "▹▸▹▹▹", "▹▹▸▹▹", "▹▹▹▸▹", "▹▹▹▹▸", "▪▪▪▪▪",
];

fn ticking(pb: ProgressBar, tick: Duration, style: ProgressStyle) -> ProgressBar {
    pb.set_style(style);
    pb.enable_steady_tick(tick);
    pb
}

/// Spinner shown while the subsystem is queried.
pub fn create_spinner(message: String) -> anyhow::Result<ProgressBar> {
    let style = ProgressStyle::with_template("{spinner:.green} {msg}")?.tick_strings(&SEARCH_TICKS);
    let pb = ticking(ProgressBar::new_spinner(), Duration::from_millis(100), style);

    pb.set_message(message);

    Ok(pb)
}

/// Counts snapshots through the destruction plan.
pub fn create_collection_bar(total: u64) -> anyhow::Result<ProgressBar> {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-");

    Ok(ticking(ProgressBar::new(total), Duration::from_millis(40), style))
}
