use anyhow::{Context, Result};
use tracing::{info, warn};

use drone_probe::analysis::{analyze, correlate, load_marks};
use drone_probe::capture::CaptureLog;

use crate::cli::AnalyzeOpts;

pub fn run(opts: AnalyzeOpts) -> Result<()> {
    let log = CaptureLog::load(&opts.archive)
        .with_context(|| format!("loading {}", opts.archive.display()))?;
    info!(packets = log.packets.len(), archive = %opts.archive.display(), "archive loaded");
    print!("{}", log.summary(opts.top));

    let Some(marks_path) = &opts.marks else {
        info!("no --marks given, skipping per-command byte analysis");
        return Ok(());
    };
    let marks = load_marks(marks_path)
        .with_context(|| format!("loading marks {}", marks_path.display()))?;
    let samples = correlate(&log.packets, &marks);
    if samples.is_empty() {
        warn!(marks = marks.len(), "no packet fell inside any mark window");
    }
    println!();
    print!("{}", analyze(&samples));
    Ok(())
}
