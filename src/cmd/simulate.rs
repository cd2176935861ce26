use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use drone_probe::Simulator;

use crate::cli::SimOpts;
use crate::cmd::wait_for_interrupt;

pub fn run(opts: SimOpts) -> Result<()> {
    let mut sim = Simulator::start(opts.bind)
        .with_context(|| format!("binding simulator on {}", opts.bind))?;
    info!("press Ctrl+C to stop the simulator");
    if wait_for_interrupt(opts.duration.map(Duration::from_secs))? {
        info!("interrupted");
    }
    sim.stop();
    info!(status = ?sim.status(), "final state");
    Ok(())
}
