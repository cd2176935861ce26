use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info};

use drone_probe::Error;
use drone_probe::capture::{CaptureConfig, CaptureSession, fallback_hint};

use crate::cli::CaptureOpts;
use crate::cmd::wait_for_interrupt;

pub fn run(opts: CaptureOpts) -> Result<()> {
    let config = CaptureConfig {
        interface: opts.interface.clone(),
        host: opts.host,
        output: Some(opts.output.clone()),
        ..CaptureConfig::default()
    };

    let session = match CaptureSession::start(config) {
        Ok(s) => s,
        Err(e @ Error::Permission { .. }) => {
            error!("{e}");
            error!("{}", fallback_hint(&opts.interface));
            return Err(e.into());
        }
        Err(e) => return Err(e).with_context(|| format!("starting capture on {}", opts.interface)),
    };
    info!(
        interface = %opts.interface,
        duration_s = opts.duration,
        output = %opts.output.display(),
        "capturing; trigger actions in the phone app now, Ctrl+C stops early"
    );

    // Stop and save even if installing the handler fails.
    let waited = wait_for_interrupt(Some(Duration::from_secs(opts.duration)));
    let stopped = session.stop().context("stopping capture")?;
    match waited {
        Ok(true) => info!("capture interrupted"),
        Ok(false) => {}
        Err(e) => error!("{e:#}"),
    }

    print!("{}", stopped.log.summary(opts.top));
    if let Some(e) = stopped.save_error {
        return Err(Error::from(e)).context("capture summarized but not saved");
    }
    Ok(())
}
