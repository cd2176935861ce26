use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{Context, Result};

pub mod analyze;
pub mod capture;
pub mod send;
pub mod simulate;

/// Block until `limit` runs out or the user presses Ctrl+C. Returns `true`
/// when interrupted. With no limit only Ctrl+C ends the wait.
pub fn wait_for_interrupt(limit: Option<Duration>) -> Result<bool> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("installing Ctrl+C handler")?;
    Ok(wait_on(&rx, limit))
}

fn wait_on(interrupts: &Receiver<()>, limit: Option<Duration>) -> bool {
    match limit {
        Some(limit) => match interrupts.recv_timeout(limit) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        },
        None => interrupts.recv().is_ok(),
    }
}
