//! `pushcheck run` command - Feed jobs from stdin to the queue.

use std::io::{self, BufRead};
use std::path::Path;

use anyhow::{Context, Result};
use pushcheck_core::Job;
use tracing::warn;

use super::DataFiles;
use super::utils::Services;
use crate::output;

/// Run the worker over every job read from stdin.
pub fn run(config: &Path, files: &DataFiles) -> Result<()> {
    let services = Services::start(config, files)?;

    let stdin = io::stdin();
    let (accepted, rejected) = feed(stdin.lock(), |job| services.enqueue(job))?;

    output::info(&format!("Read {accepted} job(s); waiting for the queue to drain..."));
    services.wait_idle();

    if rejected > 0 {
        output::warn(&format!("Skipped {rejected} malformed line(s)"));
    }
    output::success(&format!("Processed {accepted} job(s)"));
    Ok(())
}

/// Parse one job per line and hand each to `enqueue`. Blank lines are
/// ignored; malformed lines are logged and counted.
fn feed(input: impl BufRead, mut enqueue: impl FnMut(Job)) -> Result<(usize, usize)> {
    let mut accepted = 0;
    let mut rejected = 0;

    for (index, line) in input.lines().enumerate() {
        let line = line.context("Failed to read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Job>(line) {
            Ok(job) => {
                enqueue(job);
                accepted += 1;
            }
            Err(e) => {
                warn!(line = index + 1, error = %e, "ignoring malformed job");
                rejected += 1;
            }
        }
    }
    Ok((accepted, rejected))
}
