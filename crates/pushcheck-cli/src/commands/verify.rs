//! `pushcheck verify` command - Verify a single request's branch.

use std::path::Path;

use anyhow::{Result, bail};
use pushcheck_core::tags::{GIT_ERROR, GIT_OK};
use pushcheck_core::{Job, RequestId};

use super::DataFiles;
use super::utils::Services;
use crate::output;

/// Run the verify command.
pub fn run(config: &Path, files: &DataFiles, id: u64) -> Result<()> {
    let services = Services::start(config, files)?;
    let id = RequestId(id);

    let before = services.request(id)?;
    output::info(&format!("Verifying {}", output::request_line(&before)));

    services.enqueue(Job::VerifyBranch { request: id });
    services.wait_idle();

    let after = services.request(id)?;
    if after.tags.contains(GIT_ERROR) {
        output::detail(&format!(
            "  Notification queued in {}",
            services.outbox().path().display()
        ));
        bail!("Request {id} could not be verified");
    }
    if after.tags.contains(GIT_OK) {
        output::success(&format!("Request {id} verified"));
        output::essential(after.revision.as_str());
    } else {
        output::warn(&format!(
            "Request {id} was skipped ({})",
            output::verify_label(&after)
        ));
    }
    Ok(())
}
