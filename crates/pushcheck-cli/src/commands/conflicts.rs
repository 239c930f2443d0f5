//! `pushcheck conflicts` command - Test pickmes for merge conflicts.

use std::path::Path;

use anyhow::{Result, bail};
use pushcheck_core::tags::{CONFLICT_MASTER, CONFLICT_PICKME};
use pushcheck_core::traits::RequestStore;
use pushcheck_core::{Job, PushId, RequestId};

use super::DataFiles;
use super::utils::Services;
use crate::output;

/// Run the conflicts command for one request or a whole push.
pub fn run(config: &Path, files: &DataFiles, id: Option<u64>, push: Option<u64>) -> Result<()> {
    let services = Services::start(config, files)?;

    let push = match (id, push) {
        (Some(id), _) => {
            let id = RequestId(id);
            let request = services.request(id)?;
            output::info(&format!("Testing {}", output::request_line(&request)));
            services.enqueue(Job::TestPickmeConflict {
                request: id,
                no_requeue: false,
            });
            services.store().get_push_for_request(id)?
        }
        (None, Some(push)) => {
            let push = PushId(push);
            if services.store().get_request_ids_in_push(push)?.is_empty() {
                bail!("Push {push} has no requests");
            }
            output::info(&format!("Testing every pickme in push {push}"));
            services.enqueue(Job::TestAllPickmes { push });
            Some(push)
        }
        (None, None) => bail!("Either a request id or --push is required"),
    };

    services.wait_idle();

    let Some(push) = push else {
        output::warn("Request is not part of a push; nothing was tested");
        return Ok(());
    };
    report(&services, push)
}

/// Print where every request in `push` stands.
fn report(services: &Services, push: PushId) -> Result<()> {
    let mut conflicting = 0;
    for id in services.store().get_request_ids_in_push(push)? {
        let request = services.request(id)?;
        if request.tags.contains(CONFLICT_MASTER) || request.tags.contains(CONFLICT_PICKME) {
            conflicting += 1;
        }
        output::detail(&format!(
            "  {}: {}",
            output::request_line(&request),
            output::conflict_label(&request)
        ));
    }

    if conflicting == 0 {
        output::success(&format!("No conflicts in push {push}"));
    } else {
        output::warn(&format!("{conflicting} request(s) in push {push} have conflicts"));
        output::detail(&format!(
            "  Notifications queued in {}",
            services.outbox().path().display()
        ));
    }
    Ok(())
}
