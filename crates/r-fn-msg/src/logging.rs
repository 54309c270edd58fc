//! ---
//! rfn_section: "02-payload-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Wire data model and payload codecs."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use tracing::{debug, warn};

use crate::types::MessageOutcome;

/// Emit a structured log entry describing what happened to one message.
pub fn log_outcome(index: usize, outcome: &MessageOutcome) {
    match outcome {
        MessageOutcome::Succeeded(message) => debug!(
            index,
            outcome = outcome.label(),
            headers = message.headers.len(),
            payload_len = message.payload.len(),
            "message transformed"
        ),
        MessageOutcome::Failed(failed) => warn!(
            index,
            outcome = outcome.label(),
            error = %failed.error,
            "message routed to failure list"
        ),
        MessageOutcome::Filtered => debug!(index, outcome = outcome.label(), "message filtered"),
    }
}
