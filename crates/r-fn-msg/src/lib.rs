//! ---
//! rfn_section: "02-payload-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Wire data model and payload codecs."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! Wire-level types exchanged with the streaming platform's function host.
//!
//! A batch arrives as an [`Event`] whose message payloads are base64 text.
//! The [`codec`] module turns those payloads into raw bytes and back, and
//! [`errors::MessageError`] describes every way a single message can fail.
#![warn(missing_docs)]

pub mod codec;
pub mod errors;
pub mod logging;
pub mod types;

pub use codec::{decode_payload, encode_payload, PayloadValue};
pub use errors::MessageError;
pub use logging::log_outcome;
pub use types::{
    BatchSummary, Event, FailedMessage, Headers, Inputs, Message, MessageOutcome, Output,
};
