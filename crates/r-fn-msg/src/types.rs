//! ---
//! rfn_section: "02-payload-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Wire data model and payload codecs."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

/// Message headers. Keys are unique and values are plain strings.
pub type Headers = BTreeMap<String, String>;

/// Batch-scoped parameters supplied by the host, shared by every message.
pub type Inputs = BTreeMap<String, String>;

/// A single message as carried on the wire.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message headers.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub headers: Headers,
    /// Base64 text encoding of the message body.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub payload: String,
}

impl Message {
    /// Construct a message from headers and an already base64-encoded payload.
    pub fn new(headers: Headers, payload: impl Into<String>) -> Self {
        Self {
            headers,
            payload: payload.into(),
        }
    }
}

/// A message that could not be transformed, echoed back in its original form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedMessage {
    /// Original message headers.
    pub headers: Headers,
    /// Original base64 payload, never the attempted transformation.
    pub payload: String,
    /// Description of the failure.
    pub error: String,
}

impl FailedMessage {
    /// Wrap the original message together with the failure description.
    pub fn from_message(message: Message, error: impl Into<String>) -> Self {
        Self {
            headers: message.headers,
            payload: message.payload,
            error: error.into(),
        }
    }
}

/// Batch delivered to a single invocation.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Batch-scoped inputs.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub inputs: Inputs,
    /// Messages in delivery order.
    #[serde_as(as = "DefaultOnNull")]
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Event {
    /// Construct a batch from inputs and messages.
    pub fn new(inputs: Inputs, messages: Vec<Message>) -> Self {
        Self { inputs, messages }
    }
}

/// Fate of a single message after the pipeline ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Transformed message to forward.
    Succeeded(Message),
    /// Message routed to the failure list.
    Failed(FailedMessage),
    /// Message intentionally dropped by the handler.
    Filtered,
}

impl MessageOutcome {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            MessageOutcome::Succeeded(_) => "succeeded",
            MessageOutcome::Failed(_) => "failed",
            MessageOutcome::Filtered => "filtered",
        }
    }
}

/// Partitioned result of a batch, returned to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Successfully transformed messages, in input order.
    pub messages: Vec<Message>,
    /// Failed messages with error detail, in input order.
    pub failed_messages: Vec<FailedMessage>,
}

impl Output {
    /// Append an outcome to the matching list. Filtered outcomes are dropped.
    pub fn push_outcome(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Succeeded(message) => self.messages.push(message),
            MessageOutcome::Failed(failed) => self.failed_messages.push(failed),
            MessageOutcome::Filtered => {}
        }
    }

    /// Number of messages carried in either list.
    pub fn len(&self) -> usize {
        self.messages.len() + self.failed_messages.len()
    }

    /// Returns true when neither list holds a message.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-batch accounting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Messages present in the incoming batch.
    pub received: usize,
    /// Messages forwarded after transformation.
    pub succeeded: usize,
    /// Messages routed to the failure list.
    pub failed: usize,
    /// Messages dropped by the handler.
    pub filtered: usize,
}

impl BatchSummary {
    /// Count an outcome.
    pub fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Succeeded(_) => self.succeeded += 1,
            MessageOutcome::Failed(_) => self.failed += 1,
            MessageOutcome::Filtered => self.filtered += 1,
        }
    }

    /// True when every received message has been accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.received == self.succeeded + self.failed + self.filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tolerates_null_collections() {
        let raw = r#"{"inputs":null,"messages":[{"headers":null,"payload":"aGk="}]}"#;
        let event: Event = serde_json::from_str(raw).expect("parse event");
        assert!(event.inputs.is_empty());
        assert_eq!(event.messages.len(), 1);
        assert!(event.messages[0].headers.is_empty());
        assert_eq!(event.messages[0].payload, "aGk=");

        let event: Event = serde_json::from_str(r#"{"messages":null}"#).expect("parse event");
        assert!(event.messages.is_empty());
    }

    #[test]
    fn empty_output_serializes_lists_not_null() {
        let json = serde_json::to_value(Output::default()).expect("serialize output");
        assert_eq!(
            json,
            serde_json::json!({"messages": [], "failed_messages": []})
        );
    }

    #[test]
    fn failed_message_keeps_original_wire_form() {
        let mut headers = Headers::new();
        headers.insert("trace".into(), "abc".into());
        let original = Message::new(headers.clone(), "%%%");
        let failed = FailedMessage::from_message(original, "boom");
        assert_eq!(failed.headers, headers);
        assert_eq!(failed.payload, "%%%");
        assert_eq!(failed.error, "boom");
    }

    #[test]
    fn outcomes_partition_output_and_summary() {
        let mut output = Output::default();
        let mut summary = BatchSummary {
            received: 3,
            ..BatchSummary::default()
        };
        let outcomes = vec![
            MessageOutcome::Succeeded(Message::new(Headers::new(), "YQ==")),
            MessageOutcome::Filtered,
            MessageOutcome::Failed(FailedMessage::from_message(Message::default(), "x")),
        ];
        for outcome in outcomes {
            summary.record(&outcome);
            output.push_outcome(outcome);
        }
        assert_eq!(output.messages.len(), 1);
        assert_eq!(output.failed_messages.len(), 1);
        assert_eq!(output.len(), 2);
        assert!(summary.is_balanced());
        assert_eq!(summary.filtered, 1);
    }
}
