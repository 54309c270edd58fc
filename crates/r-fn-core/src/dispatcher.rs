//! ---
//! rfn_section: "03-function-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Handler contract, option resolution, and batch dispatch."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! Batch orchestration.
//!
//! Messages are processed strictly in input order. Each message is decoded,
//! optionally bound to the schema, handed to the handler, and re-encoded.
//! A failure at any step lands that message, in its original wire form, in
//! the failure list and processing moves on to the next message.

use std::time::Instant;

use r_fn_msg::{
    decode_payload, encode_payload, log_outcome, BatchSummary, Event, FailedMessage, Inputs,
    Message, MessageError, MessageOutcome, Output,
};
use tracing::{info, info_span};

use crate::metrics::DispatchMetrics;
use crate::options::FunctionConfig;

/// Process one batch with the given configuration.
pub fn process_batch(config: &FunctionConfig, event: Event) -> Output {
    BatchDispatcher::new(config.clone()).dispatch(event)
}

/// Runs batches through a function configuration.
#[derive(Clone)]
pub struct BatchDispatcher {
    config: FunctionConfig,
    metrics: Option<DispatchMetrics>,
}

impl BatchDispatcher {
    /// Create a dispatcher without metrics.
    pub fn new(config: FunctionConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    /// Record outcomes into the supplied metrics.
    pub fn with_metrics(mut self, metrics: DispatchMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Configuration this dispatcher runs.
    pub fn config(&self) -> &FunctionConfig {
        &self.config
    }

    /// Process a batch and return the partitioned output.
    pub fn dispatch(&self, event: Event) -> Output {
        self.dispatch_with_summary(event).0
    }

    /// Process a batch and also return its accounting.
    pub fn dispatch_with_summary(&self, event: Event) -> (Output, BatchSummary) {
        let started = Instant::now();
        let span = info_span!(
            "batch",
            size = event.messages.len(),
            inputs = event.inputs.len()
        );
        let _entered = span.enter();

        let Event { inputs, messages } = event;
        let mut output = Output::default();
        let mut summary = BatchSummary {
            received: messages.len(),
            ..BatchSummary::default()
        };

        for (index, message) in messages.into_iter().enumerate() {
            let outcome = self.process_message(message, &inputs);
            log_outcome(index, &outcome);
            summary.record(&outcome);
            output.push_outcome(outcome);
        }
        debug_assert!(summary.is_balanced());

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.observe_batch(&summary, elapsed);
        }
        info!(
            received = summary.received,
            succeeded = summary.succeeded,
            failed = summary.failed,
            filtered = summary.filtered,
            elapsed_ms = elapsed.as_millis() as u64,
            "batch processed"
        );
        (output, summary)
    }

    /// Decide the fate of a single message.
    pub fn process_message(&self, message: Message, inputs: &Inputs) -> MessageOutcome {
        match self.transform(&message, inputs) {
            Ok(Some(transformed)) => MessageOutcome::Succeeded(transformed),
            Ok(None) => MessageOutcome::Filtered,
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.observe_error(&err);
                }
                MessageOutcome::Failed(FailedMessage::from_message(message, err.to_string()))
            }
        }
    }

    fn transform(&self, message: &Message, inputs: &Inputs) -> Result<Option<Message>, MessageError> {
        let payload = decode_payload(&message.payload)?;
        let output = self.config.invoke(payload, &message.headers, inputs)?;
        let Some((payload, headers)) = output.into_complete() else {
            return Ok(None);
        };
        let payload = encode_payload(payload)?;
        Ok(Some(Message::new(headers, payload)))
    }
}
