//! ---
//! rfn_section: "03-function-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Handler contract, option resolution, and batch dispatch."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use r_fn_msg::{BatchSummary, MessageError};

/// Prometheus metric handles for batch dispatch.
#[derive(Clone)]
pub struct DispatchMetrics {
    messages: IntCounterVec,
    errors: IntCounterVec,
    batches: IntCounter,
    batch_duration: Histogram,
}

impl DispatchMetrics {
    /// Register dispatch metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let messages = IntCounterVec::new(
            Opts::new(
                "r_fn_messages_total",
                "Messages processed, partitioned by outcome",
            ),
            &["outcome"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new(
                "r_fn_message_errors_total",
                "Messages routed to the failure list, partitioned by failing step",
            ),
            &["kind"],
        )?;
        let batches = IntCounter::with_opts(Opts::new(
            "r_fn_batches_total",
            "Batches dispatched",
        ))?;
        let batch_duration = Histogram::with_opts(HistogramOpts::new(
            "r_fn_batch_duration_seconds",
            "Wall time spent dispatching one batch",
        ))?;

        registry.register(Box::new(messages.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(batches.clone()))?;
        registry.register(Box::new(batch_duration.clone()))?;

        Ok(Self {
            messages,
            errors,
            batches,
            batch_duration,
        })
    }

    /// Record a per-message failure.
    pub fn observe_error(&self, error: &MessageError) {
        self.errors.with_label_values(&[error.kind()]).inc();
    }

    /// Record a completed batch.
    pub fn observe_batch(&self, summary: &BatchSummary, elapsed: Duration) {
        self.batches.inc();
        self.messages
            .with_label_values(&["succeeded"])
            .inc_by(summary.succeeded as u64);
        self.messages
            .with_label_values(&["failed"])
            .inc_by(summary.failed as u64);
        self.messages
            .with_label_values(&["filtered"])
            .inc_by(summary.filtered as u64);
        self.batch_duration.observe(elapsed.as_secs_f64());
    }
}
