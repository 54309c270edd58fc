//! ---
//! rfn_section: "04-host-runtime"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Host shim that registers an R-FN function with the serverless runtime loop."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! Serverless host integration.
//!
//! [`create_function`] validates the handler options, then hands every batch
//! the host delivers to the dispatcher. [`FunctionRuntime`] is the synchronous
//! core of that loop and is what local tooling drives directly.

use std::io;

use lambda_runtime::{service_fn, LambdaEvent};
use once_cell::sync::OnceCell;
use prometheus::{Encoder, Registry, TextEncoder};
use r_fn_common::RuntimeConfig;
use r_fn_core::{BatchDispatcher, ConfigError, DispatchMetrics, FunctionBuilder, FunctionConfig};
use r_fn_msg::{Event, Output};
use thiserror::Error;
use tracing::info;

static REGISTERED: OnceCell<()> = OnceCell::new();

/// Errors raised while registering or running a function.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Handler options failed validation.
    #[error("invalid function configuration: {0}")]
    Config(#[from] ConfigError),
    /// A function was already registered in this process.
    #[error("a function is already registered in this process")]
    AlreadyRegistered,
    /// Batch JSON could not be read or written.
    #[error("invalid batch json: {0}")]
    Json(#[from] serde_json::Error),
    /// Local I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// The serverless host loop failed.
    #[error("function host failed: {0}")]
    Host(#[source] lambda_runtime::Error),
    /// Metric registration or encoding failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Dispatcher plus the metrics registry it reports into.
#[derive(Clone)]
pub struct FunctionRuntime {
    dispatcher: BatchDispatcher,
    registry: Option<Registry>,
}

impl FunctionRuntime {
    /// Wrap a validated configuration.
    pub fn new(config: FunctionConfig, settings: &RuntimeConfig) -> Result<Self, RuntimeError> {
        let mut dispatcher = BatchDispatcher::new(config);
        let registry = if settings.metrics.enabled {
            let registry = Registry::new();
            dispatcher = dispatcher.with_metrics(DispatchMetrics::register(&registry)?);
            Some(registry)
        } else {
            None
        };
        Ok(Self {
            dispatcher,
            registry,
        })
    }

    /// Validate the builder under the runtime's bind failure policy.
    pub fn from_builder(
        builder: FunctionBuilder,
        settings: &RuntimeConfig,
    ) -> Result<Self, RuntimeError> {
        let config = builder
            .bind_failure(settings.dispatch.bind_failure)
            .build()?;
        Self::new(config, settings)
    }

    /// Function configuration in effect.
    pub fn config(&self) -> &FunctionConfig {
        self.dispatcher.config()
    }

    /// Process one batch.
    pub fn invoke(&self, event: Event) -> Output {
        self.dispatcher.dispatch(event)
    }

    /// Process one batch given as wire JSON and return the output as wire JSON.
    pub fn invoke_json(&self, raw: &str) -> Result<String, RuntimeError> {
        let event: Event = serde_json::from_str(raw)?;
        let output = self.invoke(event);
        Ok(serde_json::to_string(&output)?)
    }

    /// Registry holding dispatch metrics, when enabled.
    pub fn metrics_registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    /// Render gathered metrics in the Prometheus text format.
    pub fn render_metrics(&self) -> Result<Option<String>, RuntimeError> {
        let Some(registry) = &self.registry else {
            return Ok(None);
        };
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(Some(String::from_utf8_lossy(&buffer).into_owned()))
    }
}

fn claim_registration() -> Result<(), RuntimeError> {
    REGISTERED
        .set(())
        .map_err(|_| RuntimeError::AlreadyRegistered)
}

/// Register the function and serve batches from the serverless host until it
/// shuts the process down.
///
/// Configuration errors are returned before the host loop starts. Only one
/// function may be registered per process.
pub async fn create_function(
    builder: FunctionBuilder,
    settings: &RuntimeConfig,
) -> Result<(), RuntimeError> {
    let runtime = FunctionRuntime::from_builder(builder, settings)?;
    claim_registration()?;
    info!(
        payload_mode = ?runtime.config().payload_mode(),
        metrics = runtime.registry.is_some(),
        "function registered, entering host loop"
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Event>| {
        let runtime = runtime.clone();
        async move { Ok::<Output, lambda_runtime::Error>(runtime.invoke(event.payload)) }
    }))
    .await
    .map_err(RuntimeError::Host)
}
