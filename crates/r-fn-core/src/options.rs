//! ---
//! rfn_section: "03-function-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Handler contract, option resolution, and batch dispatch."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use r_fn_common::BindFailurePolicy;
use r_fn_msg::{Headers, Inputs, MessageError, PayloadValue};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::handler::{EventHandler, HandlerOutput, SchemaHandler};
use crate::schema::{Schema, SchemaBinding, SchemaShape, ShapeKind};

/// Fatal configuration problems, raised before any batch is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No handler option was supplied.
    #[error(
        "a handler option is required: supply an event handler, or a schema handler with its schema"
    )]
    MissingHandler,
    /// More than one handler option was supplied.
    #[error("too many options: {supplied} supplied, functions accept exactly one handler option")]
    TooManyOptions {
        /// Number of non-empty options received.
        supplied: usize,
    },
    /// The structured payload schema is not a record type.
    #[error("schema {type_name} must be a record type, found {kind}")]
    InvalidSchema {
        /// Rust type name of the rejected schema.
        type_name: &'static str,
        /// Shape the schema deserializes from.
        kind: ShapeKind,
    },
}

/// How payloads are presented to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Handler receives decoded bytes.
    RawBytes,
    /// Handler receives a record bound from the decoded bytes.
    Structured,
}

/// A handler option. Exactly one must be supplied per function.
#[derive(Clone)]
pub enum HandlerOption {
    /// Raw-bytes handler.
    Event(Arc<dyn EventHandler>),
    /// Structured payload modifier: schema descriptor plus its typed handler.
    StructuredPayload(SchemaBinding),
}

impl HandlerOption {
    /// Wrap a raw-bytes handler.
    pub fn event_handler<H: EventHandler + 'static>(handler: H) -> Self {
        HandlerOption::Event(Arc::new(handler))
    }

    /// Wrap a typed handler for the schema `T`.
    pub fn structured_payload<T, O, H>(handler: H) -> Self
    where
        T: Schema,
        O: Serialize + 'static,
        H: SchemaHandler<T, O> + 'static,
    {
        HandlerOption::StructuredPayload(SchemaBinding::new(handler))
    }

    fn payload_mode(&self) -> PayloadMode {
        match self {
            HandlerOption::Event(_) => PayloadMode::RawBytes,
            HandlerOption::StructuredPayload(_) => PayloadMode::Structured,
        }
    }
}

impl fmt::Debug for HandlerOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOption::Event(_) => f.write_str("Event(..)"),
            HandlerOption::StructuredPayload(binding) => f
                .debug_tuple("StructuredPayload")
                .field(binding.shape())
                .finish(),
        }
    }
}

/// Collects handler options and validates them into a [`FunctionConfig`].
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    options: Vec<HandlerOption>,
    bind_failure: BindFailurePolicy,
}

impl FunctionBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a raw-bytes handler.
    pub fn handler<H: EventHandler + 'static>(self, handler: H) -> Self {
        self.option(HandlerOption::event_handler(handler))
    }

    /// Bind a typed handler in structured payload mode for the schema `T`.
    pub fn schema_handler<T, O, H>(self, handler: H) -> Self
    where
        T: Schema,
        O: Serialize + 'static,
        H: SchemaHandler<T, O> + 'static,
    {
        self.option(HandlerOption::structured_payload(handler))
    }

    /// Add a prebuilt option. `None` is ignored.
    pub fn option(mut self, option: impl Into<Option<HandlerOption>>) -> Self {
        if let Some(option) = option.into() {
            self.options.push(option);
        }
        self
    }

    /// Choose what happens when a payload does not fit the schema.
    pub fn bind_failure(mut self, policy: BindFailurePolicy) -> Self {
        self.bind_failure = policy;
        self
    }

    /// Validate the collected options.
    pub fn build(mut self) -> Result<FunctionConfig, ConfigError> {
        let handler = match self.options.len() {
            0 => return Err(ConfigError::MissingHandler),
            1 => self.options.remove(0),
            supplied => return Err(ConfigError::TooManyOptions { supplied }),
        };

        if let HandlerOption::StructuredPayload(binding) = &handler {
            let shape = binding.shape();
            if !shape.is_record() {
                return Err(ConfigError::InvalidSchema {
                    type_name: shape.type_name,
                    kind: shape.kind,
                });
            }
        }

        let config = FunctionConfig {
            handler,
            bind_failure: self.bind_failure,
        };
        info!(
            payload_mode = ?config.payload_mode(),
            schema = config.schema().map(|shape| shape.type_name),
            bind_failure = ?config.bind_failure,
            "function configured"
        );
        Ok(config)
    }
}

/// Validated, read-only function configuration shared by every batch.
#[derive(Clone)]
pub struct FunctionConfig {
    handler: HandlerOption,
    bind_failure: BindFailurePolicy,
}

impl FunctionConfig {
    /// Start building a configuration.
    pub fn builder() -> FunctionBuilder {
        FunctionBuilder::new()
    }

    /// Payload presentation selected by the handler option.
    pub fn payload_mode(&self) -> PayloadMode {
        self.handler.payload_mode()
    }

    /// Schema descriptor in structured payload mode.
    pub fn schema(&self) -> Option<&SchemaShape> {
        match &self.handler {
            HandlerOption::Event(_) => None,
            HandlerOption::StructuredPayload(binding) => Some(binding.shape()),
        }
    }

    /// Policy applied to schema binding failures.
    pub fn bind_failure(&self) -> BindFailurePolicy {
        self.bind_failure
    }

    /// Run the bound handler on decoded payload bytes.
    pub(crate) fn invoke(
        &self,
        payload: Vec<u8>,
        headers: &Headers,
        inputs: &Inputs,
    ) -> Result<HandlerOutput<PayloadValue>, MessageError> {
        match &self.handler {
            HandlerOption::Event(handler) => handler
                .handle(payload, headers, inputs)
                .map_err(MessageError::Handler)?
                .try_map_payload(|bytes| Ok(PayloadValue::Bytes(bytes))),
            HandlerOption::StructuredPayload(binding) => {
                binding.invoke(&payload, headers, inputs, self.bind_failure)
            }
        }
    }
}

impl fmt::Debug for FunctionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionConfig")
            .field("handler", &self.handler)
            .field("bind_failure", &self.bind_failure)
            .finish()
    }
}
