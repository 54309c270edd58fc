//! ---
//! rfn_section: "03-function-pipeline"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Handler contract, option resolution, and batch dispatch."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! Per-batch processing pipeline for R-FN functions.
//!
//! A function is configured once through [`FunctionBuilder`] and then every
//! batch flows through [`BatchDispatcher`]: decode, optional schema binding,
//! handler invocation, re-encode. Each message fails or succeeds on its own.

pub mod dispatcher;
pub mod handler;
pub mod metrics;
pub mod options;
pub mod schema;

pub use dispatcher::{process_batch, BatchDispatcher};
pub use handler::{EventHandler, HandlerOutput, SchemaHandler};
pub use metrics::DispatchMetrics;
pub use options::{ConfigError, FunctionBuilder, FunctionConfig, HandlerOption, PayloadMode};
pub use r_fn_common::BindFailurePolicy;
pub use schema::{Schema, SchemaBinding, SchemaShape, ShapeKind};
