//! ---
//! rfn_section: "01-core-functionality"
//! rfn_subsection: "module"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Shared primitives and utilities for the function runtime."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
//! Shared runtime primitives for R-FN functions.
//! This crate exposes configuration loading and logging bootstrap consumed
//! by the dispatcher, the host shim, and function binaries.

pub mod config;
pub mod logging;

pub use config::{
    BindFailurePolicy, DispatchConfig, LoadedRuntimeConfig, LoggingConfig, MetricsConfig,
    RuntimeConfig,
};
pub use logging::{init_tracing, LogFormat};
