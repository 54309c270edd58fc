//! ---
//! rfn_section: "05-reference-function"
//! rfn_subsection: "binary"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "Binary entrypoint for the passthrough reference function."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use r_fn_common::init_tracing;
use r_fn_common::RuntimeConfig;
use r_fn_core::{EventHandler, FunctionBuilder, HandlerOutput};
use r_fn_msg::{Headers, Inputs};
use r_fn_runtime::{create_function, FunctionRuntime};
use tracing::{debug, info};

const DROP_EMPTY_INPUT: &str = "drop_empty";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Passthrough R-FN function",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Process one batch from a JSON file and print the output instead of serving"
    )]
    event: Option<PathBuf>,

    #[arg(
        long = "tag",
        value_name = "KEY=VALUE",
        value_parser = parse_tag,
        help = "Header stamped onto every forwarded message"
    )]
    tags: Vec<(String, String)>,
}

fn parse_tag(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {raw:?}"))?;
    if key.is_empty() {
        return Err(anyhow!("tag key must not be empty"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Forwards payloads unchanged, adding the configured headers.
struct Passthrough {
    tags: Headers,
}

impl EventHandler for Passthrough {
    fn handle(
        &self,
        payload: Vec<u8>,
        headers: &Headers,
        inputs: &Inputs,
    ) -> Result<HandlerOutput<Vec<u8>>> {
        let drop_empty = inputs
            .get(DROP_EMPTY_INPUT)
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if drop_empty && payload.is_empty() {
            debug!("dropping empty payload");
            return Ok(HandlerOutput::filtered());
        }
        let mut headers = headers.clone();
        headers.extend(self.tags.clone());
        Ok(HandlerOutput::transformed(payload, headers))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("r-fn.toml"));
    let loaded = RuntimeConfig::load_with_source(&candidates)?;
    let settings = loaded.config;
    init_tracing("r-fn-passthrough", &settings.logging)?;
    info!(
        config = ?loaded.source,
        tags = cli.tags.len(),
        "passthrough function starting"
    );

    let builder = FunctionBuilder::new().handler(Passthrough {
        tags: cli.tags.into_iter().collect(),
    });

    match cli.event {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading batch from {}", path.display()))?;
            let runtime = FunctionRuntime::from_builder(builder, &settings)?;
            println!("{}", runtime.invoke_json(&raw)?);
        }
        None => create_function(builder, &settings).await?,
    }
    Ok(())
}
