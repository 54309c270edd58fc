//! ---
//! rfn_section: "15-testing-qa-runbook"
//! rfn_subsection: "integration-tests"
//! rfn_type: "source"
//! rfn_scope: "code"
//! rfn_description: "End-to-end wire contract tests for the R-FN stack."
//! rfn_version: "v0.0.0-prealpha"
//! rfn_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use r_fn_common::{BindFailurePolicy, RuntimeConfig};
use r_fn_core::{FunctionBuilder, HandlerOutput};
use r_fn_msg::{Headers, Inputs, Output};
use r_fn_runtime::FunctionRuntime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

fn read(path: &str) -> String {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let full = Path::new(manifest_dir).join(path);
    fs::read_to_string(&full)
        .unwrap_or_else(|err| panic!("failed to read {}: {}", full.display(), err))
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct Order {
    sku: String,
    quantity: u32,
}

/// Doubles quantities, drops empty orders, and stamps the batch currency.
fn restock(
    order: Order,
    headers: &Headers,
    inputs: &Inputs,
) -> anyhow::Result<HandlerOutput<Order>> {
    if order.quantity == 0 {
        return Ok(HandlerOutput::filtered());
    }
    let mut headers = headers.clone();
    if let Some(currency) = inputs.get("currency") {
        headers.insert("currency".into(), currency.clone());
    }
    Ok(HandlerOutput::transformed(
        Order {
            quantity: order.quantity * 2,
            ..order
        },
        headers,
    ))
}

fn orders_runtime(settings: &RuntimeConfig) -> FunctionRuntime {
    FunctionRuntime::from_builder(FunctionBuilder::new().schema_handler(restock), settings)
        .expect("order runtime")
}

fn run_fixture(runtime: &FunctionRuntime) -> Value {
    let raw = runtime
        .invoke_json(&read("fixtures/orders.batch.json"))
        .expect("batch output");
    serde_json::from_str(&raw).expect("output json")
}

#[test]
fn orders_fixture_matches_wire_contract() {
    let output = run_fixture(&orders_runtime(&RuntimeConfig::default()));

    let forwarded = output["messages"].as_array().expect("message list");
    assert_eq!(forwarded.len(), 1);
    assert_eq!(
        forwarded[0]["headers"],
        json!({ "currency": "EUR", "source": "web" })
    );
    let payload = BASE64
        .decode(forwarded[0]["payload"].as_str().expect("payload text"))
        .expect("base64 payload");
    let order: Value = serde_json::from_slice(&payload).expect("json payload");
    assert_eq!(order, json!({ "sku": "A-1", "quantity": 4 }));

    let failed = output["failed_messages"].as_array().expect("failed list");
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0]["headers"], json!({}));
    assert_eq!(failed[0]["payload"], "bm90IGpzb24=");
    assert!(failed[0]["error"]
        .as_str()
        .expect("error text")
        .starts_with("couldn't bind payload to schema"));
    assert_eq!(failed[1]["headers"], json!({ "source": "batch" }));
    assert_eq!(failed[1]["payload"], "%%%");
    assert!(failed[1]["error"]
        .as_str()
        .expect("error text")
        .starts_with("couldn't decode message: "));
}

#[test]
fn lenient_binding_hands_defaults_to_the_handler() {
    let settings: RuntimeConfig = "[dispatch]\nbind_failure = \"lenient\"\n"
        .parse()
        .expect("config");
    let runtime = orders_runtime(&settings);
    assert_eq!(runtime.config().bind_failure(), BindFailurePolicy::Lenient);

    let output = run_fixture(&runtime);
    // The unreadable order binds to an empty default and is filtered.
    assert_eq!(output["messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(output["failed_messages"].as_array().map(Vec::len), Some(1));
    assert_eq!(output["failed_messages"][0]["payload"], "%%%");
}

#[test]
fn empty_and_null_batches_produce_empty_lists() {
    let runtime = orders_runtime(&RuntimeConfig::default());
    for raw in [
        r#"{"inputs":{},"messages":[]}"#,
        r#"{"inputs":null,"messages":null}"#,
        r#"{}"#,
    ] {
        let output = runtime.invoke_json(raw).expect("output");
        assert_eq!(output, r#"{"messages":[],"failed_messages":[]}"#);
    }
}

#[test]
fn raw_mode_round_trips_binary_payloads() {
    let runtime = FunctionRuntime::from_builder(
        FunctionBuilder::new().handler(
            |payload: Vec<u8>,
             headers: &Headers,
             _inputs: &Inputs|
             -> anyhow::Result<HandlerOutput<Vec<u8>>> {
                Ok(HandlerOutput::transformed(payload, headers.clone()))
            },
        ),
        &RuntimeConfig::default(),
    )
    .expect("raw runtime");

    let binary = BASE64.encode([0u8, 255, 128, 10, 13]);
    let raw = json!({
        "inputs": {},
        "messages": [{ "headers": { "h": "1" }, "payload": binary }],
    })
    .to_string();
    let output: Output = serde_json::from_str(&runtime.invoke_json(&raw).expect("output"))
        .expect("typed output");
    assert_eq!(output.messages[0].payload, binary);
    assert_eq!(output.messages[0].headers["h"], "1");
    assert!(output.failed_messages.is_empty());
}

#[test]
fn config_file_drives_runtime_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("r-fn.toml");
    fs::write(
        &path,
        "[logging]\nformat = \"pretty\"\n\n[dispatch]\nbind_failure = \"lenient\"\n\n[metrics]\nenabled = false\n",
    )
    .expect("write config");

    let settings = RuntimeConfig::load(&[dir.path().join("missing.toml"), path]).expect("load");
    assert_eq!(settings.dispatch.bind_failure, BindFailurePolicy::Lenient);
    assert!(!settings.metrics.enabled);

    let runtime = orders_runtime(&settings);
    assert!(runtime.metrics_registry().is_none());
}

#[test]
fn metrics_count_every_outcome() {
    let runtime = orders_runtime(&RuntimeConfig::default());
    run_fixture(&runtime);
    let text = runtime
        .render_metrics()
        .expect("render")
        .expect("metrics enabled by default");
    assert!(text.contains("r_fn_messages_total{outcome=\"succeeded\"} 1"));
    assert!(text.contains("r_fn_messages_total{outcome=\"failed\"} 2"));
    assert!(text.contains("r_fn_messages_total{outcome=\"filtered\"} 1"));
    assert!(text.contains("r_fn_message_errors_total{kind=\"bind\"} 1"));
    assert!(text.contains("r_fn_batches_total 1"));
}
