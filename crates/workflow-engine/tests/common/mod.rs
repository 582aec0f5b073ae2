//! Shared fixtures for workflow integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use serde_json::json;
use workflow_engine::{
    Component, ComponentCategory, ComponentId, ComponentMetadata, ComponentRegistry, ConfigMap,
    FnProcessor, PortValues, ProcessContext, ProcessResult, ProcessingFailure, WorkflowGraph,
};

static INIT: Once = Once::new();

/// Initialize logging for tests
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

pub fn id(s: &str) -> ComponentId {
    ComponentId::from(s)
}

fn single(port: &str, value: serde_json::Value) -> PortValues {
    let mut outputs = PortValues::new();
    outputs.insert(port.to_string(), value);
    outputs
}

/// Loader, model and report component types
///
/// The model fails with "training diverged" while `fail_model` is set.
pub fn demo_registry(fail_model: Arc<AtomicBool>) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    registry.register_fn(
        ComponentMetadata::new("file_loader", "File Loader", ComponentCategory::Input)
            .with_description("Reads rows from a data file"),
        |id, _config| {
            let mut component = Component::with_id(
                id,
                "file_loader",
                FnProcessor::new(|ctx: &ProcessContext<'_>| {
                    let rows = ctx.config_value("rows").and_then(|v| v.as_u64()).unwrap_or(3);
                    let data: Vec<u64> = (1..=rows).collect();
                    Ok(single("data", json!(data)))
                }),
            );
            component.add_output_port("data", "dataset")?;
            Ok(component)
        },
    );

    registry.register_fn(
        ComponentMetadata::new("neural_network", "Neural Network", ComponentCategory::Model),
        move |id, _config| {
            let fail = fail_model.clone();
            let mut component = Component::with_id(
                id,
                "neural_network",
                FnProcessor::new(move |ctx: &ProcessContext<'_>| -> ProcessResult {
                    if fail.load(Ordering::SeqCst) {
                        return Err(ProcessingFailure::new("training diverged"));
                    }
                    let rows = ctx.require_input("data")?.as_array().map_or(0, Vec::len);
                    let epochs = ctx.config_value("epochs").and_then(|v| v.as_u64()).unwrap_or(1);
                    ctx.report_progress(100, Some(format!("{epochs} epochs")));
                    Ok(single("result", json!({ "rows": rows, "epochs": epochs })))
                }),
            );
            component.add_required_input_port("data", "dataset")?;
            component.add_output_port("result", "metrics")?;
            Ok(component)
        },
    );

    registry.register_fn(
        ComponentMetadata::new("report", "Report", ComponentCategory::Output),
        |id, _config| {
            let mut component = Component::with_id(
                id,
                "report",
                FnProcessor::new(|ctx: &ProcessContext<'_>| {
                    ctx.require_input("result")?;
                    Ok(PortValues::new())
                }),
            );
            component.add_required_input_port("result", "metrics")?;
            Ok(component)
        },
    );

    registry
}

/// Loader → Model → Report, built through the registry
pub fn build_pipeline(registry: &ComponentRegistry) -> WorkflowGraph {
    let mut graph = WorkflowGraph::new("pipeline", "Loader to Report");

    let mut model_config = ConfigMap::new();
    model_config.insert("epochs".to_string(), json!(5));

    for (name, type_name, config) in [
        ("Loader", "file_loader", ConfigMap::new()),
        ("Model", "neural_network", model_config),
        ("Report", "report", ConfigMap::new()),
    ] {
        let component = registry
            .create(type_name, id(name), config)
            .expect("registered type");
        graph.add_component(component).expect("unique id");
    }

    graph
        .connect(&id("Loader"), "data", &id("Model"), "data")
        .expect("loader feeds model");
    graph
        .connect(&id("Model"), "result", &id("Report"), "result")
        .expect("model feeds report");
    graph
}
