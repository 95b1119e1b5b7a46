//! Graph execution.
//!
//! Runs on a worker thread so the UI stays responsive; progress and log
//! lines stream back over an mpsc channel, and a shared stop flag lets the
//! UI abort a run. Evaluation is demand-driven from the SaveImage sinks,
//! with per-node result caching so shared upstream nodes run once.

pub mod events;
pub mod image_batching;

use crate::graph::FlowGraph;
use crate::node_defs::INPUT_COUNT_DEFAULT;
use crate::node_types::NodeType;
use anyhow::{bail, Context, Result};
use events::ExecutionEvent;
use image::RgbaImage;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use uuid::Uuid;

#[derive(Clone)]
pub enum Value {
    Images(Vec<RgbaImage>),
    Integer(i64),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Images(_) => "image batch",
            Value::Integer(_) => "integer",
        }
    }
}

pub struct Interpreter;

impl Interpreter {
    pub fn run_async_with_stop(graph: &FlowGraph) -> (Receiver<ExecutionEvent>, Arc<AtomicBool>) {
        let (tx, rx) = channel();
        let stop = Arc::new(AtomicBool::new(false));
        let graph = graph.clone();
        let stop_flag = stop.clone();

        thread::spawn(move || {
            let _ = tx.send(ExecutionEvent::Log("Execution started".into()));
            if let Err(e) = Self::execute(&graph, &tx, &stop_flag) {
                let _ = tx.send(ExecutionEvent::Log(format!("Error: {e:#}")));
            }
            let _ = tx.send(ExecutionEvent::Finished);
        });

        (rx, stop)
    }

    fn execute(graph: &FlowGraph, tx: &Sender<ExecutionEvent>, stop: &AtomicBool) -> Result<()> {
        let mut sinks: Vec<Uuid> = graph
            .nodes
            .values()
            .filter(|n| n.node_type == NodeType::SaveImage)
            .map(|n| n.id)
            .collect();
        sinks.sort();

        if sinks.is_empty() {
            let _ = tx.send(ExecutionEvent::Log(
                "No SaveImage node found. Nothing to run.".into(),
            ));
            return Ok(());
        }

        let mut cache = HashMap::new();
        let mut visiting = HashSet::new();
        for sink in sinks {
            Self::evaluate_node(graph, sink, &mut cache, &mut visiting, tx, stop)?;
        }
        Ok(())
    }

    fn evaluate_node(
        graph: &FlowGraph,
        id: Uuid,
        cache: &mut HashMap<Uuid, Value>,
        visiting: &mut HashSet<Uuid>,
        tx: &Sender<ExecutionEvent>,
        stop: &AtomicBool,
    ) -> Result<Value> {
        if stop.load(Ordering::Relaxed) {
            bail!("Execution stopped");
        }
        if let Some(value) = cache.get(&id) {
            return Ok(value.clone());
        }
        // The editor only blocks self-connections, so a multi-node cycle can
        // reach the interpreter. Re-entering a node still being evaluated
        // must be an error, not unbounded recursion.
        if !visiting.insert(id) {
            bail!("Cycle detected at node {id}");
        }
        let node = graph.nodes.get(&id).context("node missing from graph")?;
        let _ = tx.send(ExecutionEvent::NodeActive(id));

        let value = match &node.node_type {
            NodeType::LoadImage => {
                let path = node
                    .widget("path")
                    .and_then(|w| w.value.as_str())
                    .unwrap_or("");
                if path.is_empty() {
                    bail!("LoadImage: path is empty");
                }
                let img = image::open(path)
                    .with_context(|| format!("LoadImage: failed to open {path}"))?
                    .to_rgba8();
                let _ = tx.send(ExecutionEvent::Log(format!(
                    "LoadImage: {} ({}x{})",
                    path,
                    img.width(),
                    img.height()
                )));
                Value::Images(vec![img])
            }
            NodeType::ImageBatch => {
                let target = node
                    .widget("input_count")
                    .and_then(|w| w.value.as_int())
                    .filter(|v| *v > 0)
                    .unwrap_or(INPUT_COUNT_DEFAULT) as usize;
                let method = node
                    .widget("method")
                    .and_then(|w| w.value.as_str())
                    .unwrap_or("lanczos")
                    .to_string();

                // Every image_<i> up to input_count must be connected. The
                // scan runs to completion before anything upstream is
                // evaluated, so a missing socket is reported even when a
                // connected input would fail on its own.
                let mut connected = Vec::new();
                let mut missing = Vec::new();
                for i in 1..=target {
                    let port = format!("image_{i}");
                    match graph.incoming(id, &port) {
                        Some(conn) => connected.push((port, conn.from_node)),
                        None => missing.push(port),
                    }
                }
                if !missing.is_empty() {
                    if missing.len() == target {
                        bail!(
                            "No images provided! Connect images to all {target} input sockets. Missing: {}",
                            missing.join(", ")
                        );
                    }
                    bail!(
                        "Missing {} image(s)! Expected {} but only {} connected. Missing inputs: {}",
                        missing.len(),
                        target,
                        connected.len(),
                        missing.join(", ")
                    );
                }

                let mut inputs = Vec::new();
                for (port, from_node) in connected {
                    let value = Self::evaluate_node(graph, from_node, cache, visiting, tx, stop)?;
                    match value {
                        Value::Images(frames) => inputs.push(frames),
                        other => bail!("Input {port} is not an image, got {}", other.kind()),
                    }
                }

                let _ = tx.send(ExecutionEvent::Log(format!(
                    "ImageBatch: batching {} inputs with {}",
                    inputs.len(),
                    method
                )));
                Value::Images(image_batching::batch_frames(inputs, &method)?)
            }
            NodeType::SaveImage => {
                let conn = graph
                    .incoming(id, "images")
                    .context("SaveImage: 'images' input is not connected")?;
                let value = Self::evaluate_node(graph, conn.from_node, cache, visiting, tx, stop)?;
                let Value::Images(frames) = value else {
                    bail!("SaveImage: 'images' input is not an image batch");
                };
                let dir = node
                    .widget("path")
                    .and_then(|w| w.value.as_str())
                    .unwrap_or("output")
                    .to_string();
                std::fs::create_dir_all(&dir)
                    .with_context(|| format!("SaveImage: cannot create {dir}"))?;
                for (i, frame) in frames.iter().enumerate() {
                    let file = format!("{dir}/batch_{i:03}.png");
                    frame
                        .save(&file)
                        .with_context(|| format!("SaveImage: failed to write {file}"))?;
                }
                let _ = tx.send(ExecutionEvent::Log(format!(
                    "SaveImage: wrote {} frame(s) to {}",
                    frames.len(),
                    dir
                )));
                Value::Integer(frames.len() as i64)
            }
        };

        visiting.remove(&id);
        cache.insert(id, value.clone());
        Ok(value)
    }
}
