//! Editor extensions.
//!
//! An extension registers by name and is handed every node type definition
//! once, before nodes of that type exist. It extends the definition's hooks
//! by composition (call the previous handler, then its own logic) and never
//! touches node types it does not target. `tick` runs once per UI frame and
//! is the only timer context extensions get.

pub mod dynamic_inputs;

use crate::graph::FlowGraph;
use crate::registry::{HookCtx, NodeTypeDef};
use std::time::Instant;

pub trait EditorExtension {
    fn name(&self) -> &str;

    /// Called once per node type definition at registration time.
    fn before_register_node_def(&mut self, def: &mut NodeTypeDef);

    /// Per-frame work (deferred setup, retries). Default: nothing.
    fn tick(&mut self, _graph: &mut FlowGraph, _now: Instant, _ctx: &mut HookCtx) {}
}

#[derive(Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Box<dyn EditorExtension>>,
}

impl ExtensionRegistry {
    pub fn register(&mut self, extension: Box<dyn EditorExtension>) {
        log::info!("Extension registered: {}", extension.name());
        self.extensions.push(extension);
    }

    pub fn before_register_node_def(&mut self, def: &mut NodeTypeDef) {
        for extension in &mut self.extensions {
            extension.before_register_node_def(def);
        }
    }

    pub fn tick(&mut self, graph: &mut FlowGraph, now: Instant, ctx: &mut HookCtx) {
        for extension in &mut self.extensions {
            extension.tick(graph, now, ctx);
        }
    }
}
