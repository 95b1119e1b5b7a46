//! Node type registry.
//!
//! Each node type is described by a [`NodeTypeDef`] carrying two hook
//! slots: one invoked when a node instance is created, and one per widget
//! invoked when that widget's value changes.
//! Extensions get each definition exactly once, before any node of that type
//! is instantiated, and extend hooks by taking the previous handler and
//! composing around it.

use crate::extensions::ExtensionRegistry;
use crate::node_defs;
use crate::graph::{Node, WidgetValue};
use crate::node_types::NodeType;
use std::collections::HashMap;

/// Out-parameters for hook dispatch. A hook that mutated node content sets
/// `redraw_requested` so the app schedules a repaint.
#[derive(Default)]
pub struct HookCtx {
    pub redraw_requested: bool,
}

pub type NodeCreatedHook = Box<dyn FnMut(&mut Node, &mut HookCtx)>;
pub type WidgetChangedHook = Box<dyn FnMut(&mut Node, &WidgetValue, &mut HookCtx)>;

pub struct NodeTypeDef {
    pub node_type: NodeType,
    pub on_node_created: Option<NodeCreatedHook>,
    pub widget_hooks: HashMap<String, WidgetChangedHook>,
}

impl NodeTypeDef {
    pub fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            on_node_created: None,
            widget_hooks: HashMap::new(),
        }
    }
}

#[derive(Default)]
pub struct NodeRegistry {
    defs: HashMap<&'static str, NodeTypeDef>,
}

impl NodeRegistry {
    /// Register every built-in node type, running each definition through the
    /// extension registry first.
    pub fn with_defaults(extensions: &mut ExtensionRegistry) -> Self {
        let mut registry = Self::default();
        for node_type in NodeType::all() {
            registry.register(NodeTypeDef::new(node_type.clone()), extensions);
        }
        registry
    }

    pub fn register(&mut self, mut def: NodeTypeDef, extensions: &mut ExtensionRegistry) {
        extensions.before_register_node_def(&mut def);
        log::debug!("Registered node type {}", def.node_type.type_name());
        self.defs.insert(def.node_type.type_name(), def);
    }

    /// Build a node instance with the type's default ports and widgets, then
    /// run its creation hook.
    pub fn instantiate(&mut self, node_type: &NodeType, position: (f32, f32)) -> Node {
        let mut node = Node::new(node_type.clone(), position);
        let (inputs, outputs) = node_defs::ports_for_type(node_type);
        node.inputs = inputs;
        node.outputs = outputs;
        node.widgets = node_defs::widgets_for_type(node_type);
        node.set_size(node.compute_size());

        let mut ctx = HookCtx::default();
        self.node_created(&mut node, &mut ctx);
        node
    }

    /// Run the creation hook for an already-built node. Also used when a
    /// script is loaded, so hooks see deserialized nodes too.
    pub fn node_created(&mut self, node: &mut Node, ctx: &mut HookCtx) {
        if let Some(def) = self.defs.get_mut(node.node_type.type_name()) {
            if let Some(hook) = def.on_node_created.as_mut() {
                hook(node, ctx);
            }
        }
    }

    /// Dispatch a widget value change to the type's hook for that widget.
    pub fn widget_changed(&mut self, node: &mut Node, widget_name: &str, ctx: &mut HookCtx) {
        let Some(def) = self.defs.get_mut(node.node_type.type_name()) else {
            return;
        };
        let Some(hook) = def.widget_hooks.get_mut(widget_name) else {
            return;
        };
        let Some(value) = node.widget(widget_name).map(|w| w.value.clone()) else {
            log::warn!(
                "{}: widget '{}' changed but is missing from the node",
                node.node_type.type_name(),
                widget_name
            );
            return;
        };
        hook(node, &value, ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn instantiate_applies_default_ports_and_widgets() {
        let mut extensions = ExtensionRegistry::default();
        let mut registry = NodeRegistry::with_defaults(&mut extensions);
        let node = registry.instantiate(&NodeType::ImageBatch, (10.0, 20.0));

        let names: Vec<_> = node.inputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["image_1", "image_2"]);
        assert_eq!(node.outputs[0].name, "batched_images");
        assert_eq!(
            node.widget("input_count").unwrap().value,
            WidgetValue::Integer(2)
        );
        assert!(node.size.1 > 0.0);
    }

    #[test]
    fn widget_changed_reaches_the_installed_hook() {
        let mut extensions = ExtensionRegistry::default();
        let mut registry = NodeRegistry::with_defaults(&mut extensions);

        let seen: Rc<RefCell<Vec<i64>>> = Rc::default();
        let seen_hook = seen.clone();
        let def = registry.defs.get_mut("ImageBatch").unwrap();
        def.widget_hooks.insert(
            "input_count".into(),
            Box::new(move |_node, value, _ctx| {
                seen_hook.borrow_mut().push(value.as_int().unwrap());
            }),
        );

        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        node.widget_mut("input_count").unwrap().value = WidgetValue::Integer(5);
        let mut ctx = HookCtx::default();
        registry.widget_changed(&mut node, "input_count", &mut ctx);

        assert_eq!(*seen.borrow(), vec![5]);
    }

    #[test]
    fn changed_dispatch_for_unknown_widget_is_a_noop() {
        let mut extensions = ExtensionRegistry::default();
        let mut registry = NodeRegistry::with_defaults(&mut extensions);
        let mut node = registry.instantiate(&NodeType::LoadImage, (0.0, 0.0));
        let mut ctx = HookCtx::default();
        registry.widget_changed(&mut node, "input_count", &mut ctx);
        assert!(!ctx.redraw_requested);
    }
}
