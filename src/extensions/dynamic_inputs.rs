//! Dynamic input management for the ImageBatch node.
//!
//! Keeps the node's `image_<n>` input ports in lockstep with its
//! `input_count` widget. Ports are added and removed at the tail of the
//! managed subsequence, so existing ports are never renamed and other ports
//! (e.g. a future mask input) are left alone.
//!
//! Binding is deferred: a freshly created node may not have its widget list
//! populated yet, so the extension retries on a fixed interval from `tick`
//! until the widget shows up, then runs the initial sync. A pending bind
//! whose node has left the graph is dropped.

use super::EditorExtension;
use crate::graph::{FlowGraph, Node};
use crate::node_defs::{INPUT_COUNT_DEFAULT, INPUT_COUNT_MAX};
use crate::node_types::{DataType, NodeType};
use crate::registry::{HookCtx, NodeTypeDef};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use uuid::Uuid;

const WIDGET_NAME: &str = "input_count";
const PORT_PREFIX: &str = "image_";
const BIND_RETRY: Duration = Duration::from_millis(100);

struct PendingBind {
    node_id: Uuid,
    next_attempt: Instant,
}

#[derive(Default)]
struct BindQueue {
    pending: Vec<PendingBind>,
}

/// Extension keeping ImageBatch `image_<n>` inputs synchronized with the
/// `input_count` widget.
#[derive(Default)]
pub struct DynamicInputs {
    queue: Rc<RefCell<BindQueue>>,
}

impl EditorExtension for DynamicInputs {
    fn name(&self) -> &str {
        "DynamicInputs"
    }

    fn before_register_node_def(&mut self, def: &mut NodeTypeDef) {
        if def.node_type != NodeType::ImageBatch {
            return;
        }

        // Wrap the creation hook: run whatever was installed before, then
        // queue this node for deferred binding.
        let mut prev_created = def.on_node_created.take();
        let queue = self.queue.clone();
        def.on_node_created = Some(Box::new(move |node, ctx| {
            if let Some(prev) = prev_created.as_mut() {
                prev(node, ctx);
            }
            log::debug!("DynamicInputs: queueing bind for node {}", node.id);
            queue.borrow_mut().pending.push(PendingBind {
                node_id: node.id,
                next_attempt: Instant::now() + BIND_RETRY,
            });
        }));

        // Wrap the widget change hook the same way: the previous handler is
        // invoked first with the original arguments, then we synchronize.
        let mut prev_changed = def.widget_hooks.remove(WIDGET_NAME);
        def.widget_hooks.insert(
            WIDGET_NAME.into(),
            Box::new(move |node, value, ctx| {
                if let Some(prev) = prev_changed.as_mut() {
                    prev(node, value, ctx);
                }
                log::info!("ImageBatch: {} changed to {:?}", WIDGET_NAME, value);
                if sync_image_inputs(node) {
                    ctx.redraw_requested = true;
                }
            }),
        );
    }

    fn tick(&mut self, graph: &mut FlowGraph, now: Instant, ctx: &mut HookCtx) {
        let mut queue = self.queue.borrow_mut();
        queue.pending.retain_mut(|bind| {
            if now < bind.next_attempt {
                return true;
            }
            let Some(node) = graph.nodes.get_mut(&bind.node_id) else {
                log::debug!(
                    "DynamicInputs: node {} removed before binding, dropping",
                    bind.node_id
                );
                return false;
            };
            if node.widget(WIDGET_NAME).is_some() {
                log::debug!("DynamicInputs: binding node {}", bind.node_id);
                if sync_image_inputs(node) {
                    ctx.redraw_requested = true;
                }
                false
            } else {
                log::debug!("DynamicInputs: widget not ready on {}, retrying", bind.node_id);
                bind.next_attempt = now + BIND_RETRY;
                true
            }
        });
    }
}

/// Bring the node's `image_<n>` inputs in line with the `input_count` widget.
///
/// Returns false (and leaves the node untouched) when the widget is absent.
/// The interactive widget is range-limited, but hand-edited scripts are not:
/// a zero or negative value falls back to the default of 2, and values above
/// the widget maximum are clamped so a bad script cannot append thousands of
/// ports.
pub fn sync_image_inputs(node: &mut Node) -> bool {
    let Some(widget) = node.widget(WIDGET_NAME) else {
        log::info!(
            "{}: {} widget not found, skipping sync",
            node.node_type.type_name(),
            WIDGET_NAME
        );
        return false;
    };
    let target = match widget.value.as_int() {
        Some(v) if v > 0 => v.min(INPUT_COUNT_MAX) as usize,
        _ => INPUT_COUNT_DEFAULT as usize,
    };

    // Record the indices of the managed ports, in order.
    let mut managed: Vec<usize> = node
        .inputs
        .iter()
        .enumerate()
        .filter(|(_, p)| p.name.starts_with(PORT_PREFIX))
        .map(|(i, _)| i)
        .collect();
    let mut current = managed.len();
    log::debug!("ImageBatch: {} image inputs, target {}", current, target);

    // Remove surplus ports from the tail. Popping the highest recorded index
    // first keeps the remaining recorded indices valid.
    while current > target {
        if let Some(index) = managed.pop() {
            node.remove_input(index);
            current -= 1;
        }
    }

    // Append the missing ones.
    while current < target {
        current += 1;
        node.add_input(format!("{PORT_PREFIX}{current}"), DataType::Image);
    }

    let size = node.compute_size();
    node.set_size(size);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::ExtensionRegistry;
    use crate::graph::{Port, Widget, WidgetValue};
    use crate::registry::NodeRegistry;

    fn registry_with_extension() -> (NodeRegistry, ExtensionRegistry) {
        let mut extensions = ExtensionRegistry::default();
        extensions.register(Box::new(DynamicInputs::default()));
        let registry = NodeRegistry::with_defaults(&mut extensions);
        (registry, extensions)
    }

    fn image_port_names(node: &Node) -> Vec<&str> {
        node.inputs
            .iter()
            .filter(|p| p.name.starts_with(PORT_PREFIX))
            .map(|p| p.name.as_str())
            .collect()
    }

    fn set_count(node: &mut Node, value: i64) {
        node.widget_mut(WIDGET_NAME).unwrap().value = WidgetValue::Integer(value);
    }

    #[test]
    fn sync_reaches_any_target_count() {
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));

        for target in [1i64, 2, 3, 7, 20, 4] {
            set_count(&mut node, target);
            assert!(sync_image_inputs(&mut node));
            let expected: Vec<String> =
                (1..=target).map(|n| format!("image_{n}")).collect();
            assert_eq!(image_port_names(&node), expected);
        }
    }

    #[test]
    fn zero_value_falls_back_to_default() {
        // Falsy widget value means "use the default of 2", observed behavior
        // kept as-is.
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        set_count(&mut node, 5);
        sync_image_inputs(&mut node);
        set_count(&mut node, 0);
        sync_image_inputs(&mut node);
        assert_eq!(image_port_names(&node), vec!["image_1", "image_2"]);
    }

    #[test]
    fn oversized_count_is_clamped_to_the_widget_maximum() {
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        set_count(&mut node, 1_000_000);
        sync_image_inputs(&mut node);
        assert_eq!(image_port_names(&node).len(), INPUT_COUNT_MAX as usize);
    }

    #[test]
    fn sync_is_idempotent() {
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        set_count(&mut node, 6);
        sync_image_inputs(&mut node);
        let first = node.inputs.clone();
        sync_image_inputs(&mut node);
        assert_eq!(
            first.iter().map(|p| &p.name).collect::<Vec<_>>(),
            node.inputs.iter().map(|p| &p.name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn unmanaged_ports_are_left_alone() {
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        node.inputs.insert(
            0,
            Port {
                name: "mask".into(),
                data_type: DataType::Custom("MASK".into()),
            },
        );

        set_count(&mut node, 4);
        sync_image_inputs(&mut node);
        assert_eq!(node.inputs[0].name, "mask");
        assert_eq!(image_port_names(&node), vec!["image_1", "image_2", "image_3", "image_4"]);

        set_count(&mut node, 1);
        sync_image_inputs(&mut node);
        assert_eq!(node.inputs[0].name, "mask");
        assert_eq!(image_port_names(&node), vec!["image_1"]);
    }

    #[test]
    fn shrinking_removes_exactly_the_tail() {
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        set_count(&mut node, 5);
        sync_image_inputs(&mut node);
        assert_eq!(image_port_names(&node).len(), 5);

        set_count(&mut node, 2);
        sync_image_inputs(&mut node);
        assert_eq!(image_port_names(&node), vec!["image_1", "image_2"]);
    }

    #[test]
    fn missing_widget_is_a_noop() {
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        node.widgets.clear();
        let before = node.inputs.clone();
        assert!(!sync_image_inputs(&mut node));
        assert_eq!(before.len(), node.inputs.len());
    }

    #[test]
    fn unchanged_value_still_requests_redraw() {
        let (mut registry, _ext) = registry_with_extension();
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        let before = node.inputs.clone();

        // The widget reports a change from 2 to 2; port list must be stable
        // but the canvas is still asked to repaint.
        let mut ctx = HookCtx::default();
        registry.widget_changed(&mut node, WIDGET_NAME, &mut ctx);
        assert!(ctx.redraw_requested);
        assert_eq!(
            before.iter().map(|p| &p.name).collect::<Vec<_>>(),
            node.inputs.iter().map(|p| &p.name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn previous_widget_hook_runs_first_with_original_arguments() {
        use std::cell::RefCell;
        use std::rc::Rc;

        // A definition that already has an input_count handler installed
        // before the extension wraps it.
        let mut def = NodeTypeDef::new(NodeType::ImageBatch);
        let calls: Rc<RefCell<Vec<(i64, usize)>>> = Rc::default();
        let calls_hook = calls.clone();
        def.widget_hooks.insert(
            WIDGET_NAME.into(),
            Box::new(move |node, value, _ctx| {
                // Record the value and the port count as seen *before* sync.
                calls_hook
                    .borrow_mut()
                    .push((value.as_int().unwrap(), node.inputs.len()));
            }),
        );

        let mut extension = DynamicInputs::default();
        extension.before_register_node_def(&mut def);

        let mut extensions = ExtensionRegistry::default();
        extensions.register(Box::new(DynamicInputs::default()));
        let mut registry = NodeRegistry::with_defaults(&mut extensions);
        let mut node = registry.instantiate(&NodeType::ImageBatch, (0.0, 0.0));
        set_count(&mut node, 4);

        let hook = def.widget_hooks.get_mut(WIDGET_NAME).unwrap();
        let value = node.widget(WIDGET_NAME).unwrap().value.clone();
        let mut ctx = HookCtx::default();
        hook(&mut node, &value, &mut ctx);

        // Exactly one call, with the new value, while the node still had its
        // pre-sync two inputs.
        assert_eq!(*calls.borrow(), vec![(4, 2)]);
        assert_eq!(image_port_names(&node).len(), 4);
    }

    #[test]
    fn bind_waits_for_the_widget_then_syncs() {
        let mut graph = FlowGraph::default();
        let mut extension = DynamicInputs::default();
        let mut def = NodeTypeDef::new(NodeType::ImageBatch);
        extension.before_register_node_def(&mut def);

        // Simulate the host: the node exists before its widgets do.
        let mut node = Node::new(NodeType::ImageBatch, (0.0, 0.0));
        let node_id = node.id;
        let mut ctx = HookCtx::default();
        def.on_node_created.as_mut().unwrap()(&mut node, &mut ctx);
        graph.nodes.insert(node_id, node);

        let t0 = Instant::now() + Duration::from_secs(1);
        extension.tick(&mut graph, t0, &mut ctx);
        assert!(graph.nodes[&node_id].inputs.is_empty());
        assert_eq!(extension.queue.borrow().pending.len(), 1);

        // Widget appears with value 3; the next retry binds and syncs.
        graph.nodes.get_mut(&node_id).unwrap().widgets.push(Widget {
            name: WIDGET_NAME.into(),
            value: WidgetValue::Integer(3),
        });
        let t1 = t0 + Duration::from_secs(1);
        extension.tick(&mut graph, t1, &mut ctx);
        assert!(extension.queue.borrow().pending.is_empty());
        assert!(ctx.redraw_requested);
        assert_eq!(
            image_port_names(&graph.nodes[&node_id]),
            vec!["image_1", "image_2", "image_3"]
        );
    }

    #[test]
    fn pending_bind_is_dropped_when_the_node_is_deleted() {
        let mut graph = FlowGraph::default();
        let mut extension = DynamicInputs::default();
        let mut def = NodeTypeDef::new(NodeType::ImageBatch);
        extension.before_register_node_def(&mut def);

        let mut node = Node::new(NodeType::ImageBatch, (0.0, 0.0));
        let mut ctx = HookCtx::default();
        def.on_node_created.as_mut().unwrap()(&mut node, &mut ctx);
        // Node never makes it into the graph (deleted during the window).
        drop(node);

        let later = Instant::now() + Duration::from_secs(1);
        extension.tick(&mut graph, later, &mut ctx);
        assert!(extension.queue.borrow().pending.is_empty());
    }

    #[test]
    fn creation_hook_wrapping_preserves_previous_behavior() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let order: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        let mut def = NodeTypeDef::new(NodeType::ImageBatch);
        let order_prev = order.clone();
        def.on_node_created = Some(Box::new(move |_node, _ctx| {
            order_prev.borrow_mut().push("previous");
        }));

        let mut extension = DynamicInputs::default();
        extension.before_register_node_def(&mut def);

        let mut node = Node::new(NodeType::ImageBatch, (0.0, 0.0));
        let mut ctx = HookCtx::default();
        def.on_node_created.as_mut().unwrap()(&mut node, &mut ctx);

        assert_eq!(*order.borrow(), vec!["previous"]);
        assert_eq!(extension.queue.borrow().pending.len(), 1);
    }
}
