use super::node_types::{DataType, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: HashMap<Uuid, Node>,
    pub connections: Vec<Connection>,
}

impl FlowGraph {
    /// Drop connections whose endpoint port no longer exists on its node.
    /// Port lists can shrink at runtime (dynamic inputs), and the graph must
    /// not keep edges into removed ports.
    pub fn prune_connections(&mut self) {
        let nodes = &self.nodes;
        self.connections.retain(|c| {
            let from_ok = nodes
                .get(&c.from_node)
                .map(|n| n.outputs.iter().any(|p| p.name == c.from_port))
                .unwrap_or(false);
            let to_ok = nodes
                .get(&c.to_node)
                .map(|n| n.inputs.iter().any(|p| p.name == c.to_port))
                .unwrap_or(false);
            from_ok && to_ok
        });
    }

    /// The connection feeding the given input port, if any.
    pub fn incoming(&self, node_id: Uuid, port: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.to_node == node_id && c.to_port == port)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub node_type: NodeType,
    pub position: (f32, f32),
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
    pub widgets: Vec<Widget>,
    pub z_order: u64,
    /// Display size in graph units, kept current via `set_size(compute_size())`.
    pub size: (f32, f32),
}

impl Node {
    pub fn new(node_type: NodeType, position: (f32, f32)) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_type,
            position,
            inputs: Vec::new(),
            outputs: Vec::new(),
            widgets: Vec::new(),
            z_order: 0,
            size: (NODE_MIN_WIDTH, HEADER_HEIGHT),
        }
    }

    pub fn add_input(&mut self, name: impl Into<String>, data_type: DataType) {
        self.inputs.push(Port {
            name: name.into(),
            data_type,
        });
    }

    pub fn remove_input(&mut self, index: usize) {
        if index < self.inputs.len() {
            self.inputs.remove(index);
        } else {
            log::warn!(
                "{}: remove_input index {} out of range ({} inputs)",
                self.node_type.type_name(),
                index,
                self.inputs.len()
            );
        }
    }

    pub fn widget(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    pub fn widget_mut(&mut self, name: &str) -> Option<&mut Widget> {
        self.widgets.iter_mut().find(|w| w.name == name)
    }

    /// Display size derived from content: header, one row per port on the
    /// taller side, one row per widget.
    pub fn compute_size(&self) -> (f32, f32) {
        let port_rows = self.inputs.len().max(self.outputs.len()) as f32;
        let widget_rows = self.widgets.len() as f32;
        let height = HEADER_HEIGHT + port_rows * PORT_ROW_HEIGHT + widget_rows * WIDGET_ROW_HEIGHT;
        let name_chars = self
            .inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|p| p.name.len())
            .max()
            .unwrap_or(0) as f32;
        let width = NODE_MIN_WIDTH.max(name_chars * 8.0 + 80.0);
        (width, height)
    }

    pub fn set_size(&mut self, size: (f32, f32)) {
        self.size = size;
    }
}

pub const HEADER_HEIGHT: f32 = 30.0;
pub const PORT_ROW_HEIGHT: f32 = 25.0;
pub const WIDGET_ROW_HEIGHT: f32 = 24.0;
pub const NODE_MIN_WIDTH: f32 = 150.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub data_type: DataType,
}

/// A UI control attached to a node. Value changes are reported by the editor
/// and dispatched through the node registry's widget hooks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Widget {
    pub name: String,
    pub value: WidgetValue,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum WidgetValue {
    Integer(i64),
    Text(String),
    Choice(String),
}

impl WidgetValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            WidgetValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            WidgetValue::Text(s) | WidgetValue::Choice(s) => Some(s),
            WidgetValue::Integer(_) => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from_node: Uuid,
    pub from_port: String,
    pub to_node: Uuid,
    pub to_port: String,
}
