use crate::graph::FlowGraph;
use serde::{Deserialize, Serialize};

/// Snapshot-based undo/redo over the whole graph.
#[derive(Serialize, Deserialize, Clone)]
pub struct UndoStack {
    snapshots: Vec<FlowGraph>,
    cursor: usize,
    pub max_records: usize,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
            max_records: 500,
        }
    }
}

impl UndoStack {
    /// Record the current state, discarding any redo tail.
    pub fn push(&mut self, graph: &FlowGraph) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(graph.clone());
        if self.snapshots.len() > self.max_records {
            self.snapshots.remove(0);
        }
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn undo(&mut self) -> Option<FlowGraph> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.snapshots.get(self.cursor).cloned()
    }

    pub fn redo(&mut self) -> Option<FlowGraph> {
        let next = self.cursor + 1;
        let snapshot = self.snapshots.get(next).cloned()?;
        self.cursor = next;
        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use crate::node_types::NodeType;

    fn graph_with_nodes(count: usize) -> FlowGraph {
        let mut graph = FlowGraph::default();
        for i in 0..count {
            let node = Node::new(NodeType::LoadImage, (i as f32 * 10.0, 0.0));
            graph.nodes.insert(node.id, node);
        }
        graph
    }

    #[test]
    fn undo_walks_back_and_redo_forward() {
        let mut stack = UndoStack::default();
        stack.push(&graph_with_nodes(0));
        stack.push(&graph_with_nodes(1));
        stack.push(&graph_with_nodes(2));

        assert_eq!(stack.undo().unwrap().nodes.len(), 1);
        assert_eq!(stack.undo().unwrap().nodes.len(), 0);
        assert!(stack.undo().is_none());
        assert_eq!(stack.redo().unwrap().nodes.len(), 1);
        assert_eq!(stack.redo().unwrap().nodes.len(), 2);
        assert!(stack.redo().is_none());
    }

    #[test]
    fn push_after_undo_drops_the_redo_tail() {
        let mut stack = UndoStack::default();
        stack.push(&graph_with_nodes(0));
        stack.push(&graph_with_nodes(1));
        stack.push(&graph_with_nodes(2));
        stack.undo();
        stack.undo();
        stack.push(&graph_with_nodes(5));

        assert!(stack.redo().is_none());
        assert_eq!(stack.undo().unwrap().nodes.len(), 0);
    }
}
