//! Visual node-based graph editor.
//!
//! The editor draws and manipulates the graph but never mutates node content
//! behind the registry's back: widget edits and node spawns are reported in
//! [`EditorOutput`] so the app can route them through the registry hooks.

pub mod style;
pub mod utils;

pub use style::EditorStyle;

use crate::graph::{
    Connection, FlowGraph, Node, WidgetValue, HEADER_HEIGHT, PORT_ROW_HEIGHT, WIDGET_ROW_HEIGHT,
};
use crate::node_defs::{INPUT_COUNT_MAX, INPUT_COUNT_MIN};
use crate::node_types::{NodeType, RESIZE_METHODS};
use eframe::egui;
use egui::{Color32, CornerRadius, Pos2, Rect, Sense, Stroke, Vec2};
use std::collections::HashSet;
use uuid::Uuid;

pub struct WidgetChange {
    pub node_id: Uuid,
    pub widget_name: String,
}

pub struct SpawnRequest {
    pub node_type: NodeType,
    pub position: (f32, f32),
}

/// What happened this frame that the app must act on.
#[derive(Default)]
pub struct EditorOutput {
    pub widget_changes: Vec<WidgetChange>,
    pub spawn_requests: Vec<SpawnRequest>,
    /// Structural change (move finished, connect, delete) worth an undo snapshot.
    pub graph_changed: bool,
}

impl EditorOutput {
    fn is_empty(&self) -> bool {
        self.widget_changes.is_empty() && self.spawn_requests.is_empty() && !self.graph_changed
    }
}

pub struct GraphEditor {
    pub pan: Vec2,
    pub zoom: f32,
    pub style: EditorStyle,
    pub selected_nodes: HashSet<Uuid>,
    pub next_z_order: u64,
    dragging_node: Option<Uuid>,
    /// (node, port name, is_input) of the port a connection was started from.
    connection_start: Option<(Uuid, String, bool)>,
    node_finder: Option<Pos2>,
    node_finder_query: String,
}

/// Keeps graph coordinates positive during rendering, as panning left/up
/// would otherwise produce negative screen positions.
const VIRTUAL_OFFSET: Vec2 = Vec2::new(5000.0, 5000.0);

impl Default for GraphEditor {
    fn default() -> Self {
        Self {
            pan: Vec2::new(-5000.0, -5000.0),
            zoom: 1.0,
            style: EditorStyle::default(),
            selected_nodes: HashSet::new(),
            next_z_order: 1,
            dragging_node: None,
            connection_start: None,
            node_finder: None,
            node_finder_query: String::new(),
        }
    }
}

impl GraphEditor {
    fn to_screen(&self, pos: Pos2, canvas_offset: Pos2) -> Pos2 {
        let virtual_pos = pos.to_vec2() + VIRTUAL_OFFSET;
        (virtual_pos * self.zoom + self.pan + canvas_offset.to_vec2()).to_pos2()
    }

    fn from_screen(&self, screen_pos: Pos2, canvas_offset: Pos2) -> Pos2 {
        let pos = (screen_pos.to_vec2() - self.pan - canvas_offset.to_vec2()) / self.zoom;
        (pos - VIRTUAL_OFFSET).to_pos2()
    }

    /// Screen position of a port dot.
    fn port_screen_pos(
        &self,
        node: &Node,
        port_name: &str,
        is_input: bool,
        canvas_offset: Pos2,
    ) -> Option<Pos2> {
        let ports = if is_input { &node.inputs } else { &node.outputs };
        let index = ports.iter().position(|p| p.name == port_name)?;
        let top_left = self.to_screen(Pos2::new(node.position.0, node.position.1), canvas_offset);
        let x = if is_input {
            top_left.x
        } else {
            top_left.x + node.size.0 * self.zoom
        };
        let y = top_left.y + (HEADER_HEIGHT + (index as f32 + 0.5) * PORT_ROW_HEIGHT) * self.zoom;
        Some(Pos2::new(x, y))
    }

    pub fn show(&mut self, ui: &mut egui::Ui, graph: &mut FlowGraph) -> EditorOutput {
        let mut output = EditorOutput::default();
        let clip_rect = ui.max_rect();
        let canvas_offset = clip_rect.min;
        let pointer_pos = ui.ctx().pointer_latest_pos();
        let pointer_in_bounds = ui.rect_contains_pointer(clip_rect);

        let mut input_escape = false;
        let mut input_delete = false;
        let mut input_space = false;
        let mut input_primary_released = false;

        ui.input(|i| {
            // Pan with middle mouse or Alt + left mouse
            if i.pointer.middle_down() || (i.modifiers.alt && i.pointer.primary_down()) {
                self.pan += i.pointer.delta();
            }
            // Scroll wheel zoom around the cursor
            if pointer_in_bounds {
                let scroll = i.raw_scroll_delta;
                if scroll.y != 0.0 {
                    if let Some(hover) = i.pointer.hover_pos() {
                        let old_zoom = self.zoom;
                        let new_zoom = (old_zoom * (1.0 + scroll.y * 0.001)).clamp(0.1, 1.0);
                        let ratio = new_zoom / old_zoom;
                        let pointer = hover - canvas_offset.to_vec2();
                        self.pan = pointer.to_vec2() - (pointer.to_vec2() - self.pan) * ratio;
                        self.zoom = new_zoom;
                    }
                }
            }
            input_escape = i.key_pressed(egui::Key::Escape);
            input_delete =
                i.key_pressed(egui::Key::Delete) || i.key_pressed(egui::Key::Backspace);
            input_space = i.key_pressed(egui::Key::Space);
            input_primary_released = i.pointer.primary_released();
        });

        ui.painter()
            .rect_filled(clip_rect, 0.0, Color32::from_gray(32));

        self.draw_connections(ui, graph, canvas_offset);

        // Connection in progress follows the pointer
        if let Some((node_id, port_name, is_input)) = self.connection_start.clone() {
            if let (Some(node), Some(pos)) = (graph.nodes.get(&node_id), pointer_pos) {
                if let Some(start) = self.port_screen_pos(&node, &port_name, is_input, canvas_offset)
                {
                    utils::draw_bezier(ui.painter(), start, pos, Color32::WHITE);
                }
            }
        }

        // Draw nodes low z-order first so the highest ends up on top
        let mut sorted_ids: Vec<Uuid> = graph.nodes.keys().copied().collect();
        sorted_ids.sort_by_key(|id| graph.nodes.get(id).map(|n| n.z_order).unwrap_or(0));

        let mut connect_event: Option<(Uuid, String, bool)> = None;
        let mut bring_to_front: Option<Uuid> = None;

        for node_id in sorted_ids {
            let Some(node) = graph.nodes.get_mut(&node_id) else {
                continue;
            };
            let mut child = ui.new_child(egui::UiBuilder::new().max_rect(clip_rect));
            let events = self.draw_node(&mut child, node, canvas_offset, &mut output);

            if let Some(port_event) = events.port_event {
                connect_event = Some(port_event);
            }
            if events.pressed {
                self.selected_nodes.clear();
                self.selected_nodes.insert(node_id);
                bring_to_front = Some(node_id);
            }
            if events.drag_delta != Vec2::ZERO
                && (self.dragging_node.is_none() || self.dragging_node == Some(node_id))
            {
                self.dragging_node = Some(node_id);
                node.position.0 += events.drag_delta.x / self.zoom;
                node.position.1 += events.drag_delta.y / self.zoom;
            }
        }

        if input_primary_released && self.dragging_node.take().is_some() {
            output.graph_changed = true;
        }

        if let Some(id) = bring_to_front {
            if let Some(node) = graph.nodes.get_mut(&id) {
                node.z_order = self.next_z_order;
                self.next_z_order += 1;
            }
        }

        // Complete or start a connection
        let has_connect_event = connect_event.is_some();
        if let Some((id, port, is_input)) = connect_event {
            match self.connection_start.take() {
                Some((start_id, start_port, start_is_input))
                    if start_is_input != is_input && start_id != id =>
                {
                    let (from_node, from_port, to_node, to_port) = if start_is_input {
                        (id, port, start_id, start_port)
                    } else {
                        (start_id, start_port, id, port)
                    };
                    // One edge per input port
                    graph
                        .connections
                        .retain(|c| !(c.to_node == to_node && c.to_port == to_port));
                    graph.connections.push(Connection {
                        from_node,
                        from_port,
                        to_node,
                        to_port,
                    });
                    output.graph_changed = true;
                }
                _ => self.connection_start = Some((id, port, is_input)),
            }
        }
        if input_escape && self.connection_start.is_some() {
            self.connection_start = None;
        }
        if input_primary_released && !has_connect_event {
            self.connection_start = None;
        }

        // Delete selected nodes, unless a text field has focus
        let any_text_editing = ui.memory(|m| m.focused().is_some());
        if input_delete && !any_text_editing && !self.selected_nodes.is_empty() {
            for id in self.selected_nodes.drain() {
                graph.nodes.remove(&id);
                graph
                    .connections
                    .retain(|c| c.from_node != id && c.to_node != id);
                log::info!("Deleted node {}", id);
            }
            output.graph_changed = true;
        }

        // Spacebar node finder
        if input_space && self.node_finder.is_none() && !any_text_editing {
            if let Some(pos) = pointer_pos {
                self.node_finder = Some(pos);
                self.node_finder_query.clear();
            }
        }
        self.show_node_finder(ui, canvas_offset, input_escape, &mut output);

        if !output.is_empty() {
            ui.ctx().request_repaint();
        }
        output
    }

    fn draw_connections(&self, ui: &egui::Ui, graph: &FlowGraph, canvas_offset: Pos2) {
        for conn in &graph.connections {
            let Some(from_node) = graph.nodes.get(&conn.from_node) else {
                continue;
            };
            let Some(to_node) = graph.nodes.get(&conn.to_node) else {
                continue;
            };
            let Some(from) =
                self.port_screen_pos(from_node, &conn.from_port, false, canvas_offset)
            else {
                continue;
            };
            let Some(to) = self.port_screen_pos(to_node, &conn.to_port, true, canvas_offset)
            else {
                continue;
            };
            let color = from_node
                .outputs
                .iter()
                .find(|p| p.name == conn.from_port)
                .map(|p| utils::get_type_color(&p.data_type))
                .unwrap_or(Color32::WHITE);
            utils::draw_bezier(ui.painter(), from, to, color);
        }
    }

    fn draw_node(
        &mut self,
        ui: &mut egui::Ui,
        node: &mut Node,
        canvas_offset: Pos2,
        output: &mut EditorOutput,
    ) -> NodeEvents {
        let mut events = NodeEvents::default();
        let top_left = self.to_screen(Pos2::new(node.position.0, node.position.1), canvas_offset);
        let size = Vec2::new(node.size.0, node.size.1) * self.zoom;
        let node_rect = Rect::from_min_size(top_left, size);
        let header_rect = Rect::from_min_size(top_left, Vec2::new(size.x, HEADER_HEIGHT * self.zoom));

        let selected = self.selected_nodes.contains(&node.id);
        let painter = ui.painter();
        painter.rect_filled(node_rect, CornerRadius::same(6), Color32::from_gray(48));
        let category = crate::node_defs::category_for_type(&node.node_type);
        painter.rect_filled(
            header_rect,
            CornerRadius::same(6),
            self.style.header_color(category),
        );
        if selected {
            painter.rect_stroke(
                node_rect,
                CornerRadius::same(6),
                Stroke::new(2.0, Color32::from_rgb(255, 200, 60)),
                egui::StrokeKind::Outside,
            );
        }
        painter.text(
            header_rect.center(),
            egui::Align2::CENTER_CENTER,
            node.node_type.type_name(),
            egui::FontId::proportional(self.style.font_size * self.zoom),
            Color32::WHITE,
        );

        // Ports: dots plus labels, inputs on the left edge, outputs on the right
        for is_input in [true, false] {
            let ports = if is_input { &node.inputs } else { &node.outputs };
            for port in ports.iter() {
                let Some(pos) = self.port_screen_pos(node, &port.name, is_input, canvas_offset)
                else {
                    continue;
                };
                ui.painter()
                    .circle_filled(pos, 5.0 * self.zoom, utils::get_type_color(&port.data_type));
                let (anchor, align) = if is_input {
                    (pos + Vec2::new(10.0 * self.zoom, 0.0), egui::Align2::LEFT_CENTER)
                } else {
                    (pos - Vec2::new(10.0 * self.zoom, 0.0), egui::Align2::RIGHT_CENTER)
                };
                ui.painter().text(
                    anchor,
                    align,
                    &port.name,
                    egui::FontId::proportional((self.style.font_size - 2.0) * self.zoom),
                    Color32::LIGHT_GRAY,
                );

                // Enlarged hitbox while a connection is being dragged
                let hitbox = if self.connection_start.is_some() { 36.0 } else { 20.0 };
                let port_rect = Rect::from_center_size(pos, Vec2::splat(hitbox * self.zoom));
                let id = ui
                    .id()
                    .with(node.id)
                    .with(&port.name)
                    .with(if is_input { "in" } else { "out" });
                let response = ui.interact(port_rect, id, Sense::click_and_drag());
                if response.drag_started() || response.clicked() {
                    events.port_event = Some((node.id, port.name.clone(), is_input));
                }
                if response.hovered() && ui.input(|i| i.pointer.primary_released()) {
                    events.port_event = Some((node.id, port.name.clone(), is_input));
                }
            }
        }

        // Widget rows below the ports
        let port_rows = node.inputs.len().max(node.outputs.len()) as f32;
        let widgets_top =
            top_left.y + (HEADER_HEIGHT + port_rows * PORT_ROW_HEIGHT) * self.zoom;
        for widget_index in 0..node.widgets.len() {
            let row_rect = Rect::from_min_size(
                Pos2::new(
                    top_left.x + 8.0 * self.zoom,
                    widgets_top + widget_index as f32 * WIDGET_ROW_HEIGHT * self.zoom,
                ),
                Vec2::new(size.x - 16.0 * self.zoom, WIDGET_ROW_HEIGHT * self.zoom),
            );
            let changed = self.draw_widget(ui, node, widget_index, row_rect);
            if changed {
                output.widget_changes.push(WidgetChange {
                    node_id: node.id,
                    widget_name: node.widgets[widget_index].name.clone(),
                });
            }
        }

        // LoadImage preview under the widgets (egui_extras file loader)
        if node.node_type == NodeType::LoadImage {
            if let Some(path) = node.widget("path").and_then(|w| w.value.as_str()) {
                if !path.is_empty() {
                    let preview_rect = Rect::from_min_size(
                        Pos2::new(top_left.x, node_rect.max.y + 4.0 * self.zoom),
                        Vec2::new(size.x, 80.0 * self.zoom),
                    );
                    let mut preview_ui =
                        ui.new_child(egui::UiBuilder::new().max_rect(preview_rect));
                    preview_ui.add(
                        egui::Image::new(format!("file://{path}"))
                            .max_size(preview_rect.size())
                            .corner_radius(4.0),
                    );
                }
            }
        }

        // Node body interaction, shrunk horizontally so port hitboxes win
        let port_zone = 12.0 * self.zoom;
        let body_rect = Rect::from_min_max(
            node_rect.min + Vec2::new(port_zone, 0.0),
            node_rect.max - Vec2::new(port_zone, 0.0),
        );
        let response = ui.interact(
            body_rect,
            ui.id().with(node.id).with("node_bg"),
            Sense::click_and_drag(),
        );
        if response.drag_started() || response.clicked() {
            events.pressed = true;
        }
        events.drag_delta = response.drag_delta();

        events
    }

    /// Draw one widget control. Returns true when its value changed.
    fn draw_widget(
        &self,
        ui: &mut egui::Ui,
        node: &mut Node,
        widget_index: usize,
        rect: Rect,
    ) -> bool {
        let node_id = node.id;
        let widget = &mut node.widgets[widget_index];
        let mut changed = false;
        let mut row_ui = ui.new_child(egui::UiBuilder::new().max_rect(rect));
        row_ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(&widget.name)
                    .size((self.style.font_size - 2.0) * self.zoom)
                    .color(Color32::LIGHT_GRAY),
            );
            match &mut widget.value {
                WidgetValue::Integer(v) => {
                    let range = if widget.name == "input_count" {
                        INPUT_COUNT_MIN..=INPUT_COUNT_MAX
                    } else {
                        i64::MIN..=i64::MAX
                    };
                    if ui.add(egui::DragValue::new(v).range(range).speed(0.1)).changed() {
                        changed = true;
                    }
                }
                WidgetValue::Choice(v) => {
                    egui::ComboBox::from_id_salt((node_id, widget.name.clone()))
                        .selected_text(v.clone())
                        .show_ui(ui, |ui| {
                            for method in RESIZE_METHODS {
                                if ui.selectable_value(v, method.to_string(), *method).changed() {
                                    changed = true;
                                }
                            }
                        });
                }
                WidgetValue::Text(v) => {
                    if ui.add(egui::TextEdit::singleline(v).desired_width(f32::INFINITY)).changed()
                    {
                        changed = true;
                    }
                }
            }
        });
        changed
    }

    fn show_node_finder(
        &mut self,
        ui: &mut egui::Ui,
        canvas_offset: Pos2,
        input_escape: bool,
        output: &mut EditorOutput,
    ) {
        let Some(pos) = self.node_finder else {
            return;
        };
        let mut open = true;
        egui::Window::new("Add Node")
            .id(egui::Id::new("node_finder"))
            .fixed_pos(pos)
            .collapsible(false)
            .resizable(false)
            .title_bar(false)
            .open(&mut open)
            .show(ui.ctx(), |ui| {
                ui.text_edit_singleline(&mut self.node_finder_query)
                    .request_focus();
                let query = self.node_finder_query.to_lowercase();
                for node_type in NodeType::all() {
                    let name = node_type.type_name();
                    if !query.is_empty() && !name.to_lowercase().contains(&query) {
                        continue;
                    }
                    if ui.button(name).clicked() {
                        let graph_pos = self.from_screen(pos, canvas_offset);
                        output.spawn_requests.push(SpawnRequest {
                            node_type: node_type.clone(),
                            position: (graph_pos.x, graph_pos.y),
                        });
                        self.node_finder = None;
                    }
                }
            });
        if !open || input_escape {
            self.node_finder = None;
        }
    }
}

#[derive(Default)]
struct NodeEvents {
    drag_delta: Vec2,
    port_event: Option<(Uuid, String, bool)>,
    pressed: bool,
}
