mod editor;
mod executor;
mod extensions;
mod graph;
mod history;
mod node_defs;
mod node_types;
mod registry;

use chrono::Local;
use editor::GraphEditor;
use eframe::egui;
use executor::events::ExecutionEvent;
use executor::Interpreter;
use extensions::dynamic_inputs::DynamicInputs;
use extensions::ExtensionRegistry;
use graph::FlowGraph;
use history::UndoStack;
use node_types::NodeType;
use registry::{HookCtx, NodeRegistry};
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

fn main() -> eframe::Result<()> {
    env_logger::init();
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Image Flow",
        native_options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(MyApp::default()))
        }),
    )
}

#[derive(Serialize, Deserialize, Default)]
struct AppSettings {
    style: editor::EditorStyle,
    history_max_records: usize,
    #[serde(default)]
    last_script_name: Option<String>,
}

struct MyApp {
    graph: FlowGraph,
    editor: GraphEditor,
    extensions: ExtensionRegistry,
    registry: NodeRegistry,
    undo_stack: UndoStack,
    logs: Vec<String>,
    script_name: String,
    show_load_window: bool,
    log_receiver: Option<Receiver<ExecutionEvent>>,
    stop_handle: Option<Arc<AtomicBool>>,
}

impl Default for MyApp {
    fn default() -> Self {
        let mut extensions = ExtensionRegistry::default();
        extensions.register(Box::new(DynamicInputs::default()));
        let registry = NodeRegistry::with_defaults(&mut extensions);

        let mut app = Self {
            graph: FlowGraph::default(),
            editor: GraphEditor::default(),
            extensions,
            registry,
            undo_stack: UndoStack::default(),
            logs: Vec::new(),
            script_name: "pipeline".to_string(),
            show_load_window: false,
            log_receiver: None,
            stop_handle: None,
        };
        let _ = std::fs::create_dir_all("scripts");
        let script_loaded = app.load_settings();
        if !script_loaded {
            app.add_starter_nodes();
        }
        app
    }
}

impl MyApp {
    fn load_settings(&mut self) -> bool {
        if let Ok(json) = std::fs::read_to_string("settings.json") {
            if let Ok(settings) = serde_json::from_str::<AppSettings>(&json) {
                self.editor.style = settings.style;
                if settings.history_max_records > 0 {
                    self.undo_stack.max_records = settings.history_max_records;
                }
                self.logs.push("[System] Settings loaded.".to_string());

                if let Some(ref last_script) = settings.last_script_name {
                    if self.load_script(&last_script.clone()) {
                        self.logs
                            .push(format!("[System] Auto-loaded last script: {}", last_script));
                        return true;
                    }
                }
            }
        }
        false
    }

    fn save_settings(&self) {
        let settings = AppSettings {
            style: self.editor.style.clone(),
            history_max_records: self.undo_stack.max_records,
            last_script_name: Some(self.script_name.clone()),
        };
        if let Ok(json) = serde_json::to_string_pretty(&settings) {
            let _ = std::fs::write("settings.json", json);
        }
    }

    fn load_script(&mut self, name: &str) -> bool {
        let path = format!("scripts/{}.json", name);
        let Ok(json) = std::fs::read_to_string(&path) else {
            return false;
        };
        let Ok(graph) = serde_json::from_str::<FlowGraph>(&json) else {
            log::error!("Failed to parse script {}", path);
            return false;
        };
        self.graph = graph;
        self.script_name = name.to_string();
        self.editor.next_z_order = self
            .graph
            .nodes
            .values()
            .map(|n| n.z_order)
            .max()
            .unwrap_or(0)
            + 1;

        // Re-run creation hooks so extensions see deserialized nodes too.
        let mut ctx = HookCtx::default();
        let ids: Vec<_> = self.graph.nodes.keys().copied().collect();
        for id in ids {
            if let Some(node) = self.graph.nodes.get_mut(&id) {
                self.registry.node_created(node, &mut ctx);
            }
        }
        self.undo_stack = UndoStack::default();
        self.undo_stack.push(&self.graph);
        true
    }

    /// Seed a minimal pipeline on first launch.
    fn add_starter_nodes(&mut self) {
        let load = self.registry.instantiate(&NodeType::LoadImage, (100.0, 150.0));
        let batch = self.registry.instantiate(&NodeType::ImageBatch, (380.0, 120.0));
        let save = self.registry.instantiate(&NodeType::SaveImage, (680.0, 150.0));
        let (load_id, batch_id, save_id) = (load.id, batch.id, save.id);
        self.graph.nodes.insert(load_id, load);
        self.graph.nodes.insert(batch_id, batch);
        self.graph.nodes.insert(save_id, save);
        self.graph.connections.push(graph::Connection {
            from_node: load_id,
            from_port: "image".into(),
            to_node: batch_id,
            to_port: "image_1".into(),
        });
        self.graph.connections.push(graph::Connection {
            from_node: batch_id,
            from_port: "batched_images".into(),
            to_node: save_id,
            to_port: "images".into(),
        });
        self.undo_stack.push(&self.graph);
    }

    fn log_line(&mut self, msg: impl Into<String>) {
        let time = Local::now().format("%H:%M:%S");
        self.logs.push(format!("[{}] {}", time, msg.into()));
    }
}

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Extension timers (widget-ready polling)
        let mut hook_ctx = HookCtx::default();
        self.extensions
            .tick(&mut self.graph, Instant::now(), &mut hook_ctx);
        if hook_ctx.redraw_requested {
            self.graph.prune_connections();
            ctx.request_repaint();
        }
        // Extension retries and execution events both run on a 100ms cadence,
        // so frames must keep coming even when the user is idle.
        ctx.request_repaint_after(std::time::Duration::from_millis(100));

        // Drain execution events
        if let Some(rx) = &self.log_receiver {
            let mut finished = false;
            let mut drained = Vec::new();
            loop {
                match rx.try_recv() {
                    Ok(ExecutionEvent::Log(msg)) => drained.push(msg),
                    Ok(ExecutionEvent::NodeActive(id)) => log::debug!("Node active: {}", id),
                    Ok(ExecutionEvent::Finished) => finished = true,
                    Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                        finished = true;
                        break;
                    }
                    Err(std::sync::mpsc::TryRecvError::Empty) => break,
                }
            }
            for msg in drained {
                self.log_line(msg);
            }
            if finished {
                self.log_receiver = None;
                self.stop_handle = None;
                self.log_line("Execution finished");
            }
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Image Flow");
                ui.separator();
                if ui.button("Zoom In").clicked() {
                    self.editor.zoom = (self.editor.zoom * 1.1).clamp(0.1, 1.0);
                }
                if ui.button("Zoom Out").clicked() {
                    self.editor.zoom = (self.editor.zoom / 1.1).clamp(0.1, 1.0);
                }
                ui.separator();

                ui.label("Script:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.script_name).desired_width(120.0),
                );
                if ui.button("New").clicked() {
                    self.graph = FlowGraph::default();
                    self.script_name = "untitled".to_string();
                    self.undo_stack = UndoStack::default();
                    self.logs.push("[System] New script created.".to_string());
                }
                if ui.button("Save").clicked() {
                    if let Ok(json) = serde_json::to_string(&self.graph) {
                        let name = self.script_name.trim_end_matches(".json").to_string();
                        let _ = std::fs::write(format!("scripts/{}.json", name), json);
                        self.save_settings();
                        self.log_line(format!("Saved scripts/{}.json", name));
                    }
                }
                if ui.button("Load").clicked() {
                    self.show_load_window = !self.show_load_window;
                }

                ui.separator();
                if ui.button("▶ Run").clicked() && self.log_receiver.is_none() {
                    log::info!("Running graph (async)...");
                    let (rx, stop_handle) = Interpreter::run_async_with_stop(&self.graph);
                    self.log_receiver = Some(rx);
                    self.stop_handle = Some(stop_handle);
                }
                if self.stop_handle.is_some() {
                    if ui
                        .button(egui::RichText::new("⏹ Stop").color(egui::Color32::RED))
                        .clicked()
                    {
                        if let Some(ref handle) = self.stop_handle {
                            handle.store(true, std::sync::atomic::Ordering::Relaxed);
                            self.log_line("Force stop requested");
                        }
                        self.stop_handle = None;
                    }
                }
            });
        });

        // Load Script window
        let mut show_load_window = self.show_load_window;
        let mut picked_script = None;
        if show_load_window {
            egui::Window::new("Load Script")
                .open(&mut show_load_window)
                .show(ctx, |ui| {
                    if let Ok(entries) = std::fs::read_dir("scripts") {
                        for entry in entries.flatten() {
                            if let Ok(name) = entry.file_name().into_string() {
                                if let Some(stem) = name.strip_suffix(".json") {
                                    if ui.button(stem).clicked() {
                                        picked_script = Some(stem.to_string());
                                    }
                                }
                            }
                        }
                    }
                });
        }
        self.show_load_window = show_load_window;
        if let Some(name) = picked_script {
            if self.load_script(&name) {
                self.log_line(format!("Loaded {}", name));
                self.show_load_window = false;
            }
        }

        // Output Log window
        egui::Window::new("Output Log")
            .resizable(true)
            .collapsible(true)
            .default_width(500.0)
            .default_height(180.0)
            .anchor(egui::Align2::LEFT_BOTTOM, egui::vec2(10.0, -10.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Clear").clicked() {
                        self.logs.clear();
                    }
                    ui.separator();
                    if ui
                        .button("📁 Export")
                        .on_hover_text("Export to scripts/logs/")
                        .clicked()
                    {
                        let _ = std::fs::create_dir_all("scripts/logs");
                        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
                        let filename = format!("scripts/logs/log_{}.txt", timestamp);
                        match std::fs::write(&filename, self.logs.join("\n")) {
                            Ok(_) => self.logs.push(format!("[System] Exported to {}", filename)),
                            Err(e) => self.logs.push(format!("[Error] Export failed: {}", e)),
                        }
                    }
                    if ui
                        .button("🖥 Desktop")
                        .on_hover_text("Export to Desktop")
                        .clicked()
                    {
                        if let Some(home) = dirs::home_dir() {
                            let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
                            let filename = home
                                .join("Desktop")
                                .join(format!("imageflow_log_{}.txt", timestamp));
                            match std::fs::write(&filename, self.logs.join("\n")) {
                                Ok(_) => {
                                    self.logs.push(format!("[System] Exported to {:?}", filename))
                                }
                                Err(e) => self.logs.push(format!("[Error] Export failed: {}", e)),
                            }
                        } else {
                            self.logs
                                .push("[Error] Could not find home directory".to_string());
                        }
                    }
                    ui.separator();
                    ui.label(format!("Count: {}", self.logs.len()));
                });
                ui.separator();
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        for log in &self.logs {
                            ui.label(log);
                        }
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            // Undo / redo
            if ui.input(|i| i.modifiers.command && !i.modifiers.shift && i.key_pressed(egui::Key::Z))
            {
                if let Some(prev) = self.undo_stack.undo() {
                    self.graph = prev;
                }
            }
            if ui.input(|i| {
                (i.modifiers.command && i.key_pressed(egui::Key::Y))
                    || (i.modifiers.command
                        && i.modifiers.shift
                        && i.key_pressed(egui::Key::Z))
            }) {
                if let Some(next) = self.undo_stack.redo() {
                    self.graph = next;
                }
            }

            let output = self.editor.show(ui, &mut self.graph);

            // Node spawns go through the registry so creation hooks run
            for spawn in output.spawn_requests {
                let mut node = self.registry.instantiate(&spawn.node_type, spawn.position);
                node.z_order = self.editor.next_z_order;
                self.editor.next_z_order += 1;
                self.log_line(format!("Added {} node", node.node_type.type_name()));
                self.graph.nodes.insert(node.id, node);
                self.undo_stack.push(&self.graph);
            }

            // Widget edits dispatch to the per-type widget hooks
            let mut hook_ctx = HookCtx::default();
            let had_widget_changes = !output.widget_changes.is_empty();
            for change in output.widget_changes {
                if let Some(node) = self.graph.nodes.get_mut(&change.node_id) {
                    self.registry
                        .widget_changed(node, &change.widget_name, &mut hook_ctx);
                }
            }
            if had_widget_changes {
                // Port lists may have shrunk; edges into removed ports go too
                self.graph.prune_connections();
                self.undo_stack.push(&self.graph);
            }
            if hook_ctx.redraw_requested {
                ui.ctx().request_repaint();
            }

            if output.graph_changed {
                self.undo_stack.push(&self.graph);
            }
        });
    }
}
