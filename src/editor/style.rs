//! Editor styling.

use egui::Color32;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Visual styling configuration for the graph editor.
#[derive(Clone, Serialize, Deserialize)]
pub struct EditorStyle {
    pub header_colors: HashMap<String, Color32>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_font_size() -> f32 {
    14.0
}

impl Default for EditorStyle {
    fn default() -> Self {
        let mut map = HashMap::new();
        map.insert("IO".into(), Color32::from_rgb(100, 150, 200));
        map.insert("Image".into(), Color32::from_rgb(200, 50, 150));
        map.insert("Default".into(), Color32::from_rgb(100, 100, 100));
        Self {
            header_colors: map,
            font_size: 14.0,
        }
    }
}

impl EditorStyle {
    pub fn header_color(&self, category: &str) -> Color32 {
        self.header_colors
            .get(category)
            .or_else(|| self.header_colors.get("Default"))
            .copied()
            .unwrap_or(Color32::from_rgb(100, 100, 100))
    }
}
