//! Geometry and color helpers for the graph editor.

use crate::node_types::DataType;
use egui::epaint::CubicBezierShape;
use egui::{Color32, Painter, Pos2, Stroke, Vec2};

/// Display color for a data type's port dot and connection line.
pub fn get_type_color(dt: &DataType) -> Color32 {
    match dt {
        DataType::Image => Color32::from_rgb(120, 180, 255),
        DataType::Integer => Color32::LIGHT_BLUE,
        DataType::Text => Color32::KHAKI,
        DataType::Custom(_) => Color32::GRAY,
    }
}

/// Draw a horizontal-tangent bezier between two port positions.
pub fn draw_bezier(painter: &Painter, from: Pos2, to: Pos2, color: Color32) {
    let dist = (to.x - from.x).abs().max(40.0) * 0.5;
    let c1 = from + Vec2::new(dist, 0.0);
    let c2 = to - Vec2::new(dist, 0.0);
    painter.add(CubicBezierShape::from_points_stroke(
        [from, c1, c2, to],
        false,
        Color32::TRANSPARENT,
        Stroke::new(2.0, color),
    ));
}
