//! Default port and widget definitions for each node type.
//!
//! The seeded `image_1`/`image_2` inputs on ImageBatch match its
//! `input_count` default of 2; past that the dynamic-inputs extension keeps
//! the port list in lockstep with the widget.

use crate::graph::{Port, Widget, WidgetValue};
use crate::node_types::{DataType, NodeType};

pub const INPUT_COUNT_DEFAULT: i64 = 2;
pub const INPUT_COUNT_MIN: i64 = 1;
pub const INPUT_COUNT_MAX: i64 = 20;

pub fn ports_for_type(node_type: &NodeType) -> (Vec<Port>, Vec<Port>) {
    match node_type {
        NodeType::LoadImage => (
            vec![],
            vec![Port {
                name: "image".into(),
                data_type: DataType::Image,
            }],
        ),
        NodeType::ImageBatch => (
            vec![
                Port {
                    name: "image_1".into(),
                    data_type: DataType::Image,
                },
                Port {
                    name: "image_2".into(),
                    data_type: DataType::Image,
                },
            ],
            vec![Port {
                name: "batched_images".into(),
                data_type: DataType::Image,
            }],
        ),
        NodeType::SaveImage => (
            vec![Port {
                name: "images".into(),
                data_type: DataType::Image,
            }],
            vec![],
        ),
    }
}

pub fn widgets_for_type(node_type: &NodeType) -> Vec<Widget> {
    match node_type {
        NodeType::LoadImage => vec![Widget {
            name: "path".into(),
            value: WidgetValue::Text(String::new()),
        }],
        NodeType::ImageBatch => vec![
            Widget {
                name: "input_count".into(),
                value: WidgetValue::Integer(INPUT_COUNT_DEFAULT),
            },
            Widget {
                name: "method".into(),
                value: WidgetValue::Choice("lanczos".into()),
            },
        ],
        NodeType::SaveImage => vec![Widget {
            name: "path".into(),
            value: WidgetValue::Text("output".into()),
        }],
    }
}

pub fn category_for_type(node_type: &NodeType) -> &'static str {
    match node_type {
        NodeType::LoadImage | NodeType::SaveImage => "IO",
        NodeType::ImageBatch => "Image",
    }
}
