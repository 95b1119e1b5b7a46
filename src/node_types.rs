use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum DataType {
    Image,
    Integer,
    Text,
    Custom(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum NodeType {
    LoadImage,
    ImageBatch,
    SaveImage,
}

impl NodeType {
    /// Stable name used for registry lookup and node headers.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeType::LoadImage => "LoadImage",
            NodeType::ImageBatch => "ImageBatch",
            NodeType::SaveImage => "SaveImage",
        }
    }

    pub fn all() -> &'static [NodeType] {
        &[NodeType::LoadImage, NodeType::ImageBatch, NodeType::SaveImage]
    }
}

/// Valid resize methods for the ImageBatch `method` widget.
pub const RESIZE_METHODS: &[&str] = &["lanczos", "nearest", "linear", "bilinear", "bicubic"];
