//! Batch assembly: resize every incoming frame to the first frame's
//! dimensions and concatenate along the batch axis.

use anyhow::{bail, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use rayon::prelude::*;

/// Map a `method` widget value to a resize filter. Unknown values fall back
/// to lanczos, the widget default.
pub fn filter_for_method(method: &str) -> FilterType {
    match method {
        "nearest" => FilterType::Nearest,
        "linear" | "bilinear" => FilterType::Triangle,
        "bicubic" => FilterType::CatmullRom,
        _ => FilterType::Lanczos3,
    }
}

/// Concatenate the input sequences into one batch. The first frame of the
/// first input fixes the target dimensions; every other frame is resized to
/// match.
pub fn batch_frames(inputs: Vec<Vec<RgbaImage>>, method: &str) -> Result<Vec<RgbaImage>> {
    let frames: Vec<RgbaImage> = inputs.into_iter().flatten().collect();
    let Some(first) = frames.first() else {
        bail!("No valid images to batch");
    };
    let (target_w, target_h) = (first.width(), first.height());
    if target_w == 0 || target_h == 0 {
        bail!("First image has zero size ({target_w}x{target_h})");
    }

    let filter = filter_for_method(method);
    let batched: Vec<RgbaImage> = frames
        .into_par_iter()
        .map(|frame| {
            if frame.width() == target_w && frame.height() == target_h {
                frame
            } else {
                imageops::resize(&frame, target_w, target_h, filter)
            }
        })
        .collect();
    Ok(batched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, image::Rgba([value, value, value, 255]))
    }

    #[test]
    fn frames_are_resized_to_the_first_frame() {
        let inputs = vec![vec![frame(8, 8, 10)], vec![frame(4, 2, 20)], vec![frame(16, 16, 30)]];
        let batched = batch_frames(inputs, "nearest").unwrap();
        assert_eq!(batched.len(), 3);
        for b in &batched {
            assert_eq!((b.width(), b.height()), (8, 8));
        }
    }

    #[test]
    fn already_batched_inputs_are_flattened_in_order() {
        let inputs = vec![vec![frame(4, 4, 1), frame(4, 4, 2)], vec![frame(4, 4, 3)]];
        let batched = batch_frames(inputs, "lanczos").unwrap();
        let values: Vec<u8> = batched.iter().map(|b| b.get_pixel(0, 0)[0]).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(batch_frames(vec![], "lanczos").is_err());
        assert!(batch_frames(vec![vec![]], "lanczos").is_err());
    }

    #[test]
    fn every_widget_method_maps_to_a_filter() {
        use crate::node_types::RESIZE_METHODS;
        for method in RESIZE_METHODS {
            // No panic and a stable mapping; lanczos is the catch-all.
            let _ = filter_for_method(method);
        }
        assert!(matches!(filter_for_method("nearest"), FilterType::Nearest));
        assert!(matches!(filter_for_method("bogus"), FilterType::Lanczos3));
    }
}
