//! Testing utilities for Annolog workspace
//!
//! Shared fixtures: sample arrays, raw annotation layers, encoded images and
//! in-memory destinations.

#![allow(missing_docs, clippy::missing_panics_doc, clippy::cast_precision_loss)]

use annolog_artifact::{Artifact, MemoryStore, Run};
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::{ArrayD, IxDyn};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::Arc;

/// Samples rising evenly from 0.0 to 1.0 across the array
pub fn gradient(shape: &[usize]) -> ArrayD<f64> {
    let len: usize = shape.iter().product();
    let last = len.saturating_sub(1).max(1) as f64;
    let values = (0..len).map(|i| i as f64 / last).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
}

/// All-black array of the given shape
pub fn zeros(shape: &[usize]) -> ArrayD<f64> {
    ArrayD::zeros(IxDyn(shape))
}

/// Raw box layer with one corner box per class, each scored under `confidence`
pub fn raw_box_layer(classes: &[(u32, &str)]) -> Value {
    let boxes: Vec<Value> = classes
        .iter()
        .map(|(id, _)| {
            json!({
                "position": { "minX": 0.1, "maxX": 0.4, "minY": 0.2, "maxY": 0.6 },
                "class_id": id,
                "box_caption": format!("box {id}"),
                "scores": { "confidence": 0.9 }
            })
        })
        .collect();
    json!({ "box_data": boxes, "class_labels": label_map(classes) })
}

/// Raw box layer without layer-level class labels
pub fn raw_unlabeled_box_layer(class_id: u32) -> Value {
    json!({
        "box_data": [{
            "position": { "middle": [0.5, 0.5], "width": 0.25, "height": 0.25 },
            "class_id": class_id
        }]
    })
}

/// Raw `rows x cols` mask cycling through the given class ids
pub fn raw_mask_layer(rows: usize, cols: usize, classes: &[(u32, &str)]) -> Value {
    let ids: Vec<u32> = classes.iter().map(|(id, _)| *id).collect();
    let data: Vec<Vec<u32>> = (0..rows)
        .map(|r| {
            (0..cols)
                .map(|c| if ids.is_empty() { 0 } else { ids[(r * cols + c) % ids.len()] })
                .collect()
        })
        .collect();
    json!({ "mask_data": data, "class_labels": label_map(classes) })
}

/// `{id: name}` object
pub fn label_map(classes: &[(u32, &str)]) -> Value {
    Value::Object(
        classes
            .iter()
            .map(|(id, name)| (id.to_string(), Value::String((*name).to_string())))
            .collect(),
    )
}

/// Solid-color RGB image encoded in `format`
pub fn encoded_rgb(width: u32, height: u32, rgb: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb(rgb)));
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Solid-color PNG
pub fn png_bytes(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    encoded_rgb(width, height, rgb, ImageFormat::Png)
}

/// Run backed by a fresh in-memory store, plus the store itself
pub fn memory_run(id: &str) -> (Run, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (Run::new(id, store.clone()), store)
}

/// Artifact backed by a fresh in-memory store
pub fn memory_artifact(name: &str) -> Artifact {
    Artifact::new(name, Arc::new(MemoryStore::new()))
}
