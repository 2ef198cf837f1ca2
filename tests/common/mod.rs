#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use labelship::ir::{PixelBuffer, PixelLayout};

/// A small RGB gradient, varied by `seed` so different seeds give different bytes.
pub fn rgb_pixels(width: u32, height: u32, seed: u8) -> Vec<u8> {
    (0..width * height * 3)
        .map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed))
        .collect()
}

pub fn pixel_buffer(width: u32, height: u32, seed: u8) -> PixelBuffer {
    PixelBuffer::new(width, height, PixelLayout::Rgb8, rgb_pixels(width, height, seed))
        .expect("pixel buffer")
}

pub fn jpeg_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .encode(
            &rgb_pixels(width, height, seed),
            width,
            height,
            ExtendedColorType::Rgb8,
        )
        .expect("encode jpeg");
    out
}

pub fn write_jpeg(path: &Path, width: u32, height: u32, seed: u8) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, jpeg_bytes(width, height, seed)).expect("write jpeg file");
}

/// Writes `count` JPEGs named `img000.jpg`.. under `dir/images` and a JSON
/// Lines file at `dir/samples.jsonl` giving each one a single box of `label`.
pub fn write_jsonl_dataset(dir: &Path, count: usize, label: &str) -> std::path::PathBuf {
    let mut lines = String::new();
    for i in 0..count {
        let name = format!("img{i:03}.jpg");
        write_jpeg(&dir.join("images").join(&name), 8, 8, i as u8);
        lines.push_str(&format!(
            "{{\"image\": \"images/{name}\", \"detections\": [{{\"label\": \"{label}\", \"bbox\": [0.1, 0.2, 0.3, 0.4]}}]}}\n"
        ));
    }
    let path = dir.join("samples.jsonl");
    fs::write(&path, lines).expect("write jsonl");
    path
}

/// Manifest rows as `(split, image, label)` triples, in file order.
pub fn manifest_triples(csv: &str) -> Vec<(String, String, String)> {
    csv.lines()
        .filter(|l| !l.is_empty())
        .map(|line| {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 11, "manifest row '{line}' must have 11 fields");
            (
                fields[0].to_string(),
                fields[1].to_string(),
                fields[2].to_string(),
            )
        })
        .collect()
}
