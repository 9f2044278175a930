use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use tokio::task;
use tracing::debug;

use crate::error::{ChatError, Result};

/// A JPEG ready for upload
#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
}

/// Downscale `raw` so its longer edge is at most `max_edge` and re-encode it
/// as JPEG at `quality` (1-100).
///
/// Images already within bounds are re-encoded at their original size; they
/// are never upscaled.
pub async fn resize_to_jpeg(raw: Vec<u8>, max_edge: u32, quality: u8) -> Result<ResizedImage> {
    // Decoding and encoding are CPU bound
    task::spawn_blocking(move || encode_blocking(&raw, max_edge, quality))
        .await
        .map_err(|e| ChatError::ImageProcessing(format!("resize task failed: {}", e)))?
}

fn encode_blocking(raw: &[u8], max_edge: u32, quality: u8) -> Result<ResizedImage> {
    let img = image::load_from_memory(raw)
        .map_err(|e| ChatError::ImageProcessing(format!("failed to decode image: {}", e)))?;

    let max_edge = max_edge.max(1);
    let img = if img.width() > max_edge || img.height() > max_edge {
        img.resize(max_edge, max_edge, FilterType::Triangle)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|e| ChatError::ImageProcessing(format!("failed to encode JPEG: {}", e)))?;

    debug!(
        "Encoded {}x{} JPEG ({} bytes)",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(ResizedImage {
        bytes: Bytes::from(buf),
        width: rgb.width(),
        height: rgb.height(),
    })
}
