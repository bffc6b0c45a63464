//! Local transform engine: deterministic, offline JPEG re-encode.
//!
//! Decodes the source to a pixel surface, re-encodes through mozjpeg at the
//! requested quality, and reports size deltas. Never fails on valid image
//! input; decoder/encoder errors on corrupt data are terminal for the
//! attempt.

use bytes::Bytes;

use lamaimage_core::{CompressionMetrics, TransformOutput};

use crate::classify::TransformError;

/// Valid quality range for the compressor.
pub const MIN_QUALITY: u8 = 5;
pub const MAX_QUALITY: u8 = 95;

/// Offline image compressor.
pub struct CompressEngine;

impl CompressEngine {
    /// Re-encode `data` as JPEG at `quality` (clamped to [5, 95]).
    ///
    /// The metrics' reduction ratio may be zero or negative when the
    /// re-encode grows the file; callers treat that as "no gain".
    pub fn compress(data: &[u8], quality: u8) -> Result<TransformOutput, TransformError> {
        let quality = quality.clamp(MIN_QUALITY, MAX_QUALITY);
        let original_size = data.len() as u64;

        let img = image::load_from_memory(data)
            .map_err(|e| TransformError::transient(format!("Failed to decode image: {}", e)))?;
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp
            .start_compress(Vec::new())
            .map_err(|e| TransformError::transient(format!("JPEG encode failed: {}", e)))?;
        comp.write_scanlines(&rgb_img)
            .map_err(|e| TransformError::transient(format!("JPEG encode failed: {}", e)))?;
        let jpeg_data = comp
            .finish()
            .map_err(|e| TransformError::transient(format!("JPEG encode failed: {}", e)))?;

        let metrics = CompressionMetrics::compute(original_size, jpeg_data.len() as u64);
        tracing::debug!(
            quality,
            original_size = metrics.original_size,
            result_size = metrics.result_size,
            reduction_ratio = metrics.reduction_ratio,
            "compressed image"
        );

        Ok(TransformOutput::new(jpeg_data, "image/jpeg").with_metrics(metrics))
    }

    /// Async wrapper moving the CPU-bound re-encode off the reactor.
    pub async fn compress_async(data: Bytes, quality: u8) -> Result<TransformOutput, TransformError> {
        tokio::task::spawn_blocking(move || Self::compress(&data, quality))
            .await
            .map_err(|e| TransformError::transient(format!("Compression task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::io::Cursor;

    /// A noisy test image that PNG compresses poorly, so the JPEG re-encode
    /// reliably shrinks it.
    fn noisy_png(width: u32, height: u32) -> Vec<u8> {
        let mut img = RgbImage::new(width, height);
        let mut state: u32 = 0x2545_F491;
        for y in 0..height {
            for x in 0..width {
                // xorshift for deterministic noise
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                let b = state.to_le_bytes();
                img.put_pixel(x, y, Rgb([b[0], b[1], b[2]]));
            }
        }
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_compress_shrinks_noisy_input() {
        let input = noisy_png(128, 128);
        let output = CompressEngine::compress(&input, 80).unwrap();
        let metrics = output.metrics.unwrap();

        assert_eq!(metrics.original_size, input.len() as u64);
        assert!(metrics.result_size < metrics.original_size);
        assert!((0..100).contains(&metrics.reduction_ratio));
        assert_eq!(output.content_type, "image/jpeg");
    }

    #[test]
    fn test_output_is_valid_jpeg() {
        let input = noisy_png(64, 64);
        let output = CompressEngine::compress(&input, 60).unwrap();
        let decoded = image::load_from_memory(&output.data).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 64);
    }

    #[test]
    fn test_quality_is_clamped() {
        let input = noisy_png(32, 32);
        // Out-of-range values clamp instead of erroring.
        assert!(CompressEngine::compress(&input, 0).is_ok());
        assert!(CompressEngine::compress(&input, 100).is_ok());
    }

    #[test]
    fn test_corrupt_input_is_terminal() {
        let err = CompressEngine::compress(b"not an image", 80).unwrap_err();
        assert_eq!(err.kind, crate::classify::TransformErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_compress_async() {
        let input = noisy_png(32, 32);
        let output = CompressEngine::compress_async(Bytes::from(input), 80)
            .await
            .unwrap();
        assert!(output.metrics.is_some());
    }
}
