//! The codec adapter: AVIF in, WebP out.
//!
//! Decoding goes through the `image` crate (dav1d under the hood), encoding
//! through libwebp. The WebP settings are fixed: lossy at quality 80, the
//! libwebp/sharp default. Callers cannot tune them.

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::ConversionError;

/// Fixed lossy WebP quality.
pub const WEBP_QUALITY: f32 = 80.0;

/// Converts one encoded image into WebP bytes.
///
/// Implementations are CPU bound and synchronous; the pipeline runs them on
/// tokio's blocking pool.
pub trait Codec: Send + Sync + 'static {
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError>;
}

/// The production codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct AvifToWebp;

impl Codec for AvifToWebp {
    fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let image = image::load_from_memory_with_format(input, ImageFormat::Avif)
            .map_err(|e| ConversionError::codec(format!("avif decode: {e}")))?;
        debug!(width = image.width(), height = image.height(), "decoded avif");
        encode_webp(&image)
    }
}

fn encode_webp(image: &DynamicImage) -> Result<Vec<u8>, ConversionError> {
    let (width, height) = (image.width(), image.height());
    let encoded = if image.color().has_alpha() {
        let rgba = image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), width, height).encode_simple(false, WEBP_QUALITY)
    } else {
        let rgb = image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), width, height).encode_simple(false, WEBP_QUALITY)
    };
    let memory = encoded.map_err(|e| ConversionError::codec(format!("webp encode: {e:?}")))?;
    Ok(memory.to_vec())
}

#[cfg(test)]
mod tests {
    use image::codecs::avif::AvifEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;
    use crate::error::ErrorKind;

    fn avif_rgb(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 128]));
        let mut out = Vec::new();
        AvifEncoder::new_with_speed_quality(&mut out, 10, 80)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    fn avif_rgba(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, _| Rgba([200, 10, 10, (x * 20) as u8]));
        let mut out = Vec::new();
        AvifEncoder::new_with_speed_quality(&mut out, 10, 80)
            .write_image(img.as_raw(), width, height, ExtendedColorType::Rgba8)
            .unwrap();
        out
    }

    fn decode_webp(bytes: &[u8]) -> DynamicImage {
        image::load_from_memory_with_format(bytes, ImageFormat::WebP).unwrap()
    }

    #[test]
    fn converts_opaque_avif() {
        let webp = AvifToWebp.convert(&avif_rgb(16, 12)).unwrap();
        assert_eq!(&webp[..4], b"RIFF");
        assert_eq!(&webp[8..12], b"WEBP");
        let decoded = decode_webp(&webp);
        assert_eq!((decoded.width(), decoded.height()), (16, 12));
    }

    #[test]
    fn keeps_alpha_channel() {
        let webp = AvifToWebp.convert(&avif_rgba(10, 6)).unwrap();
        let decoded = decode_webp(&webp);
        assert_eq!((decoded.width(), decoded.height()), (10, 6));
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn garbage_is_a_codec_failure() {
        let err = AvifToWebp.convert(b"definitely not an avif").unwrap_err();
        assert_eq!(err.kind, ErrorKind::CodecFailure);
        assert!(err.detail.unwrap().starts_with("avif decode:"));
    }

    #[test]
    fn other_formats_are_not_accepted_as_avif() {
        let mut webp = Vec::new();
        image::codecs::webp::WebPEncoder::new_lossless(&mut webp)
            .write_image(&[0u8; 12], 2, 2, ExtendedColorType::Rgb8)
            .unwrap();
        let err = AvifToWebp.convert(&webp).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CodecFailure);
    }
}
