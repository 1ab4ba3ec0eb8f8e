//! Image normalisation: raw media part → base64 payload for the vision API.
//!
//! Vision APIs (OpenAI, Anthropic, Gemini) accept images as base64 data-URIs
//! embedded in the JSON request body, but only in web formats. Word archives
//! carry whatever the author pasted: PNG and JPEG mostly, but also BMP and
//! TIFF from old clipboards, GIF, and vector EMF/WMF from charts.
//!
//! PNG and JPEG pass through byte-for-byte — re-compressing them wastes CPU
//! and, for JPEG, quality. Other raster formats are decoded and re-encoded
//! as PNG (lossless, universally accepted). Vector formats the `image`
//! crate cannot decode surface as an error; the annotator turns that into a
//! placeholder description rather than failing the document.

use crate::oracle::ImagePayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Normalise one media part to a payload the vision API accepts.
pub fn prepare_image(bytes: &[u8]) -> Result<ImagePayload, image::ImageError> {
    let format = image::guess_format(bytes)?;

    if let Some(mime) = passthrough_mime(format) {
        let b64 = STANDARD.encode(bytes);
        debug!("Pass-through {format:?} image → {} bytes base64", b64.len());
        return Ok(ImagePayload {
            base64: b64,
            mime_type: mime.to_string(),
        });
    }

    let img = image::load_from_memory(bytes)?;
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    let b64 = STANDARD.encode(&buf);
    debug!("Re-encoded {format:?} image → {} bytes base64 PNG", b64.len());

    Ok(ImagePayload {
        base64: b64,
        mime_type: "image/png".to_string(),
    })
}

fn passthrough_mime(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([0, 128, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn png_passes_through_unchanged() {
        let bytes = png_bytes();
        let payload = prepare_image(&bytes).expect("prepare");
        assert_eq!(payload.mime_type, "image/png");
        let decoded = STANDARD.decode(&payload.base64).expect("valid base64");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn bmp_is_reencoded_to_png() {
        let img =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255])));
        let mut bmp = Vec::new();
        img.write_to(&mut Cursor::new(&mut bmp), ImageFormat::Bmp)
            .expect("encode bmp");

        let payload = prepare_image(&bmp).expect("prepare");
        assert_eq!(payload.mime_type, "image/png");
        let decoded = STANDARD.decode(&payload.base64).expect("valid base64");
        assert_eq!(
            image::guess_format(&decoded).expect("sniff"),
            ImageFormat::Png
        );
    }

    #[test]
    fn vector_formats_error_out() {
        // EMF magic; the image crate has no decoder for it.
        let emf = [0x01u8, 0x00, 0x00, 0x00, 0x6C, 0x00, 0x00, 0x00];
        assert!(prepare_image(&emf).is_err());
    }
}
