//! Base64 data URL decoding and PNG/JPEG encoding.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

use crate::error::{InksealError, Operation, Result};

/// JPEG quality for generated data URLs.
pub const JPEG_QUALITY: u8 = 95;

/// Drop a `data:<mime>;base64,` header if present.
pub fn strip_data_url(data: &str) -> &str {
    match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    }
}

/// Decode a base64 payload, with or without a data URL header.
pub fn decode_base64(data: &str, operation: Operation) -> Result<Vec<u8>> {
    let payload: String = strip_data_url(data)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(payload.as_bytes())
        .map_err(|e| InksealError::decode(operation, format!("invalid base64: {}", e)))
}

/// Decode an image from a base64 payload or data URL.
pub fn decode_image(data: &str, operation: Operation) -> Result<DynamicImage> {
    let bytes = decode_base64(data, operation)?;
    decode_image_bytes(&bytes, operation)
}

/// Decode an image from raw encoded bytes, guessing the format.
pub fn decode_image_bytes(bytes: &[u8], operation: Operation) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|e| InksealError::decode(operation, e))
}

/// Lossless PNG bytes.
pub fn encode_png(image: &DynamicImage, operation: Operation) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| InksealError::processing(operation, "encode", e))?;
    Ok(buffer)
}

/// JPEG bytes at [`JPEG_QUALITY`].
pub fn encode_jpeg(image: &RgbImage, operation: Operation) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    image
        .write_with_encoder(encoder)
        .map_err(|e| InksealError::processing(operation, "encode", e))?;
    Ok(buffer)
}

/// Wrap encoded bytes in a `data:<mime>;base64,` URL.
pub fn to_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// RGBA image as a PNG data URL.
pub fn png_data_url(image: &RgbaImage, operation: Operation) -> Result<String> {
    let bytes = encode_png(&DynamicImage::ImageRgba8(image.clone()), operation)?;
    Ok(to_data_url("image/png", &bytes))
}

/// RGB image as a JPEG data URL.
pub fn jpeg_data_url(image: &RgbImage, operation: Operation) -> Result<String> {
    let bytes = encode_jpeg(image, operation)?;
    Ok(to_data_url("image/jpeg", &bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_strip_data_url() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn test_png_data_url_decodes_to_same_pixels() {
        let mut img = RgbaImage::new(3, 2);
        img.put_pixel(1, 1, Rgba([10, 20, 30, 128]));

        let url = png_data_url(&img, Operation::ProcessSignature).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let decoded = decode_image(&url, Operation::ProcessSignature).unwrap().to_rgba8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn test_malformed_base64_is_decode_error() {
        let err = decode_image("data:image/png;base64,@@@not base64@@@", Operation::SaveBase64Image)
            .unwrap_err();
        assert!(matches!(err, InksealError::Decode { operation: Operation::SaveBase64Image, .. }));

        let not_an_image = STANDARD.encode(b"hello world");
        assert!(matches!(
            decode_image(&not_an_image, Operation::ApplyOverlay),
            Err(InksealError::Decode { .. })
        ));
    }

    #[test]
    fn test_jpeg_data_url_has_jpeg_mime() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([255, 255, 255]));
        let url = jpeg_data_url(&img, Operation::ProcessSignature).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        let decoded = decode_image(&url, Operation::ProcessSignature).unwrap();
        assert!(!decoded.color().has_alpha());
    }
}
