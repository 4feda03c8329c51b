//! PDF payload support shared by the engine adapters.
//!
//! Scanned claim documents often arrive as PDFs. Born-digital PDFs carry their
//! text directly; scanned ones carry page images that are handed to an engine.

use crate::error::OcrError;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Document, Object, Stream};

/// Minimum embedded text length before we trust it over OCR
const MIN_EMBEDDED_TEXT_LEN: usize = 10;

/// Confidence reported for text taken straight from the PDF (0-100)
pub const EMBEDDED_TEXT_CONFIDENCE: f32 = 95.0;

/// Check the `%PDF-` magic bytes
pub fn is_pdf(data: &[u8]) -> bool {
    data.starts_with(b"%PDF-")
}

/// Text embedded in the PDF, if there is enough of it to be meaningful
pub fn embedded_text(data: &[u8]) -> Result<Option<String>, OcrError> {
    let text = pdf_extract::extract_text_from_mem(data)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to parse PDF: {}", e)))?;

    let trimmed = text.trim();
    if trimmed.len() > MIN_EMBEDDED_TEXT_LEN {
        tracing::info!("Extracted {} chars of text directly from PDF", trimmed.len());
        Ok(Some(trimmed.to_string()))
    } else {
        Ok(None)
    }
}

/// Decode every image XObject in the PDF. Images that cannot be decoded are
/// skipped with a warning.
pub fn page_images(data: &[u8]) -> Result<Vec<DynamicImage>, OcrError> {
    let doc = Document::load_mem(data)
        .map_err(|e| OcrError::ProcessingError(format!("Failed to load PDF: {}", e)))?;

    let mut images = Vec::new();
    for (object_id, object) in doc.objects.iter() {
        let Ok(stream) = object.as_stream() else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .and_then(Object::as_name)
            .map(|name| name == b"Image")
            .unwrap_or(false);
        if !is_image {
            continue;
        }

        match decode_image_stream(&doc, stream) {
            Ok(img) => images.push(img),
            Err(e) => tracing::warn!("Skipping PDF image {:?}: {}", object_id, e),
        }
    }

    Ok(images)
}

fn dict_int(stream: &Stream, key: &[u8]) -> Option<i64> {
    stream.dict.get(key).ok().and_then(|v| v.as_i64().ok())
}

fn decode_image_stream(doc: &Document, stream: &Stream) -> Result<DynamicImage, OcrError> {
    let width = dict_int(stream, b"Width")
        .ok_or_else(|| OcrError::DecodeError("Missing image width".to_string()))?;
    let height = dict_int(stream, b"Height")
        .ok_or_else(|| OcrError::DecodeError("Missing image height".to_string()))?;
    let (width, height, pixels) = image_dimensions(width, height)?;
    let bits = dict_int(stream, b"BitsPerComponent").unwrap_or(8);

    if bits != 8 {
        return Err(OcrError::DecodeError(format!(
            "Unsupported bit depth: {}",
            bits
        )));
    }

    let data = stream
        .decompressed_content()
        .map_err(|e| OcrError::DecodeError(format!("Failed to decompress image: {}", e)))?;
    let color_space = color_space_name(doc, stream);

    tracing::debug!(
        "PDF image: {}x{}, color_space={}, data_len={}",
        width,
        height,
        color_space,
        data.len()
    );

    let short = |expected: usize| {
        OcrError::DecodeError(format!(
            "{} data too short: {} < {}",
            color_space,
            data.len(),
            expected
        ))
    };

    let needed = |channels: usize| -> Result<usize, OcrError> {
        let len = pixels
            .checked_mul(channels)
            .ok_or_else(|| OcrError::DecodeError("Image buffer size overflows".to_string()))?;
        if data.len() < len {
            return Err(short(len));
        }
        Ok(len)
    };

    match color_space.as_str() {
        "DeviceGray" => {
            let len = needed(1)?;
            GrayImage::from_raw(width, height, data[..len].to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| OcrError::DecodeError("Invalid grayscale buffer".to_string()))
        }
        "DeviceRGB" | "ICCBased" => {
            let len = needed(3)?;
            RgbImage::from_raw(width, height, data[..len].to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| OcrError::DecodeError("Invalid RGB buffer".to_string()))
        }
        "DeviceCMYK" => {
            let len = needed(4)?;
            let rgb: Vec<u8> = data[..len]
                .chunks_exact(4)
                .flat_map(cmyk_to_rgb)
                .collect();
            RgbImage::from_raw(width, height, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| OcrError::DecodeError("Invalid CMYK buffer".to_string()))
        }
        other => Err(OcrError::DecodeError(format!(
            "Unsupported color space: {}",
            other
        ))),
    }
}

/// Validate `/Width` and `/Height` and return them with the pixel count
fn image_dimensions(width: i64, height: i64) -> Result<(u32, u32, usize), OcrError> {
    let invalid = || OcrError::DecodeError(format!("Invalid image size {}x{}", width, height));
    let w = u32::try_from(width).map_err(|_| invalid())?;
    let h = u32::try_from(height).map_err(|_| invalid())?;
    if w == 0 || h == 0 {
        return Err(invalid());
    }
    let pixels = usize::try_from(w)
        .ok()
        .zip(usize::try_from(h).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .ok_or_else(invalid)?;
    Ok((w, h, pixels))
}

fn cmyk_to_rgb(px: &[u8]) -> [u8; 3] {
    let k = 1.0 - px[3] as f32 / 255.0;
    let channel = |c: u8| ((1.0 - c as f32 / 255.0) * k * 255.0) as u8;
    [channel(px[0]), channel(px[1]), channel(px[2])]
}

/// Resolve the color space name, following indirect references and
/// `[/ICCBased ref]` style arrays. Defaults to DeviceRGB.
fn color_space_name(doc: &Document, stream: &Stream) -> String {
    let Ok(mut obj) = stream.dict.get(b"ColorSpace") else {
        return "DeviceRGB".to_string();
    };

    if let Ok(reference) = obj.as_reference() {
        match doc.get_object(reference) {
            Ok(resolved) => obj = resolved,
            Err(_) => return "DeviceRGB".to_string(),
        }
    }

    let name = obj.as_name().ok().or_else(|| {
        obj.as_array()
            .ok()
            .and_then(|items| items.first())
            .and_then(|first| first.as_name().ok())
    });

    name.map(|n| String::from_utf8_lossy(n).to_string())
        .unwrap_or_else(|| "DeviceRGB".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_checks_magic_bytes() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"\x89PNG\r\n"));
        assert!(!is_pdf(b""));
    }

    #[test]
    fn test_cmyk_conversion() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), [255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), [0, 0, 0]);
    }

    #[test]
    fn test_image_dimensions_reject_bad_sizes() {
        assert_eq!(image_dimensions(40, 20).unwrap(), (40, 20, 800));
        assert!(matches!(
            image_dimensions(-1, 20),
            Err(OcrError::DecodeError(_))
        ));
        assert!(matches!(
            image_dimensions(i64::from(u32::MAX) + 1, 1),
            Err(OcrError::DecodeError(_))
        ));
        assert!(image_dimensions(0, 10).is_err());
    }

    #[test]
    fn test_stream_with_negative_width_is_rejected() {
        let stream = Stream::new(
            lopdf::dictionary! { "Width" => -5, "Height" => 10 },
            Vec::new(),
        );
        match decode_image_stream(&Document::new(), &stream) {
            Err(OcrError::DecodeError(message)) => {
                assert_eq!(message, "Invalid image size -5x10")
            }
            other => panic!("expected decode error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn test_image_dimensions_reject_overflowing_area() {
        assert!(image_dimensions(i64::from(u32::MAX), i64::from(u32::MAX)).is_err());
    }

    #[test]
    fn test_page_images_rejects_garbage() {
        assert!(page_images(b"not a pdf at all").is_err());
    }
}
