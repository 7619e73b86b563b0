use crate::core::{GymError, RenderFrame, Result};

/// Encode a RenderFrame::Pixels to a PNG byte vector.
/// - When the `image` feature is enabled, this will encode using the `image` crate.
/// - Without the feature, returns GymError::NotSupported.
pub fn encode_png(frame: &RenderFrame) -> Result<Vec<u8>> {
    match frame {
        RenderFrame::Pixels { width, height, data } => encode_pixels_png(*width, *height, data),
        RenderFrame::Text(_) => Err(GymError::NotSupported("Text frames cannot be encoded to PNG".into())),
    }
}

#[cfg(feature = "image")]
fn encode_pixels_png(width: u32, height: u32, pixels: &[u8]) -> Result<Vec<u8>> {
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use std::io::Cursor;

    let count = (width as usize) * (height as usize);
    let color = if pixels.len() == count * 3 {
        ExtendedColorType::Rgb8
    } else if pixels.len() == count * 4 {
        ExtendedColorType::Rgba8
    } else {
        return Err(GymError::ShapeMismatch {
            expected: format!("{} or {} bytes ({}x{})", count * 3, count * 4, width, height),
            actual: format!("{} bytes", pixels.len()),
        });
    };

    let mut buf = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buf);
        let encoder = PngEncoder::new(&mut cursor);
        encoder
            .write_image(pixels, width, height, color)
            .map_err(|e| GymError::NotSupported(format!("PNG encode error: {}", e)))?;
    }
    Ok(buf)
}

#[cfg(not(feature = "image"))]
fn encode_pixels_png(_width: u32, _height: u32, _pixels: &[u8]) -> Result<Vec<u8>> {
    Err(GymError::NotSupported(
        "PNG encoding requires the `image` feature".into(),
    ))
}

/// Save a RenderFrame::Pixels as a PNG file at the given path.
/// Requires the `image` feature; otherwise returns NotSupported.
pub fn save_png<P: AsRef<std::path::Path>>(path: P, frame: &RenderFrame) -> Result<()> {
    let bytes = encode_png(frame)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_two() -> RenderFrame {
        RenderFrame::Pixels {
            width: 2,
            height: 2,
            data: vec![255, 0, 0, 255,  0, 255, 0, 255,  0, 0, 255, 255,  255, 255, 255, 255],
        }
    }

    #[test]
    fn text_frames_are_rejected() {
        let err = encode_png(&RenderFrame::Text("x".into())).unwrap_err();
        assert!(matches!(err, GymError::NotSupported(_)));
    }

    #[cfg(not(feature = "image"))]
    #[test]
    fn encode_png_without_feature_not_supported() {
        match encode_png(&two_by_two()).unwrap_err() {
            GymError::NotSupported(_) => {}
            other => panic!("Expected NotSupported, got {:?}", other),
        }
    }

    #[cfg(feature = "image")]
    #[test]
    fn encode_png_with_feature_produces_png_signature() {
        let bytes = encode_png(&two_by_two()).expect("PNG encoding should succeed");
        assert_eq!(&bytes[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }

    #[cfg(feature = "image")]
    #[test]
    fn encode_png_rejects_bad_length() {
        let frame = RenderFrame::Pixels { width: 2, height: 2, data: vec![0; 5] };
        assert!(matches!(encode_png(&frame), Err(GymError::ShapeMismatch { .. })));
    }
}
