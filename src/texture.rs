//! Texture decoding for mesh texture slots.

use crate::error::ResourceError;

/// Tightly packed RGBA8 pixels of a decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    /// Byte length of the pixel data.
    pub fn size_in_bytes(&self) -> u32 {
        self.pixels.len() as u32
    }
}

/// Load an image file and convert it to RGBA8.
pub fn load_rgba8(path: &str) -> Result<DecodedImage, ResourceError> {
    let image = image::open(path)
        .map_err(|source| ResourceError::DecodeFailed {
            path: path.to_string(),
            source,
        })?
        .to_rgba8();

    let (width, height) = image.dimensions();
    log::debug!("Decoded texture {path} ({width}x{height})");

    Ok(DecodedImage {
        width,
        height,
        pixels: image.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rgba8_converts_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        image::RgbImage::from_pixel(2, 3, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let decoded = load_rgba8(path.to_str().unwrap()).unwrap();
        assert_eq!(decoded.width, 2);
        assert_eq!(decoded.height, 3);
        assert_eq!(decoded.size_in_bytes(), 2 * 3 * 4);
        assert_eq!(&decoded.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_rgba8("/nonexistent/texture.png").unwrap_err();
        assert!(matches!(err, ResourceError::DecodeFailed { .. }));
    }
}
