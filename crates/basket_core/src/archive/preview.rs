//! Archive preview images.
//!
//! Previews are PNG files fitting in 256x256, aspect ratio preserved.
//! Smaller images are never upscaled.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageResult, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Bounding box of a preview.
pub const PREVIEW_MAX_SIZE: u32 = 256;
/// Placeholder preview dimensions.
const PLACEHOLDER_WIDTH: u32 = 128;
const PLACEHOLDER_HEIGHT: u32 = 96;
const PLACEHOLDER_COLOR: [u8; 4] = [0xee, 0xee, 0xee, 0xff];

/// Fits a decoded image into the preview bounding box.
pub fn fit_preview(image: DynamicImage) -> DynamicImage {
    if image.width() <= PREVIEW_MAX_SIZE && image.height() <= PREVIEW_MAX_SIZE {
        return image;
    }
    image.resize(PREVIEW_MAX_SIZE, PREVIEW_MAX_SIZE, FilterType::Triangle)
}

/// Encodes an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Decodes raw image bytes and returns a fitted PNG preview.
pub fn preview_from_bytes(bytes: &[u8]) -> ImageResult<Vec<u8>> {
    let image = image::load_from_memory(bytes)?;
    encode_png(&fit_preview(image))
}

/// Loads an image file and returns a fitted PNG preview.
pub fn preview_from_file(path: &Path) -> ImageResult<Vec<u8>> {
    let image = image::open(path)?;
    encode_png(&fit_preview(image))
}

/// Flat-color preview used when no image is supplied. `color` is a
/// `#rrggbb` string, typically the basket background color.
pub fn placeholder_preview(color: Option<&str>) -> ImageResult<Vec<u8>> {
    let pixel = color.and_then(parse_rgb).unwrap_or(PLACEHOLDER_COLOR);
    let image = RgbaImage::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, Rgba(pixel));
    encode_png(&DynamicImage::ImageRgba8(image))
}

fn parse_rgb(value: &str) -> Option<[u8; 4]> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?, 0xff])
}

#[cfg(test)]
mod tests {
    use super::{placeholder_preview, preview_from_bytes, PREVIEW_MAX_SIZE};
    use image::{DynamicImage, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        super::encode_png(&image).unwrap()
    }

    #[test]
    fn large_images_are_fitted_with_aspect_ratio() {
        let bytes = preview_from_bytes(&png(1024, 512)).unwrap();
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!(image.width(), PREVIEW_MAX_SIZE);
        assert_eq!(image.height(), PREVIEW_MAX_SIZE / 2);
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let bytes = preview_from_bytes(&png(40, 30)).unwrap();
        let image = image::load_from_memory(&bytes).unwrap();
        assert_eq!((image.width(), image.height()), (40, 30));
    }

    #[test]
    fn placeholder_uses_given_color() {
        let bytes = placeholder_preview(Some("#336699")).unwrap();
        let image = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(0, 0).0, [0x33, 0x66, 0x99, 0xff]);
        assert!(preview_from_bytes(b"not an image").is_err());
    }
}
