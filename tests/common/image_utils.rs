//! Image inspection utilities for testing.
//!
//! This module provides helper functions for verifying rendered plots in tests.

use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, Rgba};

/// Load an image from a byte array
pub fn load_image_from_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes)
}

/// Detect image format from bytes
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes).ok()
}

/// Check if an image has the expected dimensions
pub fn assert_image_dimensions(
    image: &DynamicImage,
    expected_width: u32,
    expected_height: u32,
) -> Result<(), String> {
    let (actual_width, actual_height) = image.dimensions();

    if actual_width != expected_width || actual_height != expected_height {
        return Err(format!(
            "Image dimensions differ: actual = {}x{}, expected = {}x{}",
            actual_width, actual_height, expected_width, expected_height
        ));
    }

    Ok(())
}

/// Check if an image has the expected format
pub fn assert_image_format(bytes: &[u8], expected_format: ImageFormat) -> Result<(), String> {
    let actual_format =
        detect_image_format(bytes).ok_or_else(|| "Could not detect image format".to_string())?;

    if actual_format != expected_format {
        return Err(format!(
            "Image format differs: actual = {:?}, expected = {:?}",
            actual_format, expected_format
        ));
    }

    Ok(())
}

/// Count pixels for which `predicate` holds
pub fn count_pixels<F>(image: &DynamicImage, predicate: F) -> usize
where
    F: Fn(&Rgba<u8>) -> bool,
{
    image.pixels().filter(|(_, _, p)| predicate(p)).count()
}

/// Pixels that are not fully transparent
pub fn count_drawn_pixels(image: &DynamicImage) -> usize {
    count_pixels(image, |p| p[3] > 0)
}

/// Opaque-ish pixels close to `color`, allowing `tolerance` per channel
pub fn count_color(image: &DynamicImage, color: [u8; 3], tolerance: u8) -> usize {
    count_pixels(image, |p| {
        p[3] > 128
            && p.0[..3]
                .iter()
                .zip(color.iter())
                .all(|(a, b)| a.abs_diff(*b) <= tolerance)
    })
}

/// Opaque-ish pixels where `channel` (0 = red) exceeds the others by at least `margin`.
///
/// Catches anti-aliased edges that [`count_color`] would miss.
pub fn count_tinted(image: &DynamicImage, channel: usize, margin: u8) -> usize {
    count_pixels(image, |p| {
        p[3] > 128
            && (0..3)
                .filter(|&c| c != channel)
                .all(|c| u16::from(p[channel]) >= u16::from(p[c]) + u16::from(margin))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    #[test]
    fn test_detect_image_format() {
        let img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(2, 2);
        let mut png_bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png_bytes), ImageFormat::Png)
            .unwrap();

        assert_eq!(detect_image_format(&png_bytes), Some(ImageFormat::Png));
        assert!(assert_image_format(&png_bytes, ImageFormat::Png).is_ok());
    }

    #[test]
    fn test_assert_image_dimensions() {
        let img = DynamicImage::new_rgb8(10, 20);

        assert!(assert_image_dimensions(&img, 10, 20).is_ok());
        assert!(assert_image_dimensions(&img, 11, 20).is_err());
        assert!(assert_image_dimensions(&img, 10, 21).is_err());
    }

    #[test]
    fn test_count_color() {
        let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(3, 1);
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([250, 5, 0, 255]));
        img.put_pixel(2, 0, Rgba([255, 0, 0, 0]));
        let img = DynamicImage::ImageRgba8(img);

        assert_eq!(count_color(&img, [255, 0, 0], 10), 2);
        assert_eq!(count_drawn_pixels(&img), 2);
        assert_eq!(count_tinted(&img, 0, 100), 2);
        assert_eq!(count_tinted(&img, 2, 100), 0);
    }
}
