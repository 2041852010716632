use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbaImage};

/// Converts an RGBA crop to 8-bit grayscale.
pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    DynamicImage::ImageRgba8(img.clone()).to_luma8()
}

/// Converts image to binary by keeping only bright pixels.
///
/// Pixels where R > threshold AND G > threshold AND B > threshold become black (text).
/// All other pixels become white (background).
pub fn threshold_bright_pixels(img: &RgbaImage, threshold: u8) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b, _] = pixel.0;
        let value = if r > threshold && g > threshold && b > threshold {
            0u8
        } else {
            255u8
        };
        output.put_pixel(x, y, Luma([value]));
    }

    output
}

/// Prepares a region crop for OCR: grayscale, or binarized when a threshold is set.
pub fn prepare_for_ocr(img: &RgbaImage, binarize_threshold: Option<u8>) -> GrayImage {
    match binarize_threshold {
        Some(threshold) => threshold_bright_pixels(img, threshold),
        None => to_grayscale(img),
    }
}
