//
// resize.rs
// MedView-rs
//
// Aspect-preserving fit of a rendered slice into a target viewport.
//
// Thales Matheus Mendonça Santos - November 2025

use image::imageops::{self, FilterType};
use image::RgbImage;

/// Compute the size that fills `max_width x max_height` while keeping the aspect ratio.
///
/// Smaller images are scaled up to fill the viewport. When either bound is zero or
/// negative (or the source is empty) the original size is returned untouched.
pub fn resize_to_fit(width: u32, height: u32, max_width: i64, max_height: i64) -> (u32, u32) {
    if max_width <= 0 || max_height <= 0 || width == 0 || height == 0 {
        return (width, height);
    }

    // Bounds beyond what an image can hold behave like the largest representable size.
    let max_width = max_width.min(u32::MAX as i64);
    let max_height = max_height.min(u32::MAX as i64);

    let aspect = width as f64 / height as f64;
    let mut new_width = max_width as f64;
    let mut new_height = (new_width / aspect).floor();
    if new_height > max_height as f64 {
        new_height = max_height as f64;
        new_width = (new_height * aspect).floor();
    }

    if new_width < 1.0 || new_height < 1.0 {
        return (width, height);
    }
    (new_width as u32, new_height as u32)
}

/// Resize `image` to the size computed by [`resize_to_fit`] using a Lanczos filter.
pub fn fit_image(image: &RgbImage, max_width: i64, max_height: i64) -> RgbImage {
    let (width, height) = image.dimensions();
    let (new_width, new_height) = resize_to_fit(width, height, max_width, max_height);
    if (new_width, new_height) == (width, height) {
        return image.clone();
    }
    imageops::resize(image, new_width, new_height, FilterType::Lanczos3)
}
