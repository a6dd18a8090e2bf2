//
// render.rs
// MedView-rs
//
// Display pipeline for one slice (window or min-max, colormap, optional fit) and atomic PNG export.
//
// Thales Matheus Mendonça Santos - November 2025

use anyhow::{Context, Result};
use dicom_pixeldata::WindowLevel;
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::{Array2, ArrayView2};
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::colormap::{apply_colormap, Colormap};
use crate::normalization::{apply_window, normalize_min_max};
use crate::resize::fit_image;

/// Options controlling how a slice is turned into an RGB image.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplaySettings {
    /// Explicit window; min-max scaling when absent.
    pub window: Option<WindowLevel>,
    pub colormap: Colormap,
    /// Target viewport `(max_width, max_height)`.
    pub fit: Option<(i64, i64)>,
}

impl DisplaySettings {
    pub fn with_window(mut self, window: WindowLevel) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_colormap(mut self, colormap: Colormap) -> Self {
        self.colormap = colormap;
        self
    }

    pub fn with_fit(mut self, max_width: i64, max_height: i64) -> Self {
        self.fit = Some((max_width, max_height));
        self
    }
}

/// 8-bit display values of a slice.
pub fn to_display(slice: &ArrayView2<f64>, window: Option<&WindowLevel>) -> Array2<u8> {
    match window {
        Some(window) => apply_window(slice, window),
        None => normalize_min_max(slice),
    }
}

pub fn render_slice(slice: &ArrayView2<f64>, settings: &DisplaySettings) -> RgbImage {
    let gray = to_display(slice, settings.window.as_ref());
    let rgb = apply_colormap(&gray, settings.colormap);
    let (height, width, _) = rgb.dim();

    let image = RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (row, col) = (y as usize, x as usize);
        Rgb([rgb[[row, col, 0]], rgb[[row, col, 1]], rgb[[row, col, 2]]])
    });

    match settings.fit {
        Some((max_width, max_height)) => fit_image(&image, max_width, max_height),
        None => image,
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .context("Failed to encode PNG")?;
    Ok(buffer)
}

/// Write `image` as PNG to `path`.
///
/// The bytes are staged in a temporary file next to the destination and renamed into place,
/// so a failed export never leaves a partial file behind.
pub fn export_png(image: &RgbImage, path: &Path) -> Result<()> {
    let bytes = encode_png(image)?;
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
    staged
        .write_all(&bytes)
        .context("Failed to write PNG data")?;
    staged
        .persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to save image to {:?}", path))?;
    Ok(())
}
