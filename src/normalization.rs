//
// normalization.rs
// MedView-rs
//
// Maps raw intensity samples to 8-bit display values via min-max scaling or a window/level transform.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;
use std::str::FromStr;

use dicom_pixeldata::WindowLevel;
use ndarray::{Array, ArrayBase, Data, Dimension};
use serde::Serialize;
use tracing::warn;

use crate::error::DegenerateInputWarning;

/// Window used when a DICOM slice carries no usable WindowCenter/WindowWidth.
pub const DEFAULT_WINDOW: WindowLevel = WindowLevel {
    center: 40.0,
    width: 400.0,
};

/// Named clinical windows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum WindowPreset {
    Brain,
    Bone,
    Lung,
    Abdomen,
    SoftTissue,
}

/// Preset table as (preset, center, width).
pub const WINDOW_PRESETS: [(WindowPreset, f64, f64); 5] = [
    (WindowPreset::Brain, 40.0, 80.0),
    (WindowPreset::Bone, 300.0, 1500.0),
    (WindowPreset::Lung, -600.0, 1500.0),
    (WindowPreset::Abdomen, 60.0, 400.0),
    (WindowPreset::SoftTissue, 50.0, 350.0),
];

impl WindowPreset {
    pub fn name(self) -> &'static str {
        match self {
            WindowPreset::Brain => "Brain",
            WindowPreset::Bone => "Bone",
            WindowPreset::Lung => "Lung",
            WindowPreset::Abdomen => "Abdomen",
            WindowPreset::SoftTissue => "Soft Tissue",
        }
    }

    pub fn window(self) -> WindowLevel {
        // The table is exhaustive over the enum, so the lookup always succeeds.
        WINDOW_PRESETS
            .iter()
            .find(|(preset, _, _)| *preset == self)
            .map(|&(_, center, width)| WindowLevel { center, width })
            .unwrap_or(DEFAULT_WINDOW)
    }

    pub fn all() -> impl Iterator<Item = WindowPreset> {
        WINDOW_PRESETS.iter().map(|(preset, _, _)| *preset)
    }
}

impl fmt::Display for WindowPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WindowPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept "Soft Tissue", "soft-tissue" and "soft_tissue" alike.
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        WindowPreset::all()
            .find(|preset| {
                preset
                    .name()
                    .chars()
                    .filter(|c| c.is_ascii_alphanumeric())
                    .collect::<String>()
                    .to_ascii_lowercase()
                    == wanted
            })
            .ok_or_else(|| format!("Unknown window preset '{}'", s))
    }
}

/// Linearly map the finite range of `data` onto `0..=255`.
///
/// A uniform (or entirely non-finite) input produces an all-zero array of the same shape;
/// the condition is logged as a warning instead of dividing by zero.
pub fn normalize_min_max<S, D>(data: &ArrayBase<S, D>) -> Array<u8, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let (out, warning) = normalize_min_max_checked(data);
    if let Some(warning) = warning {
        warn!("min-max normalization fell back to zeros: {}", warning);
    }
    out
}

/// Same as [`normalize_min_max`], returning the degenerate-input signal to the caller.
pub fn normalize_min_max_checked<S, D>(
    data: &ArrayBase<S, D>,
) -> (Array<u8, D>, Option<DegenerateInputWarning>)
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let Some((min, max)) = finite_range(data) else {
        let warning = DegenerateInputWarning {
            value: None,
            len: data.len(),
        };
        return (Array::zeros(data.raw_dim()), Some(warning));
    };

    if min == max {
        let warning = DegenerateInputWarning {
            value: Some(min),
            len: data.len(),
        };
        return (Array::zeros(data.raw_dim()), Some(warning));
    }

    let span = max - min;
    let out = data.mapv(|v| {
        if v.is_nan() {
            0
        } else {
            (((v - min) / span) * 255.0).clamp(0.0, 255.0) as u8
        }
    });
    (out, None)
}

/// Apply a DICOM-style window: `center - width/2` maps to 0, `center + width/2` to 255.
///
/// Values outside the window clamp to the ends. A non-positive or non-finite width is
/// treated as a width of 1 so the mapping stays defined.
pub fn apply_window_level<S, D>(data: &ArrayBase<S, D>, center: f64, width: f64) -> Array<u8, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let width = if width.is_finite() && width > 0.0 {
        width
    } else {
        1.0
    };
    let lower = center - width / 2.0;
    let upper = center + width / 2.0;

    data.mapv(|v| {
        if v.is_nan() || v <= lower {
            u8::MIN
        } else if v >= upper {
            u8::MAX
        } else {
            // 255, not 256.
            ((v - lower) / width * 255.0) as u8
        }
    })
}

/// Convenience wrapper over [`apply_window_level`] for a [`WindowLevel`] value.
pub fn apply_window<S, D>(data: &ArrayBase<S, D>, window: &WindowLevel) -> Array<u8, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    apply_window_level(data, window.center, window.width)
}

fn finite_range<S, D>(data: &ArrayBase<S, D>) -> Option<(f64, f64)>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    data.iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
