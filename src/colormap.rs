//
// colormap.rs
// MedView-rs
//
// Expands 8-bit grayscale slices into RGB using gray passthrough or fixed lookup tables.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, ArrayBase, Axis, Data, Ix2};

/// Colormaps offered to the display pipeline.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum Colormap {
    #[default]
    Gray,
    Hot,
    Jet,
    Bone,
}

/// Anchor points `(x, value)` of one channel, both in `[0, 1]`.
type Segments = &'static [(f64, f64)];

const HOT: [Segments; 3] = [
    &[(0.0, 0.0416), (0.365079, 1.0), (1.0, 1.0)],
    &[(0.0, 0.0), (0.365079, 0.0), (0.746032, 1.0), (1.0, 1.0)],
    &[(0.0, 0.0), (0.746032, 0.0), (1.0, 1.0)],
];

const JET: [Segments; 3] = [
    &[(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)],
    &[
        (0.0, 0.0),
        (0.125, 0.0),
        (0.375, 1.0),
        (0.64, 1.0),
        (0.91, 0.0),
        (1.0, 0.0),
    ],
    &[(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)],
];

const BONE: [Segments; 3] = [
    &[(0.0, 0.0), (0.746032, 0.652778), (1.0, 1.0)],
    &[(0.0, 0.0), (0.365079, 0.319444), (0.746032, 0.777778), (1.0, 1.0)],
    &[(0.0, 0.0), (0.365079, 0.444444), (1.0, 1.0)],
];

impl Colormap {
    pub const ALL: [Colormap; 4] = [Colormap::Gray, Colormap::Hot, Colormap::Jet, Colormap::Bone];

    pub fn name(self) -> &'static str {
        match self {
            Colormap::Gray => "gray",
            Colormap::Hot => "hot",
            Colormap::Jet => "jet",
            Colormap::Bone => "bone",
        }
    }

    /// 256-entry RGB table for this colormap.
    pub fn lut(self) -> [[u8; 3]; 256] {
        let channels = match self {
            Colormap::Gray => {
                let mut lut = [[0u8; 3]; 256];
                for (i, entry) in lut.iter_mut().enumerate() {
                    *entry = [i as u8; 3];
                }
                return lut;
            }
            Colormap::Hot => &HOT,
            Colormap::Jet => &JET,
            Colormap::Bone => &BONE,
        };

        let mut lut = [[0u8; 3]; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let x = i as f64 / 255.0;
            for (c, segments) in channels.iter().enumerate() {
                entry[c] = (interpolate(segments, x) * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
        lut
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Colormap::ALL
            .into_iter()
            .find(|cmap| cmap.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown colormap '{}'", s))
    }
}

fn interpolate(segments: &[(f64, f64)], x: f64) -> f64 {
    for pair in segments.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if x <= x1 {
            if x1 == x0 {
                return y1;
            }
            return y0 + (x - x0) / (x1 - x0) * (y1 - y0);
        }
    }
    segments.last().map(|&(_, y)| y).unwrap_or(0.0)
}

/// Map an 8-bit slice of shape `(H, W)` to RGB with shape `(H, W, 3)`.
pub fn apply_colormap<S>(data: &ArrayBase<S, Ix2>, colormap: Colormap) -> Array3<u8>
where
    S: Data<Elem = u8>,
{
    let (height, width) = data.dim();
    let lut = colormap.lut();
    let mut out = Array3::<u8>::zeros((height, width, 3));
    for (mut row_out, row_in) in out.axis_iter_mut(Axis(0)).zip(data.axis_iter(Axis(0))) {
        for (mut px, &v) in row_out.axis_iter_mut(Axis(0)).zip(row_in.iter()) {
            let rgb = lut[v as usize];
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
        }
    }
    out
}
