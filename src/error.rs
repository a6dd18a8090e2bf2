//
// error.rs
// MedView-rs
//
// Error taxonomy shared by the volume models: load failures, slice lookups and degenerate-input warnings.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::PathBuf;

use thiserror::Error;

use crate::volume::SliceAxis;

/// Failures raised while opening a volume. A load never yields a silently empty volume.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("'{0}' is not a directory")]
    NotADirectory(PathBuf),

    #[error("No valid DICOM files found in '{0}'")]
    NoValidDicom(PathBuf),

    #[error("NIfTI volume must be at least 3D, got {ndim}D with shape {shape:?}")]
    Dimensionality { ndim: usize, shape: Vec<usize> },

    #[error("Failed to read NIfTI file '{path}': {source}")]
    Nifti {
        path: PathBuf,
        #[source]
        source: nifti::NiftiError,
    },

    #[error("Load of '{0}' was cancelled")]
    Cancelled(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller errors when requesting a slice.
#[derive(Debug, Error)]
pub enum SliceError {
    #[error("Slice index {index} out of range for {axis} axis ({count} slice(s))")]
    OutOfRange {
        axis: SliceAxis,
        index: usize,
        count: usize,
    },

    #[error("Axis {0} does not exist (expected 0, 1 or 2)")]
    InvalidAxis(usize),

    #[error("Failed to decode slice {index}: {message}")]
    Decode { index: usize, message: String },
}

/// Non-fatal signal: the input had no dynamic range, so a constant fallback was produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegenerateInputWarning {
    /// The single value every finite sample shared, or `None` when no finite sample existed.
    pub value: Option<f64>,
    pub len: usize,
}

impl std::fmt::Display for DegenerateInputWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value {
            Some(v) => write!(f, "uniform input ({} samples all equal to {})", self.len, v),
            None => write!(f, "input has no finite samples ({} samples)", self.len),
        }
    }
}
