//
// mod.rs
// MedView-rs
//
// The volume capability contract shared by DICOM series and NIfTI files, plus their fixed-key metadata.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;
use std::path::Path;

use dicom_pixeldata::WindowLevel;
use ndarray::Array2;
use serde::Serialize;

use crate::error::{LoadError, SliceError};

pub mod cache;
pub mod dicom_series;
pub mod nifti_image;
pub mod orientation;

pub use dicom_series::DicomVolume;
pub use nifti_image::NiftiVolume;

/// Anatomical slicing axis, numbered in canonical (RAS) voxel order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SliceAxis {
    Sagittal = 0,
    Coronal = 1,
    Axial = 2,
}

impl SliceAxis {
    pub const ALL: [SliceAxis; 3] = [SliceAxis::Sagittal, SliceAxis::Coronal, SliceAxis::Axial];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for SliceAxis {
    type Error = SliceError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SliceAxis::Sagittal),
            1 => Ok(SliceAxis::Coronal),
            2 => Ok(SliceAxis::Axial),
            other => Err(SliceError::InvalidAxis(other)),
        }
    }
}

impl fmt::Display for SliceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SliceAxis::Sagittal => "sagittal",
            SliceAxis::Coronal => "coronal",
            SliceAxis::Axial => "axial",
        })
    }
}

/// Capability contract consumed by front-ends.
///
/// `get_slice` takes `&mut self` because implementations may populate a decode cache.
pub trait Volume: Send {
    /// Load (or reload) the volume from `source`. On failure the previous state is kept.
    fn load(&mut self, source: &Path) -> Result<(), LoadError>;

    /// Raw (calibrated, display-oriented) samples of one slice.
    fn get_slice(&mut self, axis: SliceAxis, index: usize) -> Result<Array2<f64>, SliceError>;

    /// Number of slices along `axis`; zero before load.
    fn slice_count(&self, axis: SliceAxis) -> usize;

    /// Display-ready metadata; [`VolumeMetadata::Empty`] when nothing is available yet.
    fn metadata(&self) -> VolumeMetadata;

    /// The axis a front-end should browse first.
    fn primary_axis(&self) -> SliceAxis {
        SliceAxis::Axial
    }

    /// Window stored with the data itself, if the format carries one.
    fn default_window(&self) -> Option<WindowLevel> {
        None
    }
}

/// Metadata for the slice most recently fetched from a DICOM series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DicomMetadata {
    pub patient_id: Option<String>,
    pub patient_age: Option<String>,
    pub modality: Option<String>,
    pub series_description: Option<String>,
    pub instance_number: Option<i32>,
    pub window_center: f64,
    pub window_width: f64,
    pub orientation: String,
}

/// Metadata for a canonical NIfTI volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NiftiMetadata {
    pub dimensions: [usize; 3],
    pub voxel_size: [f64; 3],
    pub data_type: String,
    pub orientation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VolumeMetadata {
    Empty,
    Dicom(DicomMetadata),
    Nifti(NiftiMetadata),
}

fn or_na(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "N/A".to_string())
}

impl VolumeMetadata {
    pub fn is_empty(&self) -> bool {
        matches!(self, VolumeMetadata::Empty)
    }

    /// Ordered `(key, display value)` pairs for info panels.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        match self {
            VolumeMetadata::Empty => Vec::new(),
            VolumeMetadata::Dicom(meta) => vec![
                ("Patient ID", or_na(&meta.patient_id)),
                ("Patient Age", or_na(&meta.patient_age)),
                ("Modality", or_na(&meta.modality)),
                ("Series Description", or_na(&meta.series_description)),
                (
                    "Instance Number",
                    meta.instance_number
                        .map(|n| n.to_string())
                        .unwrap_or_else(|| "N/A".to_string()),
                ),
                ("Window Center", format!("{}", meta.window_center)),
                ("Window Width", format!("{}", meta.window_width)),
                ("Orientation", meta.orientation.clone()),
            ],
            VolumeMetadata::Nifti(meta) => vec![
                (
                    "Dimensions",
                    format!(
                        "{} x {} x {}",
                        meta.dimensions[0], meta.dimensions[1], meta.dimensions[2]
                    ),
                ),
                (
                    "Voxel Size",
                    format!(
                        "{:.3} x {:.3} x {:.3} mm",
                        meta.voxel_size[0], meta.voxel_size[1], meta.voxel_size[2]
                    ),
                ),
                ("Data Type", meta.data_type.clone()),
                ("Orientation", meta.orientation.clone()),
            ],
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries()
            .into_iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}
