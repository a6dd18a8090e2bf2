//
// nifti_image.rs
// MedView-rs
//
// NIfTI volume held fully in memory in RAS+ order, sliced along any of the three anatomical axes.
//
// Thales Matheus Mendonça Santos - November 2025

use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, ArrayD, Axis, Ix3};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use tracing::{debug, info};

use crate::error::{LoadError, SliceError};
use crate::volume::orientation::{self, Affine};
use crate::volume::{NiftiMetadata, SliceAxis, Volume, VolumeMetadata};

struct Canonical {
    data: Array3<f64>,
    affine: Affine,
    source_orientation: String,
    data_type: String,
}

/// A 3D NIfTI image, reoriented to RAS on load.
#[derive(Default)]
pub struct NiftiVolume {
    image: Option<Canonical>,
    source: Option<PathBuf>,
}

impl NiftiVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let mut volume = Self::new();
        volume.load(path.as_ref())?;
        Ok(volume)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Canonical (RAS) extent of each axis, zeros before load.
    pub fn shape(&self) -> [usize; 3] {
        match &self.image {
            Some(image) => {
                let dims = image.data.dim();
                [dims.0, dims.1, dims.2]
            }
            None => [0; 3],
        }
    }

    /// Voxel-to-world transform of the canonical grid.
    pub fn affine(&self) -> Option<Affine> {
        self.image.as_ref().map(|image| image.affine)
    }

    /// The whole canonical voxel grid.
    pub fn data(&self) -> Option<&Array3<f64>> {
        self.image.as_ref().map(|image| &image.data)
    }

    fn read(path: &Path) -> Result<Canonical, LoadError> {
        let nifti_error = |source| LoadError::Nifti {
            path: path.to_path_buf(),
            source,
        };

        let obj = ReaderOptions::new().read_file(path).map_err(nifti_error)?;
        let header = obj.header().clone();
        let data_type = header
            .data_type()
            .map(|t| format!("{:?}", t))
            .unwrap_or_else(|_| format!("code {}", header.datatype));

        let volume: ArrayD<f64> = obj
            .into_volume()
            .into_ndarray::<f64>()
            .map_err(nifti_error)?;

        let shape = volume.shape().to_vec();
        if shape.len() < 3 {
            return Err(LoadError::Dimensionality {
                ndim: shape.len(),
                shape,
            });
        }

        // Time points and further dimensions: keep the first 3D volume.
        let mut volume = volume;
        while volume.ndim() > 3 {
            volume = volume.index_axis_move(Axis(3), 0);
        }
        let volume = volume
            .into_dimensionality::<Ix3>()
            .map_err(|_| LoadError::Dimensionality {
                ndim: shape.len(),
                shape: shape.clone(),
            })?;

        let affine = orientation::affine_from_header(&header);
        let source_orientation = orientation::orientation_label(&affine);
        let (data, affine) = orientation::reorient_to_ras(volume, &affine);
        debug!(
            "Reoriented {:?} from {} to RAS, canonical shape {:?}",
            path,
            source_orientation,
            data.shape()
        );

        Ok(Canonical {
            data,
            affine,
            source_orientation,
            data_type,
        })
    }
}

impl Volume for NiftiVolume {
    fn load(&mut self, source: &Path) -> Result<(), LoadError> {
        let image = Self::read(source)?;
        info!(
            "Loaded NIfTI volume {} with shape {:?}",
            source.display(),
            image.data.shape()
        );
        self.image = Some(image);
        self.source = Some(source.to_path_buf());
        Ok(())
    }

    fn get_slice(&mut self, axis: SliceAxis, index: usize) -> Result<Array2<f64>, SliceError> {
        let count = self.slice_count(axis);
        let image = match &self.image {
            Some(image) if index < count => image,
            _ => return Err(SliceError::OutOfRange { axis, index, count }),
        };

        // rot90 counter-clockwise: superior (axial: anterior) ends up on top.
        let mut plane = image.data.index_axis(Axis(axis.index()), index).reversed_axes();
        plane.invert_axis(Axis(0));
        if axis != SliceAxis::Sagittal {
            // radiological: patient right on screen left
            plane.invert_axis(Axis(1));
        }
        Ok(plane.to_owned())
    }

    fn slice_count(&self, axis: SliceAxis) -> usize {
        self.shape()[axis.index()]
    }

    fn metadata(&self) -> VolumeMetadata {
        let Some(image) = &self.image else {
            return VolumeMetadata::Empty;
        };
        VolumeMetadata::Nifti(NiftiMetadata {
            dimensions: self.shape(),
            voxel_size: orientation::voxel_sizes(&image.affine),
            data_type: image.data_type.clone(),
            orientation: format!("RAS (canonical, source {})", image.source_orientation),
        })
    }
}
