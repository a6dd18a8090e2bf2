//
// dicom_series.rs
// MedView-rs
//
// DICOM series volume: one single-frame file per slice, content-validated, sorted and decoded on demand.
//
// Thales Matheus Mendonça Santos - November 2025

use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use dicom::object::{open_file, DefaultDicomObject, OpenFileOptions};
use dicom::pixeldata::PixelDecoder;
use dicom_dictionary_std::tags;
use dicom_pixeldata::{
    ConvertOptions, ModalityLutOption, PixelRepresentation, VoiLutOption, WindowLevel,
};
use ndarray::{s, Array2, Array4, Axis};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::dicom_access::ElementAccess;
use crate::error::{LoadError, SliceError};
use crate::normalization::DEFAULT_WINDOW;
use crate::volume::cache::{SliceCache, DEFAULT_CACHE_CAPACITY};
use crate::volume::{DicomMetadata, SliceAxis, Volume, VolumeMetadata};

/// Display convention applied to every DICOM slice.
pub const DICOM_ORIENTATION: &str = "LPS (radiological)";

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// Header attributes read once per file at load time.
#[derive(Debug, Clone)]
struct SliceHeader {
    instance_number: Option<i32>,
    rescale_slope: f64,
    rescale_intercept: f64,
    window: Option<WindowLevel>,
    patient_id: Option<String>,
    patient_age: Option<String>,
    modality: Option<String>,
    series_description: Option<String>,
}

impl SliceHeader {
    fn from_object(obj: &DefaultDicomObject) -> Self {
        let window = match (
            obj.element_f64(tags::WINDOW_CENTER),
            obj.element_f64(tags::WINDOW_WIDTH),
        ) {
            (Some(center), Some(width)) if width > 0.0 => Some(WindowLevel { center, width }),
            _ => None,
        };

        SliceHeader {
            instance_number: obj.element_int(tags::INSTANCE_NUMBER),
            rescale_slope: obj.element_f64(tags::RESCALE_SLOPE).unwrap_or(1.0),
            rescale_intercept: obj.element_f64(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
            window,
            patient_id: obj.element_str(tags::PATIENT_ID),
            patient_age: obj.element_str(tags::PATIENT_AGE),
            modality: obj.element_str(tags::MODALITY),
            series_description: obj.element_str(tags::SERIES_DESCRIPTION),
        }
    }
}

#[derive(Debug, Clone)]
struct SliceEntry {
    path: PathBuf,
    header: SliceHeader,
}

impl SliceEntry {
    fn file_name(&self) -> Option<&std::ffi::OsStr> {
        self.path.file_name()
    }
}

/// InstanceNumber ascending; files without a usable number follow, ordered by filename.
fn acquisition_order(a: &SliceEntry, b: &SliceEntry) -> Ordering {
    match (a.header.instance_number, b.header.instance_number) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.file_name().cmp(&b.file_name())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.file_name().cmp(&b.file_name()),
    }
}

/// Content check: 128-byte preamble followed by the `DICM` magic.
pub fn is_dicom_file(path: &Path) -> bool {
    let mut head = [0u8; PREAMBLE_LEN + 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut head))
        .map(|_| &head[PREAMBLE_LEN..] == MAGIC)
        .unwrap_or(false)
}

/// A stack of single-file DICOM images.
pub struct DicomVolume {
    entries: Vec<SliceEntry>,
    cache: SliceCache,
    current: Option<usize>,
    source: Option<PathBuf>,
}

impl Default for DicomVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl DicomVolume {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            cache: SliceCache::new(capacity),
            current: None,
            source: None,
        }
    }

    /// Construct and load in one step.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, LoadError> {
        let mut volume = Self::new();
        volume.load(directory.as_ref())?;
        Ok(volume)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Files in serving order.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    /// InstanceNumber of every slice in serving order.
    pub fn instance_numbers(&self) -> Vec<Option<i32>> {
        self.entries
            .iter()
            .map(|e| e.header.instance_number)
            .collect()
    }

    pub fn cached_slices(&self) -> usize {
        self.cache.len()
    }

    /// Window from the current slice's tags, `None` before any fetch or when absent.
    pub fn window_defaults(&self) -> Option<WindowLevel> {
        self.current
            .and_then(|index| self.entries.get(index))
            .and_then(|entry| entry.header.window)
    }

    /// Stored pixel values of slice `index`, before calibration and flipping.
    pub fn stored_values(&self, index: usize) -> Result<Array2<f64>, SliceError> {
        self.check_index(SliceAxis::Axial, index)?;
        decode_first_frame(&self.entries[index].path, index)
    }

    fn check_index(&self, axis: SliceAxis, index: usize) -> Result<(), SliceError> {
        let count = self.slice_count(axis);
        if index >= count {
            return Err(SliceError::OutOfRange { axis, index, count });
        }
        Ok(())
    }

    fn scan(directory: &Path) -> Result<Vec<SliceEntry>, LoadError> {
        if !directory.is_dir() {
            return Err(LoadError::NotADirectory(directory.to_path_buf()));
        }

        let mut entries = Vec::new();
        for item in WalkDir::new(directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let item = item.map_err(io::Error::from)?;
            let path = item.path();
            if !path.is_file() {
                continue;
            }
            if !is_dicom_file(path) {
                debug!("Skipping non-DICOM file {:?}", path);
                continue;
            }

            // Header only; pixel data is decoded lazily per slice.
            match OpenFileOptions::new()
                .read_until(tags::PIXEL_DATA)
                .open_file(path)
            {
                Ok(obj) => entries.push(SliceEntry {
                    path: path.to_path_buf(),
                    header: SliceHeader::from_object(&obj),
                }),
                Err(err) => warn!("Skipping unreadable DICOM file {:?}: {}", path, err),
            }
        }

        if entries.is_empty() {
            return Err(LoadError::NoValidDicom(directory.to_path_buf()));
        }

        entries.sort_by(acquisition_order);
        Ok(entries)
    }
}

impl Volume for DicomVolume {
    fn load(&mut self, source: &Path) -> Result<(), LoadError> {
        let entries = Self::scan(source)?;
        info!(
            "Loaded {} DICOM files from {}",
            entries.len(),
            source.display()
        );

        self.cache.clear();
        self.entries = entries;
        self.current = None;
        self.source = Some(source.to_path_buf());
        Ok(())
    }

    fn get_slice(&mut self, axis: SliceAxis, index: usize) -> Result<Array2<f64>, SliceError> {
        self.check_index(axis, index)?;

        if let Some(cached) = self.cache.get(index) {
            debug!("Slice {} served from cache", index);
            let slice = cached.clone();
            self.current = Some(index);
            return Ok(slice);
        }

        let entry = &self.entries[index];
        let stored = decode_first_frame(&entry.path, index)?;
        let slice = calibrate(stored, &entry.header);

        self.cache.insert(index, slice.clone());
        self.current = Some(index);
        Ok(slice)
    }

    /// A series stacks along a single axis; the other extents are empty.
    fn slice_count(&self, axis: SliceAxis) -> usize {
        match axis {
            SliceAxis::Axial => self.entries.len(),
            SliceAxis::Sagittal | SliceAxis::Coronal => 0,
        }
    }

    fn metadata(&self) -> VolumeMetadata {
        let Some(entry) = self.current.and_then(|index| self.entries.get(index)) else {
            return VolumeMetadata::Empty;
        };
        let header = &entry.header;
        let window = header.window.unwrap_or(DEFAULT_WINDOW);

        VolumeMetadata::Dicom(DicomMetadata {
            patient_id: header.patient_id.clone(),
            patient_age: header.patient_age.clone(),
            modality: header.modality.clone(),
            series_description: header.series_description.clone(),
            instance_number: header.instance_number,
            window_center: window.center,
            window_width: window.width,
            orientation: DICOM_ORIENTATION.to_string(),
        })
    }

    fn default_window(&self) -> Option<WindowLevel> {
        self.window_defaults()
    }
}

/// `raw * slope + intercept`, then a horizontal flip for the LPS display convention.
fn calibrate(stored: Array2<f64>, header: &SliceHeader) -> Array2<f64> {
    let slope = header.rescale_slope;
    let intercept = header.rescale_intercept;
    let mut slice = stored.mapv_into(|v| v * slope + intercept);
    slice.invert_axis(Axis(1));
    slice.as_standard_layout().into_owned()
}

fn first_plane<T>(frames: Array4<T>) -> Array2<f64>
where
    T: Copy + Into<f64>,
{
    // [frame, row, column, sample] -> first frame, first sample
    frames.slice(s![0, .., .., 0]).mapv(Into::into)
}

fn decode_first_frame(path: &Path, index: usize) -> Result<Array2<f64>, SliceError> {
    let decode_error = |message: String| SliceError::Decode { index, message };

    let obj = open_file(path).map_err(|e| decode_error(e.to_string()))?;
    let decoded = obj
        .decode_pixel_data()
        .map_err(|e| decode_error(e.to_string()))?;

    // Stored values only: rescale is applied explicitly from the header.
    let options = ConvertOptions::new()
        .with_modality_lut(ModalityLutOption::None)
        .with_voi_lut(VoiLutOption::Identity);

    let bits_allocated = decoded.bits_allocated();
    let plane = if decoded.pixel_representation() == PixelRepresentation::Unsigned {
        if bits_allocated <= 8 {
            decoded
                .to_ndarray_with_options::<u8>(&options)
                .map(first_plane)
        } else if bits_allocated <= 16 {
            decoded
                .to_ndarray_with_options::<u16>(&options)
                .map(first_plane)
        } else {
            decoded
                .to_ndarray_with_options::<u32>(&options)
                .map(first_plane)
        }
    } else if bits_allocated <= 8 {
        decoded
            .to_ndarray_with_options::<i8>(&options)
            .map(first_plane)
    } else if bits_allocated <= 16 {
        decoded
            .to_ndarray_with_options::<i16>(&options)
            .map(first_plane)
    } else {
        decoded
            .to_ndarray_with_options::<i32>(&options)
            .map(first_plane)
    };

    plane.map_err(|e| decode_error(e.to_string()))
}
