//
// volume_workflows.rs
// MedView-rs
//
// Integration-style tests covering DICOM series loading and ordering, NIfTI reorientation, background loading and rendering.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::{FileDicomObject, FileMetaTableBuilder, InMemDicomObject};
use dicom::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use medview::cli::{self, Cli};
use medview::loader::{self, LoadOptions, LoadOutcome};
use medview::{
    spawn_load, DicomVolume, LoadError, LoadRequest, NiftiVolume, SliceAxis, SliceError, Volume,
    VolumeMetadata,
};
use ndarray::{array, Array2, Array3};
use tempfile::{tempdir, TempDir};

const ROWS: u16 = 2;
const COLS: u16 = 3;

#[derive(Default)]
struct SliceFixture<'a> {
    instance: Option<i32>,
    pixels: &'a [u8],
    /// 16-bit signed samples; replaces `pixels` when set.
    signed_pixels: Option<&'a [i16]>,
    rescale: Option<(&'a str, &'a str)>,
    window: Option<(&'a str, &'a str)>,
}

fn write_slice(path: &Path, fixture: &SliceFixture) {
    // A tiny CT-like instance, 8-bit unsigned unless signed samples are given; one file per slice.
    let sop_instance = format!(
        "1.2.826.0.1.3680043.2.1125.{}",
        fixture.instance.unwrap_or(999)
    );

    let mut obj = InMemDicomObject::new_empty_with_dict(StandardDataDictionary);
    obj.put(DataElement::new(
        Tag(0x0010, 0x0020),
        VR::LO,
        PrimitiveValue::from("PAT123"),
    ));
    obj.put(DataElement::new(
        Tag(0x0010, 0x1010),
        VR::AS,
        PrimitiveValue::from("045Y"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0060),
        VR::CS,
        PrimitiveValue::from("CT"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x103e),
        VR::LO,
        PrimitiveValue::from("Head Axial"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0016),
        VR::UI,
        PrimitiveValue::from("1.2.840.10008.5.1.4.1.1.2"),
    ));
    obj.put(DataElement::new(
        Tag(0x0008, 0x0018),
        VR::UI,
        PrimitiveValue::from(sop_instance.clone()),
    ));
    if let Some(number) = fixture.instance {
        obj.put(DataElement::new(
            Tag(0x0020, 0x0013),
            VR::IS,
            PrimitiveValue::from(number.to_string()),
        )); // Instance Number
    }

    obj.put(DataElement::new(
        Tag(0x0028, 0x0010),
        VR::US,
        PrimitiveValue::from(ROWS),
    )); // Rows
    obj.put(DataElement::new(
        Tag(0x0028, 0x0011),
        VR::US,
        PrimitiveValue::from(COLS),
    )); // Columns
    obj.put(DataElement::new(
        Tag(0x0028, 0x0002),
        VR::US,
        PrimitiveValue::from(1_u16),
    )); // Samples per pixel
    let (bits, representation, pixel_vr, pixel_bytes) = match fixture.signed_pixels {
        Some(samples) => (
            16_u16,
            1_u16,
            VR::OW,
            samples.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>(),
        ),
        None => (8_u16, 0_u16, VR::OB, fixture.pixels.to_vec()),
    };
    obj.put(DataElement::new(
        Tag(0x0028, 0x0100),
        VR::US,
        PrimitiveValue::from(bits),
    )); // Bits Allocated
    obj.put(DataElement::new(
        Tag(0x0028, 0x0101),
        VR::US,
        PrimitiveValue::from(bits),
    )); // Bits Stored
    obj.put(DataElement::new(
        Tag(0x0028, 0x0102),
        VR::US,
        PrimitiveValue::from(bits - 1),
    )); // High Bit
    obj.put(DataElement::new(
        Tag(0x0028, 0x0103),
        VR::US,
        PrimitiveValue::from(representation),
    )); // Pixel Representation
    obj.put(DataElement::new(
        Tag(0x0028, 0x0004),
        VR::CS,
        PrimitiveValue::from("MONOCHROME2"),
    ));
    obj.put(DataElement::new(
        Tag(0x0028, 0x0008),
        VR::IS,
        PrimitiveValue::from("1"),
    )); // Number of Frames
    if let Some((intercept, slope)) = fixture.rescale {
        obj.put(DataElement::new(
            Tag(0x0028, 0x1052),
            VR::DS,
            PrimitiveValue::from(intercept),
        )); // Rescale Intercept
        obj.put(DataElement::new(
            Tag(0x0028, 0x1053),
            VR::DS,
            PrimitiveValue::from(slope),
        )); // Rescale Slope
    }
    if let Some((center, width)) = fixture.window {
        obj.put(DataElement::new(
            Tag(0x0028, 0x1050),
            VR::DS,
            PrimitiveValue::from(center),
        )); // Window Center
        obj.put(DataElement::new(
            Tag(0x0028, 0x1051),
            VR::DS,
            PrimitiveValue::from(width),
        )); // Window Width
    }
    obj.put(DataElement::new(
        Tag(0x7fe0, 0x0010),
        pixel_vr,
        PrimitiveValue::from(pixel_bytes),
    ));

    let meta = FileMetaTableBuilder::new()
        .transfer_syntax(EXPLICIT_VR_LITTLE_ENDIAN.uid())
        .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.2")
        .media_storage_sop_instance_uid(sop_instance)
        .build()
        .expect("meta");

    let mut file_obj = FileDicomObject::new_empty_with_dict_and_meta(StandardDataDictionary, meta);
    for elem in obj {
        file_obj.put(elem);
    }
    file_obj.write_to_file(path).expect("write test dicom");
}

/// Series of three slices stored out of order, plus files that must be ignored.
fn build_test_series() -> (TempDir, PathBuf) {
    let dir = tempdir().expect("tempdir");
    let series = dir.path().to_path_buf();

    // File names deliberately disagree with the acquisition order.
    for (name, instance, value) in [("a.dcm", 3, 30u8), ("b.dcm", 1, 10), ("c.dcm", 2, 20)] {
        let pixels = [value; (ROWS as usize) * (COLS as usize)];
        write_slice(
            &series.join(name),
            &SliceFixture {
                instance: Some(instance),
                pixels: &pixels,
                ..Default::default()
            },
        );
    }

    fs::write(series.join("README.txt"), "not an image").expect("junk");
    fs::write(series.join("fake.dcm"), "DICM but not really").expect("junk");
    fs::create_dir(series.join("nested")).expect("subdir");

    (dir, series)
}

#[test]
fn series_is_filtered_and_sorted_by_instance_number() {
    let (_dir, series) = build_test_series();
    let mut volume = DicomVolume::open(&series).expect("load series");

    assert_eq!(volume.len(), 3);
    assert_eq!(volume.slice_count(SliceAxis::Axial), 3);
    assert_eq!(volume.instance_numbers(), vec![Some(1), Some(2), Some(3)]);

    for (index, expected) in [(0, 10.0), (1, 20.0), (2, 30.0)] {
        let slice = volume.get_slice(SliceAxis::Axial, index).expect("slice");
        assert_eq!(slice.dim(), (ROWS as usize, COLS as usize));
        assert!(slice.iter().all(|&v| v == expected));
    }
}

#[test]
fn unnumbered_files_come_last_in_name_order() {
    let (_dir, series) = build_test_series();
    let pixels = [0u8; 6];
    for name in ["y.dcm", "x.dcm"] {
        write_slice(
            &series.join(name),
            &SliceFixture {
                instance: None,
                pixels: &pixels,
                ..Default::default()
            },
        );
    }

    let volume = DicomVolume::open(&series).expect("load series");
    assert_eq!(
        volume.instance_numbers(),
        vec![Some(1), Some(2), Some(3), None, None]
    );
    let names: Vec<_> = volume
        .files()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["b.dcm", "c.dcm", "a.dcm", "x.dcm", "y.dcm"]);
}

#[test]
fn slices_are_rescaled_then_flipped() {
    let dir = tempdir().unwrap();
    write_slice(
        &dir.path().join("slice.dcm"),
        &SliceFixture {
            instance: Some(1),
            pixels: &[1, 2, 3, 4, 5, 6],
            rescale: Some(("-10", "2")),
            ..Default::default()
        },
    );

    let mut volume = DicomVolume::open(dir.path()).unwrap();
    let stored = volume.stored_values(0).unwrap();
    assert_eq!(stored, array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);

    let slice = volume.get_slice(SliceAxis::Axial, 0).unwrap();
    assert_eq!(slice, array![[-4.0, -6.0, -8.0], [2.0, 0.0, -2.0]]);
    // a cache hit returns the same calibrated data
    assert_eq!(volume.get_slice(SliceAxis::Axial, 0).unwrap(), slice);
    assert_eq!(volume.cached_slices(), 1);
}

#[test]
fn signed_ct_slices_keep_negative_values() {
    let dir = tempdir().unwrap();
    write_slice(
        &dir.path().join("ct.dcm"),
        &SliceFixture {
            instance: Some(1),
            signed_pixels: Some(&[-2000, 0, 1024, 3000, -1, 1]),
            rescale: Some(("-1024", "1")),
            ..Default::default()
        },
    );

    let mut volume = DicomVolume::open(dir.path()).unwrap();
    assert_eq!(
        volume.stored_values(0).unwrap(),
        array![[-2000.0, 0.0, 1024.0], [3000.0, -1.0, 1.0]]
    );
    assert_eq!(
        volume.get_slice(SliceAxis::Axial, 0).unwrap(),
        array![[0.0, -1024.0, -3024.0], [-1023.0, -1025.0, 1976.0]]
    );
}

#[test]
fn unreadable_header_after_magic_is_skipped() {
    let dir = tempdir().unwrap();
    write_slice(
        &dir.path().join("good.dcm"),
        &SliceFixture {
            instance: Some(1),
            pixels: &[4; 6],
            ..Default::default()
        },
    );

    // Valid preamble and magic, then bytes that are no file meta group.
    let mut corrupt = vec![0u8; 128];
    corrupt.extend_from_slice(b"DICM");
    corrupt.extend_from_slice(&[0xff; 64]);
    fs::write(dir.path().join("broken.dcm"), corrupt).unwrap();

    let mut volume = DicomVolume::open(dir.path()).expect("valid file still loads");
    assert_eq!(volume.len(), 1);
    let names: Vec<_> = volume
        .files()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["good.dcm"]);
    assert_eq!(volume.get_slice(SliceAxis::Axial, 0).unwrap()[[0, 0]], 4.0);

    // Nothing readable left: the load fails instead of yielding an empty series.
    fs::remove_file(dir.path().join("good.dcm")).unwrap();
    assert!(matches!(
        DicomVolume::open(dir.path()),
        Err(LoadError::NoValidDicom(_))
    ));
}

#[test]
fn out_of_range_requests_fail() {
    let (_dir, series) = build_test_series();
    let mut volume = DicomVolume::open(&series).unwrap();

    assert!(matches!(
        volume.get_slice(SliceAxis::Axial, 3),
        Err(SliceError::OutOfRange {
            index: 3,
            count: 3,
            ..
        })
    ));
    // a series only stacks along one axis
    assert_eq!(volume.slice_count(SliceAxis::Sagittal), 0);
    assert!(volume.get_slice(SliceAxis::Coronal, 0).is_err());
}

#[test]
fn metadata_follows_the_current_slice() {
    let dir = tempdir().unwrap();
    let pixels = [0u8; 6];
    write_slice(
        &dir.path().join("1.dcm"),
        &SliceFixture {
            instance: Some(1),
            pixels: &pixels,
            window: Some(("50", "150")),
            ..Default::default()
        },
    );
    write_slice(
        &dir.path().join("2.dcm"),
        &SliceFixture {
            instance: Some(2),
            pixels: &pixels,
            ..Default::default()
        },
    );

    let mut volume = DicomVolume::open(dir.path()).unwrap();
    assert!(volume.metadata().is_empty());
    assert!(volume.window_defaults().is_none());

    volume.get_slice(SliceAxis::Axial, 0).unwrap();
    let meta = volume.metadata();
    assert_eq!(meta.get("Patient ID").as_deref(), Some("PAT123"));
    assert_eq!(meta.get("Patient Age").as_deref(), Some("045Y"));
    assert_eq!(meta.get("Modality").as_deref(), Some("CT"));
    assert_eq!(meta.get("Series Description").as_deref(), Some("Head Axial"));
    assert!(meta.get("Orientation").unwrap().contains("LPS"));
    assert_eq!(volume.window_defaults().map(|w| w.width), Some(150.0));

    volume.get_slice(SliceAxis::Axial, 1).unwrap();
    match volume.metadata() {
        VolumeMetadata::Dicom(meta) => {
            assert_eq!(meta.instance_number, Some(2));
            assert_eq!((meta.window_center, meta.window_width), (40.0, 400.0));
        }
        other => panic!("unexpected metadata {:?}", other),
    }
    assert!(volume.window_defaults().is_none());
}

#[test]
fn reload_clears_the_cache() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slice.dcm");
    write_slice(
        &path,
        &SliceFixture {
            instance: Some(1),
            pixels: &[7; 6],
            ..Default::default()
        },
    );

    let mut volume = DicomVolume::new();
    volume.load(dir.path()).unwrap();
    assert_eq!(volume.get_slice(SliceAxis::Axial, 0).unwrap()[[0, 0]], 7.0);
    assert_eq!(volume.cached_slices(), 1);

    write_slice(
        &path,
        &SliceFixture {
            instance: Some(1),
            pixels: &[9; 6],
            ..Default::default()
        },
    );
    volume.load(dir.path()).unwrap();
    assert_eq!(volume.cached_slices(), 0);
    assert!(volume.metadata().is_empty());
    assert_eq!(volume.get_slice(SliceAxis::Axial, 0).unwrap()[[0, 0]], 9.0);
}

#[test]
fn failed_load_keeps_previous_state() {
    let (_dir, series) = build_test_series();
    let empty = tempdir().unwrap();
    fs::write(empty.path().join("notes.txt"), "nothing here").unwrap();

    let mut volume = DicomVolume::open(&series).unwrap();
    assert!(matches!(
        volume.load(empty.path()),
        Err(LoadError::NoValidDicom(_))
    ));
    assert!(matches!(
        volume.load(&series.join("a.dcm")),
        Err(LoadError::NotADirectory(_))
    ));
    assert_eq!(volume.len(), 3);
    assert_eq!(volume.source(), Some(series.as_path()));
}

#[test]
fn small_cache_still_serves_every_slice() {
    let (_dir, series) = build_test_series();
    let mut volume = DicomVolume::with_cache_capacity(1);
    volume.load(&series).unwrap();

    for index in [0, 1, 2, 0] {
        volume.get_slice(SliceAxis::Axial, index).unwrap();
        assert_eq!(volume.cached_slices(), 1);
    }
}

// --- NIfTI ---------------------------------------------------------------

#[derive(Default)]
struct NiftiFixture {
    dims: Vec<usize>,
    sform: Option<[[f32; 4]; 3]>,
    quatern: Option<[f32; 3]>,
    qoffset: [f32; 3],
}

fn put_i16(buf: &mut [u8], offset: usize, value: i16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_f32(buf: &mut [u8], offset: usize, value: f32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Single-file NIfTI-1 with float32 samples in Fortran order.
fn write_nifti(path: &Path, fixture: &NiftiFixture, values: &[f32]) {
    let mut bytes = vec![0u8; 352];
    bytes[0..4].copy_from_slice(&348i32.to_le_bytes());

    put_i16(&mut bytes, 40, fixture.dims.len() as i16);
    for i in 0..7 {
        let extent = fixture.dims.get(i).copied().unwrap_or(1);
        put_i16(&mut bytes, 42 + 2 * i, extent as i16);
    }
    put_i16(&mut bytes, 70, 16); // float32
    put_i16(&mut bytes, 72, 32);

    put_f32(&mut bytes, 76, 1.0); // qfac
    for i in 1..8 {
        put_f32(&mut bytes, 76 + 4 * i, 1.0);
    }
    put_f32(&mut bytes, 108, 352.0);
    put_f32(&mut bytes, 112, 1.0);

    if let Some([b, c, d]) = fixture.quatern {
        put_i16(&mut bytes, 252, 1);
        put_f32(&mut bytes, 256, b);
        put_f32(&mut bytes, 260, c);
        put_f32(&mut bytes, 264, d);
        for (i, offset) in fixture.qoffset.iter().enumerate() {
            put_f32(&mut bytes, 268 + 4 * i, *offset);
        }
    }
    if let Some(rows) = fixture.sform {
        put_i16(&mut bytes, 254, 1);
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                put_f32(&mut bytes, 280 + 16 * r + 4 * c, *value);
            }
        }
    }
    bytes[344..348].copy_from_slice(b"n+1\0");

    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    fs::write(path, bytes).expect("write nifti");
}

const NX: usize = 2;
const NY: usize = 3;
const NZ: usize = 4;

fn ramp() -> Array3<f32> {
    Array3::from_shape_fn((NX, NY, NZ), |(x, y, z)| (x * 100 + y * 10 + z) as f32)
}

fn fortran_values(data: &Array3<f32>) -> Vec<f32> {
    data.t().iter().copied().collect()
}

const RAS: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

const LPS: [[f32; 4]; 3] = [
    [-1.0, 0.0, 0.0, 0.0],
    [0.0, -1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

#[test]
fn nifti_loads_in_canonical_orientation() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ras.nii");
    let data = ramp();
    write_nifti(
        &path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            sform: Some(RAS),
            quatern: None,
            ..Default::default()
        },
        &fortran_values(&data),
    );

    let mut volume = NiftiVolume::open(&path).expect("load nifti");
    assert_eq!(volume.shape(), [NX, NY, NZ]);
    assert_eq!(volume.slice_count(SliceAxis::Sagittal), NX);
    assert_eq!(volume.slice_count(SliceAxis::Coronal), NY);
    assert_eq!(volume.slice_count(SliceAxis::Axial), NZ);

    let axial = volume.get_slice(SliceAxis::Axial, 1).unwrap();
    assert_eq!(axial.dim(), (NY, NX));
    for a in 0..NY {
        for b in 0..NX {
            assert_eq!(axial[[a, b]], data[[NX - 1 - b, NY - 1 - a, 1]] as f64);
        }
    }

    let meta = volume.metadata();
    assert_eq!(meta.get("Dimensions").as_deref(), Some("2 x 3 x 4"));
    assert_eq!(
        meta.get("Voxel Size").as_deref(),
        Some("1.000 x 1.000 x 1.000 mm")
    );
    assert_eq!(meta.get("Data Type").as_deref(), Some("Float32"));
    assert!(meta.get("Orientation").unwrap().contains("RAS"));
}

#[test]
fn lps_input_is_reoriented_before_slicing() {
    let dir = tempdir().unwrap();
    let data = ramp();

    // The same anatomy stored left-posterior first must display identically.
    let mut flipped = data.clone();
    flipped.invert_axis(ndarray::Axis(0));
    flipped.invert_axis(ndarray::Axis(1));

    let ras_path = dir.path().join("ras.nii");
    let lps_path = dir.path().join("lps.nii");
    let qform_path = dir.path().join("lps_qform.nii");
    write_nifti(
        &ras_path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            sform: Some(RAS),
            quatern: None,
            ..Default::default()
        },
        &fortran_values(&data),
    );
    write_nifti(
        &lps_path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            sform: Some(LPS),
            quatern: None,
            ..Default::default()
        },
        &fortran_values(&flipped),
    );
    // half turn about z: qform-only LPS
    write_nifti(
        &qform_path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            sform: None,
            quatern: Some([0.0, 0.0, 1.0]),
            ..Default::default()
        },
        &fortran_values(&flipped),
    );

    let mut ras = NiftiVolume::open(&ras_path).unwrap();
    let mut lps = NiftiVolume::open(&lps_path).unwrap();
    let mut qform = NiftiVolume::open(&qform_path).unwrap();

    for axis in SliceAxis::ALL {
        let reference = ras.get_slice(axis, 1).unwrap();
        assert_eq!(lps.get_slice(axis, 1).unwrap(), reference, "{} axis", axis);
        assert_eq!(qform.get_slice(axis, 1).unwrap(), reference, "{} axis", axis);
    }

    assert_eq!(
        lps.metadata().get("Orientation").as_deref(),
        Some("RAS (canonical, source LPS)")
    );
    assert_eq!(
        qform.metadata().get("Orientation").as_deref(),
        Some("RAS (canonical, source LPS)")
    );
}

#[test]
fn qform_offset_becomes_the_affine_translation() {
    let dir = tempdir().unwrap();
    let ras_path = dir.path().join("shifted.nii");
    let lps_path = dir.path().join("shifted_lps.nii");
    write_nifti(
        &ras_path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            quatern: Some([0.0, 0.0, 0.0]),
            qoffset: [10.0, -20.0, 5.0],
            ..Default::default()
        },
        &fortran_values(&ramp()),
    );
    // Half turn about z: the old last voxel of x and y becomes the origin.
    write_nifti(
        &lps_path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            quatern: Some([0.0, 0.0, 1.0]),
            qoffset: [10.0, -20.0, 5.0],
            ..Default::default()
        },
        &fortran_values(&ramp()),
    );

    let affine = NiftiVolume::open(&ras_path).unwrap().affine().unwrap();
    assert_eq!(
        [affine[0][3], affine[1][3], affine[2][3]],
        [10.0, -20.0, 5.0]
    );

    let affine = NiftiVolume::open(&lps_path).unwrap().affine().unwrap();
    let x = 10.0 - (NX - 1) as f64;
    let y = -20.0 - (NY - 1) as f64;
    assert_eq!([affine[0][3], affine[1][3], affine[2][3]], [x, y, 5.0]);
    assert_eq!(affine[0][0], 1.0);
    assert_eq!(affine[1][1], 1.0);
}

#[test]
fn two_dimensional_nifti_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flat.nii");
    write_nifti(
        &path,
        &NiftiFixture {
            dims: vec![4, 5],
            sform: None,
            quatern: None,
            ..Default::default()
        },
        &[0.5; 20],
    );

    let mut volume = NiftiVolume::new();
    match volume.load(&path) {
        Err(LoadError::Dimensionality { ndim, shape }) => {
            assert_eq!(ndim, 2);
            assert_eq!(shape, vec![4, 5]);
        }
        other => panic!("expected dimensionality error, got {:?}", other.err()),
    }
    assert!(volume.metadata().is_empty());
}

#[test]
fn four_dimensional_nifti_keeps_the_first_volume() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("series.nii");
    let mut values = fortran_values(&ramp());
    values.extend(std::iter::repeat(-1.0).take(NX * NY * NZ));
    write_nifti(
        &path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ, 2],
            sform: Some(RAS),
            quatern: None,
            ..Default::default()
        },
        &values,
    );

    let volume = NiftiVolume::open(&path).unwrap();
    assert_eq!(volume.shape(), [NX, NY, NZ]);
    let canonical = volume.data().unwrap();
    assert!(canonical.iter().all(|&v| v >= 0.0));
}

#[test]
fn missing_nifti_reports_the_path() {
    let dir = tempdir().unwrap();
    let mut volume = NiftiVolume::new();
    let err = volume.load(&dir.path().join("absent.nii")).unwrap_err();
    assert!(matches!(err, LoadError::Nifti { .. } | LoadError::Io(_)));
}

// --- background loading and CLI ------------------------------------------

#[tokio::test]
async fn background_load_delivers_a_ready_volume() {
    let (_dir, series) = build_test_series();
    let (sender, mut receiver) = loader::channel();

    let handle = spawn_load(LoadRequest::DicomDirectory(series.clone()), sender);
    let event = receiver.recv().await.expect("load event");
    assert_eq!(event.request, LoadRequest::DicomDirectory(series));

    let mut volume = event.result.expect("loaded");
    assert_eq!(volume.slice_count(SliceAxis::Axial), 3);
    let first: Array2<f64> = volume.get_slice(SliceAxis::Axial, 0).unwrap();
    assert!(first.iter().all(|&v| v == 10.0));
    assert_eq!(handle.join().await, LoadOutcome::Delivered);
}

#[tokio::test]
async fn background_load_reports_failures() {
    let dir = tempdir().unwrap();
    let (sender, mut receiver) = loader::channel();
    spawn_load(LoadRequest::DicomDirectory(dir.path().to_path_buf()), sender);

    let event = receiver.recv().await.expect("load event");
    assert!(matches!(event.result, Err(LoadError::NoValidDicom(_))));
}

#[tokio::test]
async fn dropped_receiver_discards_the_result() {
    let (_dir, series) = build_test_series();
    let (sender, receiver) = loader::channel();
    drop(receiver);

    let handle = spawn_load(LoadRequest::DicomDirectory(series), sender);
    assert_eq!(handle.join().await, LoadOutcome::ReceiverDropped);
}

#[test]
fn cancelled_load_never_reaches_the_consumer() {
    let (_dir, series) = build_test_series();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .max_blocking_threads(1)
        .enable_all()
        .build()
        .unwrap();

    runtime.block_on(async {
        // Hold the only blocking thread so the load is queued behind it.
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let blocker = tokio::task::spawn_blocking(move || {
            let _ = gate_rx.recv();
        });

        let (sender, mut receiver) = loader::channel();
        let handle = spawn_load(LoadRequest::DicomDirectory(series), sender);
        handle.cancel();
        assert!(handle.is_cancelled());

        gate_tx.send(()).unwrap();
        blocker.await.unwrap();
        assert_eq!(handle.join().await, LoadOutcome::Cancelled);
        assert!(receiver.recv().await.is_none());
    });
}

#[tokio::test]
async fn load_helper_opens_nifti() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ras.nii");
    write_nifti(
        &path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            sform: None,
            quatern: None,
            ..Default::default()
        },
        &fortran_values(&ramp()),
    );

    let volume = loader::load(LoadRequest::NiftiFile(path), LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(volume.slice_count(SliceAxis::Coronal), NY);
    assert!(matches!(volume.metadata(), VolumeMetadata::Nifti(_)));
}

#[tokio::test]
async fn cli_renders_a_series_slice_to_png() {
    let (_dir, series) = build_test_series();
    let out_dir = tempdir().unwrap();
    let output = out_dir.path().join("slice.png");

    let cli = Cli::try_parse_from([
        "medview",
        "--cache-size",
        "2",
        "render",
        "--directory",
        series.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
        "--colormap",
        "bone",
        "--max-width",
        "12",
        "--max-height",
        "12",
    ])
    .unwrap();
    cli::execute(cli).await.expect("render");

    let png = fs::read(&output).unwrap();
    assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
    let image = image::load_from_memory(&png).unwrap();
    assert_eq!((image.width(), image.height()), (12, 8));
}

#[tokio::test]
async fn cli_info_and_stats_run_on_nifti() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ras.nii");
    write_nifti(
        &path,
        &NiftiFixture {
            dims: vec![NX, NY, NZ],
            sform: Some(RAS),
            quatern: None,
            ..Default::default()
        },
        &fortran_values(&ramp()),
    );
    let image_arg = path.to_str().unwrap();

    let info = Cli::try_parse_from(["medview", "info", "--image", image_arg, "--json"]).unwrap();
    cli::execute(info).await.expect("info");

    let stats = Cli::try_parse_from([
        "medview", "stats", "--image", image_arg, "--axis", "sagittal", "--bins", "4",
    ])
    .unwrap();
    cli::execute(stats).await.expect("stats");

    let out_of_range = Cli::try_parse_from([
        "medview", "stats", "--image", image_arg, "--index", "99",
    ])
    .unwrap();
    assert!(cli::execute(out_of_range).await.is_err());
}
