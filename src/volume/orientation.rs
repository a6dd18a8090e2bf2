//
// orientation.rs
// MedView-rs
//
// Voxel-to-world affines from NIfTI headers and reorientation of voxel grids to RAS+.
//
// Thales Matheus Mendonça Santos - November 2025

use ndarray::{Array3, Axis};
use nifti::NiftiHeader;

/// Row-major 4x4 voxel-to-world transform.
pub type Affine = [[f64; 4]; 4];

pub fn identity() -> Affine {
    let mut affine = [[0.0; 4]; 4];
    for (i, row) in affine.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    affine
}

fn diagonal(pixdim: [f64; 3]) -> Affine {
    let mut affine = identity();
    for (i, size) in pixdim.iter().enumerate() {
        affine[i][i] = if *size > 0.0 { *size } else { 1.0 };
    }
    affine
}

/// Affine from the header: sform when present, else qform, else the voxel sizes alone.
pub fn affine_from_header(header: &NiftiHeader) -> Affine {
    let pixdim = [
        header.pixdim[1] as f64,
        header.pixdim[2] as f64,
        header.pixdim[3] as f64,
    ];

    if header.sform_code > 0 {
        let mut affine = identity();
        for (i, row) in [header.srow_x, header.srow_y, header.srow_z]
            .iter()
            .enumerate()
        {
            for j in 0..4 {
                affine[i][j] = row[j] as f64;
            }
        }
        return affine;
    }

    if header.qform_code > 0 {
        return quaternion_affine(
            [
                header.quatern_b as f64,
                header.quatern_c as f64,
                header.quatern_d as f64,
            ],
            [
                header.quatern_x as f64,
                header.quatern_y as f64,
                header.quatern_z as f64,
            ],
            pixdim,
            header.pixdim[0] as f64,
        );
    }

    diagonal(pixdim)
}

/// qform rotation from the quaternion (b, c, d), scaled by voxel size; `qfac < 0` mirrors the third axis.
pub fn quaternion_affine(bcd: [f64; 3], offset: [f64; 3], pixdim: [f64; 3], qfac: f64) -> Affine {
    let [mut b, mut c, mut d] = bcd;
    let mut a = 1.0 - (b * b + c * c + d * d);
    if a < 1e-7 {
        // (b, c, d) is a 180 degree rotation; renormalize it.
        let norm = (b * b + c * c + d * d).sqrt();
        if norm > 0.0 {
            b /= norm;
            c /= norm;
            d /= norm;
        }
        a = 0.0;
    } else {
        a = a.sqrt();
    }

    let rotation = [
        [
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            2.0 * (b * d + a * c),
        ],
        [
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            2.0 * (c * d - a * b),
        ],
        [
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            a * a + d * d - c * c - b * b,
        ],
    ];

    let mut scale = pixdim.map(|v| if v > 0.0 { v } else { 1.0 });
    if qfac < 0.0 {
        scale[2] = -scale[2];
    }

    let mut affine = identity();
    for i in 0..3 {
        for j in 0..3 {
            affine[i][j] = rotation[i][j] * scale[j];
        }
        affine[i][3] = offset[i];
    }
    affine
}

/// World axis and direction each voxel axis runs along, `(world_axis, positive)`.
///
/// Assigned greedily: the largest remaining |A[i][j]| claims world row i for voxel column j.
fn axis_assignment(affine: &Affine) -> [(usize, bool); 3] {
    let mut assignment = [(0usize, true); 3];
    let mut used_rows = [false; 3];
    let mut used_cols = [false; 3];

    for _ in 0..3 {
        let mut best: Option<(usize, usize, f64)> = None;
        for (i, row) in affine.iter().take(3).enumerate() {
            if used_rows[i] {
                continue;
            }
            for (j, value) in row.iter().take(3).enumerate() {
                if used_cols[j] {
                    continue;
                }
                let magnitude = value.abs();
                if best.map_or(true, |(_, _, m)| magnitude > m) {
                    best = Some((i, j, magnitude));
                }
            }
        }
        if let Some((i, j, _)) = best {
            used_rows[i] = true;
            used_cols[j] = true;
            assignment[j] = (i, affine[i][j] >= 0.0);
        }
    }
    assignment
}

/// Anatomical direction codes of the voxel axes, e.g. `['L', 'P', 'S']`.
pub fn axis_codes(affine: &Affine) -> [char; 3] {
    axis_assignment(affine).map(|(world, positive)| match (world, positive) {
        (0, true) => 'R',
        (0, false) => 'L',
        (1, true) => 'A',
        (1, false) => 'P',
        (_, true) => 'S',
        (_, false) => 'I',
    })
}

pub fn orientation_label(affine: &Affine) -> String {
    axis_codes(affine).iter().collect()
}

/// Column norms of the 3x3 part.
pub fn voxel_sizes(affine: &Affine) -> [f64; 3] {
    let mut sizes = [0.0; 3];
    for (j, size) in sizes.iter_mut().enumerate() {
        *size = (0..3).map(|i| affine[i][j] * affine[i][j]).sum::<f64>().sqrt();
    }
    sizes
}

/// Permute and flip the voxel grid so that axes run R, A, S; returns the grid with its updated affine.
pub fn reorient_to_ras<A: Clone>(data: Array3<A>, affine: &Affine) -> (Array3<A>, Affine) {
    let assignment = axis_assignment(affine);

    // perm[k] is the source axis that runs along world axis k
    let mut perm = [0usize, 1, 2];
    for (j, (world, _)) in assignment.iter().enumerate() {
        perm[*world] = j;
    }

    let shape = data.shape().to_vec();
    let mut canonical = data.permuted_axes(perm);
    let mut updated = identity();

    for k in 0..3 {
        let source = perm[k];
        let (_, positive) = assignment[source];
        for i in 0..3 {
            updated[i][k] = affine[i][source];
        }
        if !positive {
            canonical.invert_axis(Axis(k));
            let last = shape[source].saturating_sub(1) as f64;
            for i in 0..3 {
                updated[i][3] += updated[i][k] * last;
                updated[i][k] = -updated[i][k];
            }
        }
    }
    for i in 0..3 {
        updated[i][3] += affine[i][3];
    }

    (canonical.as_standard_layout().into_owned(), updated)
}
