#![allow(dead_code)]

use ndarray::{Array1, Array2};

use densify_core::store::SparseStore;

/// 2x2 reference store: radial grid [0, 1, 2] with background [10, 20, 30],
/// one peak of 99 at flat offset 1, a NaN-masked pixel at (1, 1), dummy -1.
///
/// Reconstruction of frame 0 must yield [[10, 99], [30, -1]].
pub fn reference_store() -> SparseStore<i32> {
    let mask = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 2.0, f32::NAN]).unwrap();
    let radius = Array1::from_vec(vec![0.0, 1.0, 2.0]);
    let background = Array2::from_shape_vec((1, 3), vec![10.0, 20.0, 30.0]).unwrap();
    SparseStore::new(
        mask,
        radius,
        background,
        vec![0, 1],
        vec![1],
        vec![99],
        -1,
    )
    .unwrap()
}

/// Same geometry as [`reference_store`] but with no stored peaks.
pub fn peakless_store() -> SparseStore<i32> {
    let mask = Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 2.0, f32::NAN]).unwrap();
    let radius = Array1::from_vec(vec![0.0, 1.0, 2.0]);
    let background = Array2::from_shape_vec((1, 3), vec![10.0, 20.0, 30.0]).unwrap();
    SparseStore::new(mask, radius, background, vec![0, 0], vec![], vec![], -1).unwrap()
}

/// Multi-frame 4x4 store with a per-frame ramp background and one peak per
/// frame walking across the image.
pub fn ramp_store(nframes: usize) -> SparseStore<i32> {
    let (h, w) = (4usize, 4usize);
    let mask = Array2::from_shape_fn((h, w), |(r, c)| (r * w + c) as f32 / 3.0);
    let radius = Array1::from_vec(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    let background =
        Array2::from_shape_fn((nframes, 6), |(f, b)| (10 * (f + 1) + b) as f32);
    let frame_ptr: Vec<usize> = (0..=nframes).collect();
    let index: Vec<usize> = (0..nframes).map(|f| f % (h * w)).collect();
    let intensity: Vec<i32> = (0..nframes).map(|f| 1000 + f as i32).collect();
    SparseStore::new(mask, radius, background, frame_ptr, index, intensity, -1).unwrap()
}
