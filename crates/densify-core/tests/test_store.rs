mod common;

use ndarray::{Array1, Array2};

use densify_core::error::DensifyError;
use densify_core::store::{AnySparseStore, SparseStore};

use common::{ramp_store, reference_store};

fn mask_2x2() -> Array2<f32> {
    Array2::from_shape_vec((2, 2), vec![0.0, 1.0, 2.0, f32::NAN]).unwrap()
}

fn radius_3() -> Array1<f32> {
    Array1::from_vec(vec![0.0, 1.0, 2.0])
}

fn background_1x3() -> Array2<f32> {
    Array2::from_shape_vec((1, 3), vec![10.0, 20.0, 30.0]).unwrap()
}

#[test]
fn test_accessors() {
    let store = ramp_store(7);
    assert_eq!(store.nframes(), 7);
    assert_eq!(store.shape(), (4, 4));
    assert_eq!(store.radial_bins(), 6);
    assert_eq!(store.peak_count(), 7);
    assert_eq!(store.peaks_in_frame(3).unwrap(), 1);
    assert_eq!(store.dummy(), -1);
}

#[test]
fn test_frame_ptr_must_start_at_zero() {
    let err = SparseStore::new(
        mask_2x2(),
        radius_3(),
        background_1x3(),
        vec![1, 2],
        vec![0],
        vec![5],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_frame_ptr_must_be_non_decreasing() {
    let background = Array2::from_shape_vec((2, 3), vec![1.0; 6]).unwrap();
    let err = SparseStore::new(
        mask_2x2(),
        radius_3(),
        background,
        vec![0, 2, 1],
        vec![0],
        vec![5],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_frame_ptr_end_must_match_peak_arrays() {
    let err = SparseStore::new(
        mask_2x2(),
        radius_3(),
        background_1x3(),
        vec![0, 2],
        vec![0],
        vec![5],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_index_and_intensity_lengths_must_agree() {
    let err = SparseStore::new(
        mask_2x2(),
        radius_3(),
        background_1x3(),
        vec![0, 1],
        vec![0],
        vec![5, 6],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_background_frame_count_must_match_frame_ptr() {
    let background = Array2::from_shape_vec((3, 3), vec![1.0; 9]).unwrap();
    let err = SparseStore::new(
        mask_2x2(),
        radius_3(),
        background,
        vec![0, 1],
        vec![0],
        vec![5],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_background_bins_must_match_radius() {
    let background = Array2::from_shape_vec((1, 2), vec![10.0, 20.0]).unwrap();
    let err = SparseStore::new(
        mask_2x2(),
        radius_3(),
        background,
        vec![0, 1],
        vec![0],
        vec![5],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_radius_must_be_strictly_increasing() {
    let radius = Array1::from_vec(vec![0.0, 2.0, 2.0]);
    let err = SparseStore::new(
        mask_2x2(),
        radius,
        background_1x3(),
        vec![0, 1],
        vec![0],
        vec![5],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_peak_offsets_must_fit_the_dense_shape() {
    let err = SparseStore::new(
        mask_2x2(),
        radius_3(),
        background_1x3(),
        vec![0, 1],
        vec![4],
        vec![5],
        -1,
    )
    .unwrap_err();
    assert!(matches!(err, DensifyError::CorruptStore(_)));
}

#[test]
fn test_peaks_in_frame_out_of_range() {
    let store = reference_store();
    let err = store.peaks_in_frame(1).unwrap_err();
    assert!(matches!(
        err,
        DensifyError::FrameIndexOutOfRange { index: 1, total: 1 }
    ));
}

#[test]
fn test_any_store_metadata() {
    let any = AnySparseStore::I32(reference_store());
    assert_eq!(any.nframes(), 1);
    assert_eq!(any.shape(), (2, 2));
    assert_eq!(any.radial_bins(), 3);
    assert_eq!(any.peak_count(), 1);
    assert_eq!(any.dtype_name(), "int32");
    assert_eq!(any.dummy_display(), "-1");
}

#[test]
fn test_dummy_override() {
    let mut any = AnySparseStore::I32(reference_store());
    any.override_dummy(-2.0).unwrap();
    assert_eq!(any.dummy_display(), "-2");
}

#[test]
fn test_dummy_override_must_fit_the_dtype() {
    let mut any = AnySparseStore::I32(reference_store());
    let err = any.override_dummy(1e300).unwrap_err();
    assert!(matches!(
        err,
        DensifyError::DummyOutOfRange { dtype: "int32", .. }
    ));
}
