use ndarray::{Array2, ArrayView1};
use tracing::debug;

use crate::error::{DensifyError, Result};
use crate::store::{Intensity, SparseStore};

/// Per-call reconstruction options.
///
/// Carried as an explicit value instead of store-wide state. The upstream
/// sparsifier exposes a noise-reconstruction switch, but no noise model is
/// defined for the dense rebuild; the flag is accepted and ignored so that
/// reconstruction stays deterministic.
#[derive(Clone, Copy, Debug)]
pub struct ReconstructOptions {
    pub noise: bool,
}

impl Default for ReconstructOptions {
    fn default() -> Self {
        Self { noise: true }
    }
}

/// Rebuild the dense frame at `frame` from the sparse representation.
///
/// The radial background profile of the frame is interpolated over the mask,
/// the stored peak pixels are overlaid, and permanently invalid pixels are
/// filled with the store's dummy value. Pure: two calls with the same inputs
/// produce bit-identical arrays.
pub fn reconstruct<T: Intensity>(store: &SparseStore<T>, frame: usize) -> Result<Array2<T>> {
    reconstruct_with(store, frame, &ReconstructOptions::default())
}

/// [`reconstruct`] with explicit options.
pub fn reconstruct_with<T: Intensity>(
    store: &SparseStore<T>,
    frame: usize,
    options: &ReconstructOptions,
) -> Result<Array2<T>> {
    let (start, stop) = store.frame_slice(frame)?;

    if options.noise {
        debug!(frame, "noise reconstruction requested but not implemented; rebuilding without noise");
    }

    let background = store.background_avg.row(frame);
    let flat = interp_flat(&store.mask, store.radius.view(), background);

    // Overlay the stored peaks on the flat background, then cast. The peaks
    // are written after the cast so integer rounding never touches them.
    let mut dense: Vec<T> = flat.into_iter().map(T::from_background).collect();
    for (&offset, &value) in store.index[start..stop]
        .iter()
        .zip(&store.intensity[start..stop])
    {
        dense[offset] = value;
    }

    for &offset in store.masked_offsets() {
        dense[offset] = store.dummy;
    }

    let shape = store.shape();
    Array2::from_shape_vec(shape, dense).map_err(|e| {
        DensifyError::CorruptStore(format!("dense frame does not fit shape {:?}: {}", shape, e))
    })
}

/// Piecewise-linear interpolation of `(radius, background)` over every mask
/// entry, flattened in row-major order.
///
/// Mask values outside the radius range clamp to the nearest endpoint; a
/// non-finite mask entry yields the first bin (the caller overwrites those
/// positions with the dummy value).
fn interp_flat(
    mask: &Array2<f32>,
    radius: ArrayView1<'_, f32>,
    background: ArrayView1<'_, f32>,
) -> Vec<f32> {
    let n = radius.len();
    let mut flat = Vec::with_capacity(mask.len());

    for &r in mask.iter() {
        flat.push(interp_one(r, radius, background, n));
    }
    flat
}

fn interp_one(
    r: f32,
    radius: ArrayView1<'_, f32>,
    background: ArrayView1<'_, f32>,
    n: usize,
) -> f32 {
    if !r.is_finite() || r <= radius[0] {
        return background[0];
    }
    if r >= radius[n - 1] {
        return background[n - 1];
    }

    // First bin strictly greater than r; the invariants guarantee 1..n.
    let hi = partition_point(radius, r);
    let lo = hi - 1;
    let t = (r - radius[lo]) / (radius[hi] - radius[lo]);
    background[lo] + t * (background[hi] - background[lo])
}

/// Index of the first radius entry strictly greater than `r`.
fn partition_point(radius: ArrayView1<'_, f32>, r: f32) -> usize {
    let mut lo = 0usize;
    let mut hi = radius.len();
    while lo < hi {
        let mid = (lo + hi) / 2;
        if radius[mid] <= r {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}
