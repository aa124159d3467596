use std::fmt::Debug;
use std::sync::OnceLock;

use ndarray::{Array1, Array2};
use num_traits::NumCast;

use crate::error::{DensifyError, Result};

/// Native element type of the stored peak intensities.
///
/// The sparsifier keeps peak pixels in whatever dtype the detector produced,
/// so the dense output must be rebuilt in that same type. Integer targets
/// round the interpolated background; float targets keep it as-is.
pub trait Intensity:
    Copy + PartialEq + Debug + Send + Sync + NumCast + 'static
{
    /// Short dtype name, as shown to users and in errors.
    const DTYPE: &'static str;

    /// Convert an interpolated background estimate into this type,
    /// rounding for integer targets.
    fn from_background(value: f32) -> Self;

    /// Lossy conversion for the CBF output path (signed 32-bit elements).
    fn as_i32(self) -> i32;
}

macro_rules! int_intensity {
    ($t:ty, $name:literal) => {
        impl Intensity for $t {
            const DTYPE: &'static str = $name;

            fn from_background(value: f32) -> Self {
                value.round() as $t
            }

            fn as_i32(self) -> i32 {
                self as i32
            }
        }
    };
}

int_intensity!(u16, "uint16");
int_intensity!(i32, "int32");
int_intensity!(u32, "uint32");

impl Intensity for f32 {
    const DTYPE: &'static str = "float32";

    fn from_background(value: f32) -> Self {
        value
    }

    fn as_i32(self) -> i32 {
        self as i32
    }
}

impl Intensity for f64 {
    const DTYPE: &'static str = "float64";

    fn from_background(value: f32) -> Self {
        value as f64
    }

    fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Read-only view over the sparsified representation of a frame stack.
///
/// Holds the frame-invariant mask and radial grid plus the CSR-style peak
/// arrays for every frame. Immutable once constructed; share it between
/// cursors and pipeline workers behind an `Arc`.
#[derive(Debug)]
pub struct SparseStore<T: Intensity> {
    /// Radial coordinate per pixel; non-finite marks a dead/gap pixel.
    pub(crate) mask: Array2<f32>,
    /// Radial bin coordinates, strictly increasing, length R.
    pub(crate) radius: Array1<f32>,
    /// Azimuthally-averaged background, shape (nframes, R).
    pub(crate) background_avg: Array2<f32>,
    /// CSR row pointers into `index`/`intensity`, length nframes + 1.
    pub(crate) frame_ptr: Vec<usize>,
    /// Flat row-major offsets of the stored peak pixels.
    pub(crate) index: Vec<usize>,
    /// Stored intensity at each peak pixel.
    pub(crate) intensity: Vec<T>,
    /// Fill value for permanently invalid pixels.
    pub(crate) dummy: T,
    /// Flat offsets of the non-finite mask entries, computed on first use.
    pub(crate) masked: OnceLock<Vec<usize>>,
}

impl<T: Intensity> SparseStore<T> {
    /// Build a store from its raw arrays, validating the structural
    /// invariants of the sparse layout.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mask: Array2<f32>,
        radius: Array1<f32>,
        background_avg: Array2<f32>,
        frame_ptr: Vec<usize>,
        index: Vec<usize>,
        intensity: Vec<T>,
        dummy: T,
    ) -> Result<Self> {
        if frame_ptr.is_empty() {
            return Err(DensifyError::CorruptStore(
                "frame_ptr must have at least one entry".into(),
            ));
        }
        if frame_ptr[0] != 0 {
            return Err(DensifyError::CorruptStore(format!(
                "frame_ptr must start at 0, got {}",
                frame_ptr[0]
            )));
        }
        if frame_ptr.windows(2).any(|w| w[1] < w[0]) {
            return Err(DensifyError::CorruptStore(
                "frame_ptr must be non-decreasing".into(),
            ));
        }
        let total = *frame_ptr.last().unwrap_or(&0);
        if total != index.len() || index.len() != intensity.len() {
            return Err(DensifyError::CorruptStore(format!(
                "frame_ptr ends at {} but index/intensity hold {}/{} entries",
                total,
                index.len(),
                intensity.len()
            )));
        }
        let nframes = frame_ptr.len() - 1;
        if background_avg.nrows() != nframes {
            return Err(DensifyError::CorruptStore(format!(
                "background_avg holds {} frames, frame_ptr implies {}",
                background_avg.nrows(),
                nframes
            )));
        }
        if background_avg.ncols() != radius.len() {
            return Err(DensifyError::CorruptStore(format!(
                "background_avg has {} radial bins, radius has {}",
                background_avg.ncols(),
                radius.len()
            )));
        }
        if radius.iter().zip(radius.iter().skip(1)).any(|(a, b)| b <= a) {
            return Err(DensifyError::CorruptStore(
                "radius must be strictly increasing".into(),
            ));
        }
        let npixels = mask.len();
        if let Some(&bad) = index.iter().find(|&&i| i >= npixels) {
            return Err(DensifyError::CorruptStore(format!(
                "peak offset {} outside the {} dense pixels",
                bad, npixels
            )));
        }

        Ok(Self {
            mask,
            radius,
            background_avg,
            frame_ptr,
            index,
            intensity,
            dummy,
            masked: OnceLock::new(),
        })
    }

    /// Number of frames in the stack.
    pub fn nframes(&self) -> usize {
        self.frame_ptr.len() - 1
    }

    /// Dense image shape (rows, cols).
    pub fn shape(&self) -> (usize, usize) {
        self.mask.dim()
    }

    /// Number of radial bins.
    pub fn radial_bins(&self) -> usize {
        self.radius.len()
    }

    /// Total number of stored peak pixels across all frames.
    pub fn peak_count(&self) -> usize {
        self.index.len()
    }

    /// Number of stored peak pixels in one frame.
    pub fn peaks_in_frame(&self, frame: usize) -> Result<usize> {
        let (start, stop) = self.frame_slice(frame)?;
        Ok(stop - start)
    }

    /// Fill value written into permanently invalid pixels.
    pub fn dummy(&self) -> T {
        self.dummy
    }

    /// Replace the dummy fill value (CLI override, applied before sharing).
    pub fn set_dummy(&mut self, dummy: T) {
        self.dummy = dummy;
    }

    /// Half-open `index`/`intensity` slice bounds for one frame.
    pub(crate) fn frame_slice(&self, frame: usize) -> Result<(usize, usize)> {
        if frame >= self.nframes() {
            return Err(DensifyError::FrameIndexOutOfRange {
                index: frame as isize,
                total: self.nframes(),
            });
        }
        Ok((self.frame_ptr[frame], self.frame_ptr[frame + 1]))
    }

    /// Flat offsets of the permanently invalid (non-finite mask) pixels.
    ///
    /// Frame-invariant, so computed once and cached for the store's lifetime.
    pub(crate) fn masked_offsets(&self) -> &[usize] {
        self.masked.get_or_init(|| {
            self.mask
                .iter()
                .enumerate()
                .filter(|(_, v)| !v.is_finite())
                .map(|(i, _)| i)
                .collect()
        })
    }
}

/// A sparse store with the element type resolved at load time.
///
/// The on-disk intensity dtype decides the variant once, when the file is
/// opened; callers match on it a single time and run the generic pipeline.
pub enum AnySparseStore {
    U16(SparseStore<u16>),
    I32(SparseStore<i32>),
    U32(SparseStore<u32>),
    F32(SparseStore<f32>),
    F64(SparseStore<f64>),
}

macro_rules! for_each_store {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            AnySparseStore::U16($s) => $body,
            AnySparseStore::I32($s) => $body,
            AnySparseStore::U32($s) => $body,
            AnySparseStore::F32($s) => $body,
            AnySparseStore::F64($s) => $body,
        }
    };
}

impl AnySparseStore {
    pub fn nframes(&self) -> usize {
        for_each_store!(self, s => s.nframes())
    }

    pub fn shape(&self) -> (usize, usize) {
        for_each_store!(self, s => s.shape())
    }

    pub fn radial_bins(&self) -> usize {
        for_each_store!(self, s => s.radial_bins())
    }

    pub fn peak_count(&self) -> usize {
        for_each_store!(self, s => s.peak_count())
    }

    pub fn dtype_name(&self) -> &'static str {
        match self {
            AnySparseStore::U16(_) => u16::DTYPE,
            AnySparseStore::I32(_) => i32::DTYPE,
            AnySparseStore::U32(_) => u32::DTYPE,
            AnySparseStore::F32(_) => f32::DTYPE,
            AnySparseStore::F64(_) => f64::DTYPE,
        }
    }

    pub fn dummy_display(&self) -> String {
        for_each_store!(self, s => format!("{:?}", s.dummy()))
    }

    /// Override the dummy fill value, converting into the native dtype.
    pub fn override_dummy(&mut self, value: f64) -> Result<()> {
        fn cast<T: Intensity>(store: &mut SparseStore<T>, value: f64) -> Result<()> {
            let dummy: T = NumCast::from(value).ok_or(DensifyError::DummyOutOfRange {
                value,
                dtype: T::DTYPE,
            })?;
            store.set_dummy(dummy);
            Ok(())
        }
        for_each_store!(self, s => cast(s, value))
    }
}
