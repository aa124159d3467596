pub mod cbf;

#[cfg(feature = "hdf5")]
pub mod eiger;
#[cfg(feature = "hdf5")]
pub mod lima;
#[cfg(feature = "hdf5")]
pub mod nexus;

use std::path::Path;

#[cfg(feature = "hdf5")]
pub use hdf5::H5Type;

use crate::error::Result;
use crate::store::AnySparseStore;

/// Open a sparse frame file, resolving the element type from the container.
///
/// Without the `hdf5` feature this fails before touching the filesystem.
#[cfg(feature = "hdf5")]
pub fn open_sparse(path: &Path) -> Result<AnySparseStore> {
    nexus::open(path)
}

#[cfg(not(feature = "hdf5"))]
pub fn open_sparse(_path: &Path) -> Result<AnySparseStore> {
    Err(crate::error::DensifyError::MissingHdf5Support)
}

#[cfg(feature = "hdf5")]
mod stack {
    use std::str::FromStr;

    use hdf5::types::VarLenUnicode;
    use hdf5::Group;
    use ndarray::Array2;

    use crate::error::{DensifyError, Result};
    use crate::store::Intensity;

    /// Accumulates out-of-order frames into a dense (nframes, h, w) stack.
    pub(crate) struct FrameStack<T: Intensity> {
        shape: (usize, usize),
        frames: Vec<Option<Array2<T>>>,
    }

    impl<T: Intensity> FrameStack<T> {
        pub(crate) fn new(shape: (usize, usize), capacity: usize) -> Self {
            let mut frames = Vec::new();
            frames.resize_with(capacity, || None);
            Self { shape, frames }
        }

        pub(crate) fn shape(&self) -> (usize, usize) {
            self.shape
        }

        pub(crate) fn set(&mut self, frame: Array2<T>, index: usize) -> Result<()> {
            if frame.dim() != self.shape {
                return Err(DensifyError::ShapeMismatch {
                    expected: self.shape,
                    got: frame.dim(),
                });
            }
            if index >= self.frames.len() {
                self.frames.resize_with(index + 1, || None);
            }
            self.frames[index] = Some(frame);
            Ok(())
        }

        /// Flatten into row-major (frame, row, col) order, requiring every
        /// slot to have been delivered.
        pub(crate) fn flat(&self) -> Result<(usize, Vec<T>)> {
            let (h, w) = self.shape;
            let mut flat = Vec::with_capacity(self.frames.len() * h * w);
            for (i, slot) in self.frames.iter().enumerate() {
                match slot {
                    Some(frame) => flat.extend(frame.iter().copied()),
                    None => {
                        return Err(DensifyError::Pipeline(format!(
                            "frame {} was never delivered to the sink",
                            i
                        )))
                    }
                }
            }
            Ok((self.frames.len(), flat))
        }
    }

    /// Scalar string attribute, written variable-length UTF-8 as h5py does.
    pub(crate) fn write_str_attr(loc: &Group, name: &str, value: &str) -> Result<()> {
        let value = VarLenUnicode::from_str(value)
            .map_err(|e| hdf5::Error::from(e.to_string()))?;
        loc.new_attr::<VarLenUnicode>()
            .create(name)?
            .write_scalar(&value)?;
        Ok(())
    }
}
