use std::path::Path;

use hdf5::{File, H5Type};
use ndarray::Array2;
use tracing::debug;

use super::stack::{write_str_attr, FrameStack};
use crate::error::Result;
use crate::sink::FrameSink;
use crate::store::Intensity;

/// Dense HDF5 stack in the Eiger layout: `entry/data/data_000001`.
pub struct EigerWriter<T: Intensity> {
    stack: FrameStack<T>,
}

impl<T: Intensity> EigerWriter<T> {
    pub fn new(shape: (usize, usize), nframes: usize) -> Self {
        Self {
            stack: FrameStack::new(shape, nframes),
        }
    }
}

impl<T: Intensity + H5Type> FrameSink<T> for EigerWriter<T> {
    fn set_frame(&mut self, frame: Array2<T>, index: usize) -> Result<()> {
        self.stack.set(frame, index)
    }

    fn finalize(&mut self, path: &Path) -> Result<()> {
        let (nframes, flat) = self.stack.flat()?;
        let (h, w) = self.stack.shape();
        debug!(path = %path.display(), nframes, "writing Eiger stack");

        let file = File::create(path)?;
        write_str_attr(&file, "default", "entry")?;

        let entry = file.create_group("entry")?;
        write_str_attr(&entry, "NX_class", "NXentry")?;
        write_str_attr(&entry, "default", "data")?;

        let data = entry.create_group("data")?;
        write_str_attr(&data, "NX_class", "NXdata")?;
        write_str_attr(&data, "signal", "data_000001")?;

        let ds = data
            .new_dataset::<T>()
            .shape((nframes, h, w))
            .create("data_000001")?;
        ds.write_raw(&flat)?;
        Ok(())
    }
}
