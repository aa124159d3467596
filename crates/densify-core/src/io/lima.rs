use std::path::Path;

use hdf5::{File, H5Type};
use ndarray::Array2;
use tracing::debug;

use super::stack::{write_str_attr, FrameStack};
use crate::error::Result;
use crate::sink::FrameSink;
use crate::store::Intensity;

/// Dense HDF5 stack in the Lima layout: `entry_0000/measurement/data`.
pub struct LimaWriter<T: Intensity> {
    stack: FrameStack<T>,
}

impl<T: Intensity> LimaWriter<T> {
    pub fn new(shape: (usize, usize), nframes: usize) -> Self {
        Self {
            stack: FrameStack::new(shape, nframes),
        }
    }
}

impl<T: Intensity + H5Type> FrameSink<T> for LimaWriter<T> {
    fn set_frame(&mut self, frame: Array2<T>, index: usize) -> Result<()> {
        self.stack.set(frame, index)
    }

    fn finalize(&mut self, path: &Path) -> Result<()> {
        let (nframes, flat) = self.stack.flat()?;
        let (h, w) = self.stack.shape();
        debug!(path = %path.display(), nframes, "writing Lima stack");

        let file = File::create(path)?;
        write_str_attr(&file, "default", "entry_0000")?;

        let entry = file.create_group("entry_0000")?;
        write_str_attr(&entry, "NX_class", "NXentry")?;
        write_str_attr(&entry, "default", "measurement")?;

        let measurement = entry.create_group("measurement")?;
        write_str_attr(&measurement, "NX_class", "NXdata")?;
        write_str_attr(&measurement, "signal", "data")?;

        let ds = measurement
            .new_dataset::<T>()
            .shape((nframes, h, w))
            .create("data")?;
        ds.write_raw(&flat)?;
        Ok(())
    }
}
