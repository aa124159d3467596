use std::path::Path;

use ndarray::Array2;

use crate::error::Result;
use crate::store::Intensity;

/// Destination for reconstructed frames.
///
/// One sink variant per output container. The caller selects the variant
/// once and passes it into the conversion loop; the pipeline delivers frames
/// in increasing index order, though implementations must not rely on the
/// indices being contiguous up front.
pub trait FrameSink<T: Intensity> {
    /// Accept one dense frame at the given logical index.
    fn set_frame(&mut self, frame: Array2<T>, index: usize) -> Result<()>;

    /// Write the accumulated stack to persistent storage.
    fn finalize(&mut self, path: &Path) -> Result<()>;
}
