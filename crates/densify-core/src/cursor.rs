use std::sync::Arc;

use ndarray::Array2;

use crate::error::{DensifyError, Result};
use crate::reconstruct::reconstruct;
use crate::store::{Intensity, SparseStore};

/// Single-frame navigation over a shared sparse store.
///
/// A cursor owns only its position and (lazily) the dense frame at that
/// position; the large arrays stay in the shared store. Any number of
/// cursors can coexist on one store.
pub struct FrameCursor<T: Intensity> {
    store: Arc<SparseStore<T>>,
    current: usize,
    data: Option<Array2<T>>,
}

impl<T: Intensity> FrameCursor<T> {
    /// Open a cursor positioned at frame 0.
    pub fn new(store: Arc<SparseStore<T>>) -> Result<Self> {
        if store.nframes() == 0 {
            return Err(DensifyError::CorruptStore("store holds no frames".into()));
        }
        Ok(Self {
            store,
            current: 0,
            data: None,
        })
    }

    /// Index of the frame the cursor is positioned on.
    pub fn position(&self) -> usize {
        self.current
    }

    /// Total number of frames in the underlying store.
    pub fn nframes(&self) -> usize {
        self.store.nframes()
    }

    /// Dense frame at the current position, reconstructing it on first use.
    pub fn current(&mut self) -> Result<&Array2<T>> {
        let frame = match self.data.take() {
            Some(frame) => frame,
            None => reconstruct(&self.store, self.current)?,
        };
        Ok(self.data.insert(frame))
    }

    /// Move to the next frame and reconstruct it.
    pub fn next(&mut self) -> Result<&Array2<T>> {
        self.seek(self.current as isize + 1)
    }

    /// Move to the previous frame and reconstruct it.
    pub fn previous(&mut self) -> Result<&Array2<T>> {
        self.seek(self.current as isize - 1)
    }

    /// Independent cursor positioned at `frame`, already materialized,
    /// sharing this cursor's store.
    pub fn frame(&self, frame: usize) -> Result<FrameCursor<T>> {
        let data = reconstruct(&self.store, frame)?;
        Ok(FrameCursor {
            store: Arc::clone(&self.store),
            current: frame,
            data: Some(data),
        })
    }

    /// Move to an absolute position. Out-of-range leaves the cursor where
    /// it was and fails with a range error.
    fn seek(&mut self, target: isize) -> Result<&Array2<T>> {
        let total = self.store.nframes();
        if target < 0 || target as usize >= total {
            return Err(DensifyError::FrameIndexOutOfRange {
                index: target,
                total,
            });
        }
        let data = reconstruct(&self.store, target as usize)?;
        self.current = target as usize;
        Ok(self.data.insert(data))
    }
}
