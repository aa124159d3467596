use std::collections::BTreeMap;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc};
use std::thread;

use ndarray::Array2;
use tracing::debug;

use crate::error::{DensifyError, Result};
use crate::reconstruct::{reconstruct_with, ReconstructOptions};
use crate::store::{Intensity, SparseStore};

/// Fans reconstruction tasks out over a fixed-size worker pool and hands the
/// dense frames back in strict submission order.
///
/// Completion order among workers is unconstrained; the stream buffers early
/// completions until their slot comes up, so consumers (sinks, progress
/// bars) observe a monotonic frame sequence.
pub struct ParallelDecompressor {
    workers: usize,
    options: ReconstructOptions,
}

impl Default for ParallelDecompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl ParallelDecompressor {
    /// Pool sized to the available parallelism.
    pub fn new() -> Self {
        let workers = thread::available_parallelism().map_or(1, |n| n.get());
        Self::with_workers(workers)
    }

    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            options: ReconstructOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ReconstructOptions) -> Self {
        self.options = options;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Reconstruct every frame of the store, in order.
    pub fn decompress_all<T: Intensity>(
        &self,
        store: Arc<SparseStore<T>>,
    ) -> Result<DecompressStream<T>> {
        let frames: Vec<usize> = (0..store.nframes()).collect();
        self.decompress(store, frames)
    }

    /// Reconstruct the given frames, yielding them in the order given.
    ///
    /// Each frame index becomes one independent task on the pool; the store
    /// is only read, so tasks need no synchronization among themselves.
    pub fn decompress<T: Intensity>(
        &self,
        store: Arc<SparseStore<T>>,
        frames: Vec<usize>,
    ) -> Result<DecompressStream<T>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| DensifyError::Pipeline(format!("worker pool: {}", e)))?;

        debug!(
            frames = frames.len(),
            workers = self.workers,
            "dispatching reconstruction tasks"
        );

        let (tx, rx): (Sender<TaskResult<T>>, Receiver<TaskResult<T>>) = mpsc::channel();
        let total = frames.len();
        let options = self.options;

        for (slot, &frame) in frames.iter().enumerate() {
            let tx = tx.clone();
            let store = Arc::clone(&store);
            pool.spawn(move || {
                let result = reconstruct_with(&store, frame, &options);
                // The receiver may already be gone on early error paths.
                let _ = tx.send(TaskResult {
                    slot,
                    frame,
                    result,
                });
            });
        }
        // Workers hold the remaining senders; the channel closes when the
        // last task has reported.
        drop(tx);

        Ok(DecompressStream {
            rx,
            pending: BTreeMap::new(),
            next_slot: 0,
            total,
            received: 0,
            done: false,
            _pool: pool,
        })
    }
}

struct TaskResult<T: Intensity> {
    slot: usize,
    frame: usize,
    result: Result<Array2<T>>,
}

/// Lazy, finite, non-restartable stream of `(frame_index, dense_frame)` in
/// submission order.
///
/// The first failed frame surfaces as `Err` at its ordered position, after
/// which the stream is fused; results of tasks past the failure are drained
/// and discarded so no worker is left holding the store.
pub struct DecompressStream<T: Intensity> {
    rx: Receiver<TaskResult<T>>,
    pending: BTreeMap<usize, (usize, Result<Array2<T>>)>,
    next_slot: usize,
    total: usize,
    received: usize,
    done: bool,
    _pool: rayon::ThreadPool,
}

impl<T: Intensity> DecompressStream<T> {
    /// Total number of frames this stream will deliver.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Receive until every dispatched task has reported, discarding results.
    fn drain(&mut self) {
        while self.received < self.total {
            match self.rx.recv() {
                Ok(_) => self.received += 1,
                Err(_) => break,
            }
        }
        self.pending.clear();
    }
}

impl<T: Intensity> Iterator for DecompressStream<T> {
    type Item = Result<(usize, Array2<T>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.next_slot == self.total {
            return None;
        }

        loop {
            if let Some((frame, result)) = self.pending.remove(&self.next_slot) {
                self.next_slot += 1;
                return match result {
                    Ok(dense) => Some(Ok((frame, dense))),
                    Err(e) => {
                        debug!(frame, "frame reconstruction failed; draining pool");
                        self.drain();
                        self.done = true;
                        Some(Err(e))
                    }
                };
            }

            match self.rx.recv() {
                Ok(task) => {
                    self.received += 1;
                    self.pending.insert(task.slot, (task.frame, task.result));
                }
                Err(_) => {
                    // All senders gone without delivering the next slot.
                    self.done = true;
                    return Some(Err(DensifyError::Pipeline(
                        "worker pool disconnected before all frames were delivered".into(),
                    )));
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.done {
            0
        } else {
            self.total - self.next_slot
        };
        (0, Some(remaining))
    }
}

impl<T: Intensity> Drop for DecompressStream<T> {
    fn drop(&mut self) {
        // Block until in-flight tasks finish so the pool never outlives the
        // coordinator while still holding the store.
        self.drain();
    }
}
