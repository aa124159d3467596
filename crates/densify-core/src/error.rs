use thiserror::Error;

#[derive(Error, Debug)]
pub enum DensifyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("Not a sparse frame file: {0}")]
    NotSparseFile(String),

    #[error("Corrupt sparse store: {0}")]
    CorruptStore(String),

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: isize, total: usize },

    #[error("Unsupported element type: {0}")]
    UnsupportedDtype(String),

    #[error("Dummy value {value} does not fit the {dtype} element type")]
    DummyOutOfRange { value: f64, dtype: &'static str },

    #[error("Frame shape {got:?} does not match store shape {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("HDF5 support not compiled in; rebuild with the `hdf5` feature")]
    MissingHdf5Support,

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

pub type Result<T> = std::result::Result<T, DensifyError>;
