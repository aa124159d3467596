pub mod error;

#[cfg(feature = "hdf5")]
pub use hdf5;

pub mod store;
pub mod reconstruct;
pub mod cursor;
pub mod pipeline;
pub mod sink;
pub mod io;
