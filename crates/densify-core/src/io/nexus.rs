use std::path::Path;

use hdf5::types::{FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Dataset, File, Group, H5Type};
use ndarray::{Array1, Array2};
use num_traits::NumCast;
use tracing::debug;

use crate::error::{DensifyError, Result};
use crate::store::{AnySparseStore, Intensity, SparseStore};

const REQUIRED_DATASETS: [&str; 7] = [
    "mask",
    "radius",
    "background_avg",
    "frame_ptr",
    "index",
    "intensity",
    "dummy",
];

/// Open a sparsified frame stack.
///
/// The file is located via the NeXus default-pointer convention: the root
/// `default` attribute names the entry group, whose own `default` attribute
/// names the data group holding the sparse datasets. A missing pointer or
/// dataset fails the load; there is no fallback scan.
pub fn open(path: &Path) -> Result<AnySparseStore> {
    let file = File::open(path)?;
    let data = resolve_data_group(&file)?;

    for name in REQUIRED_DATASETS {
        if !data.link_exists(name) {
            return Err(DensifyError::NotSparseFile(format!(
                "data group is missing the `{}` dataset",
                name
            )));
        }
    }

    let mask = read_float_2d(&data, "mask")?;
    let radius = read_float_1d(&data, "radius")?;
    let background_avg = read_float_2d(&data, "background_avg")?;
    let frame_ptr = read_index_1d(&data, "frame_ptr")?;
    let index = read_index_1d(&data, "index")?;

    let intensity_ds = data.dataset("intensity")?;
    let descriptor = intensity_ds.dtype()?.to_descriptor()?;
    debug!(dtype = ?descriptor, frames = frame_ptr.len().saturating_sub(1), "sparse store located");

    match descriptor {
        TypeDescriptor::Unsigned(IntSize::U2) => {
            build::<u16>(&data, mask, radius, background_avg, frame_ptr, index)
                .map(AnySparseStore::U16)
        }
        TypeDescriptor::Integer(IntSize::U4) => {
            build::<i32>(&data, mask, radius, background_avg, frame_ptr, index)
                .map(AnySparseStore::I32)
        }
        TypeDescriptor::Unsigned(IntSize::U4) => {
            build::<u32>(&data, mask, radius, background_avg, frame_ptr, index)
                .map(AnySparseStore::U32)
        }
        TypeDescriptor::Float(FloatSize::U4) => {
            build::<f32>(&data, mask, radius, background_avg, frame_ptr, index)
                .map(AnySparseStore::F32)
        }
        TypeDescriptor::Float(FloatSize::U8) => {
            build::<f64>(&data, mask, radius, background_avg, frame_ptr, index)
                .map(AnySparseStore::F64)
        }
        other => Err(DensifyError::UnsupportedDtype(format!(
            "intensity dtype {:?}",
            other
        ))),
    }
}

fn build<T: Intensity + H5Type>(
    data: &Group,
    mask: Array2<f32>,
    radius: Array1<f32>,
    background_avg: Array2<f32>,
    frame_ptr: Vec<usize>,
    index: Vec<usize>,
) -> Result<SparseStore<T>> {
    let intensity = data.dataset("intensity")?.read_raw::<T>()?;
    let dummy = read_scalar_cast::<T>(&data.dataset("dummy")?)?;
    SparseStore::new(
        mask,
        radius,
        background_avg,
        frame_ptr,
        index,
        intensity,
        dummy,
    )
}

/// Follow the two-level `default` attribute chain down to the data group.
fn resolve_data_group(file: &File) -> Result<Group> {
    let entry_name = read_str_attr(file, "default")?.ok_or_else(|| {
        DensifyError::NotSparseFile("file has no default entry attribute".into())
    })?;
    if !file.link_exists(&entry_name) {
        return Err(DensifyError::NotSparseFile(format!(
            "default entry `{}` not present in file",
            entry_name
        )));
    }
    let entry = file.group(&entry_name).map_err(|_| {
        DensifyError::NotSparseFile(format!("default entry `{}` is not a group", entry_name))
    })?;

    let data_name = read_str_attr(&entry, "default")?.ok_or_else(|| {
        DensifyError::NotSparseFile(format!(
            "entry `{}` has no default data attribute",
            entry_name
        ))
    })?;
    if !entry.link_exists(&data_name) {
        return Err(DensifyError::NotSparseFile(format!(
            "default data group `{}` not present in entry `{}`",
            data_name, entry_name
        )));
    }
    entry.group(&data_name).map_err(|_| {
        DensifyError::NotSparseFile(format!("default data `{}` is not a group", data_name))
    })
}

/// Scalar string attribute; h5py writes these as variable-length UTF-8.
fn read_str_attr(loc: &Group, name: &str) -> Result<Option<String>> {
    let attr = match loc.attr(name) {
        Ok(attr) => attr,
        Err(_) => return Ok(None),
    };
    if let Ok(value) = attr.read_scalar::<VarLenUnicode>() {
        return Ok(Some(value.to_string()));
    }
    let value = attr.read_scalar::<VarLenAscii>()?;
    Ok(Some(value.to_string()))
}

fn read_float_vec(ds: &Dataset, name: &str) -> Result<Vec<f32>> {
    match ds.dtype()?.to_descriptor()? {
        TypeDescriptor::Float(FloatSize::U4) => Ok(ds.read_raw::<f32>()?),
        TypeDescriptor::Float(FloatSize::U8) => Ok(ds
            .read_raw::<f64>()?
            .into_iter()
            .map(|v| v as f32)
            .collect()),
        other => Err(DensifyError::UnsupportedDtype(format!(
            "`{}` dtype {:?}",
            name, other
        ))),
    }
}

fn read_float_1d(group: &Group, name: &str) -> Result<Array1<f32>> {
    let ds = group.dataset(name)?;
    let shape = ds.shape();
    if shape.len() != 1 {
        return Err(DensifyError::CorruptStore(format!(
            "`{}` must be 1-D, got {} dimensions",
            name,
            shape.len()
        )));
    }
    Ok(Array1::from_vec(read_float_vec(&ds, name)?))
}

fn read_float_2d(group: &Group, name: &str) -> Result<Array2<f32>> {
    let ds = group.dataset(name)?;
    let shape = ds.shape();
    if shape.len() != 2 {
        return Err(DensifyError::CorruptStore(format!(
            "`{}` must be 2-D, got {} dimensions",
            name,
            shape.len()
        )));
    }
    let values = read_float_vec(&ds, name)?;
    Array2::from_shape_vec((shape[0], shape[1]), values)
        .map_err(|e| DensifyError::CorruptStore(format!("`{}` shape: {}", name, e)))
}

/// Integer index array in any of the widths sparsifiers actually write.
fn read_index_1d(group: &Group, name: &str) -> Result<Vec<usize>> {
    let ds = group.dataset(name)?;
    let shape = ds.shape();
    if shape.len() != 1 {
        return Err(DensifyError::CorruptStore(format!(
            "`{}` must be 1-D, got {} dimensions",
            name,
            shape.len()
        )));
    }

    fn convert<I: TryInto<usize> + Copy + std::fmt::Display>(
        values: Vec<I>,
        name: &str,
    ) -> Result<Vec<usize>> {
        values
            .into_iter()
            .map(|v| {
                v.try_into().map_err(|_| {
                    DensifyError::CorruptStore(format!("`{}` holds invalid offset {}", name, v))
                })
            })
            .collect()
    }

    match ds.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(IntSize::U4) => convert(ds.read_raw::<i32>()?, name),
        TypeDescriptor::Integer(IntSize::U8) => convert(ds.read_raw::<i64>()?, name),
        TypeDescriptor::Unsigned(IntSize::U4) => convert(ds.read_raw::<u32>()?, name),
        TypeDescriptor::Unsigned(IntSize::U8) => convert(ds.read_raw::<u64>()?, name),
        other => Err(DensifyError::UnsupportedDtype(format!(
            "`{}` dtype {:?}",
            name, other
        ))),
    }
}

/// Scalar dataset read in its native dtype, then cast into `T`.
fn read_scalar_cast<T: Intensity>(ds: &Dataset) -> Result<T> {
    let value: f64 = match ds.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(IntSize::U2) => ds.read_scalar::<i16>()? as f64,
        TypeDescriptor::Integer(IntSize::U4) => ds.read_scalar::<i32>()? as f64,
        TypeDescriptor::Integer(IntSize::U8) => ds.read_scalar::<i64>()? as f64,
        TypeDescriptor::Unsigned(IntSize::U2) => ds.read_scalar::<u16>()? as f64,
        TypeDescriptor::Unsigned(IntSize::U4) => ds.read_scalar::<u32>()? as f64,
        TypeDescriptor::Unsigned(IntSize::U8) => ds.read_scalar::<u64>()? as f64,
        TypeDescriptor::Float(FloatSize::U4) => ds.read_scalar::<f32>()? as f64,
        TypeDescriptor::Float(FloatSize::U8) => ds.read_scalar::<f64>()?,
        other => {
            return Err(DensifyError::UnsupportedDtype(format!(
                "dummy dtype {:?}",
                other
            )))
        }
    };
    NumCast::from(value).ok_or(DensifyError::DummyOutOfRange {
        value,
        dtype: T::DTYPE,
    })
}
