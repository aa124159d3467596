use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use ndarray::Array2;
use tracing::debug;

use crate::error::Result;
use crate::sink::FrameSink;
use crate::store::Intensity;

/// hc in keV * Angstrom, for converting beam energy to wavelength.
pub const HC_KEV_ANGSTROM: f64 = 12.398419843320026;

const BINARY_MARKER: [u8; 4] = [0x0C, 0x1A, 0x04, 0xD5];
const BINARY_PADDING: usize = 4095;

/// Pilatus-style metadata written into the CBF text header.
#[derive(Clone, Debug, Default)]
pub struct CbfHeader {
    pub detector: Option<String>,
    /// Wavelength in Angstrom.
    pub wavelength_a: Option<f64>,
    /// Sample-detector distance in meters.
    pub distance_m: Option<f64>,
    /// Direct beam position in pixels (x, y).
    pub beam_xy: Option<(f64, f64)>,
}

impl CbfHeader {
    fn contents(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "# Detector: {}",
            self.detector.as_deref().unwrap_or("unknown")
        ));
        if let Some(wl) = self.wavelength_a {
            lines.push(format!("# Wavelength {:.6} A", wl));
        }
        if let Some(d) = self.distance_m {
            lines.push(format!("# Detector_distance {:.5} m", d));
        }
        if let Some((x, y)) = self.beam_xy {
            lines.push(format!("# Beam_xy ({:.2}, {:.2}) pixels", x, y));
        }
        lines.join("\r\n")
    }
}

/// Write one dense frame as a CBF 1.5 file with byte-offset compression.
pub fn write_frame(path: &Path, data: &Array2<i32>, header: &CbfHeader) -> Result<()> {
    let (h, w) = data.dim();
    let flat: Vec<i32> = data.iter().copied().collect();

    let mut binary = Vec::with_capacity(flat.len());
    write_byte_offset(&mut binary, &flat)?;

    debug!(path = %path.display(), bytes = binary.len(), "writing CBF frame");

    let file = File::create(path)?;
    let mut out = BufWriter::new(file);

    write!(out, "###CBF: VERSION 1.5\r\n")?;
    write!(out, "# CBF file written by densify\r\n\r\n")?;
    write!(out, "data_frame\r\n\r\n")?;
    write!(out, "_array_data.header_convention \"PILATUS_1.2\"\r\n")?;
    write!(out, "_array_data.header_contents\r\n;\r\n")?;
    write!(out, "{}\r\n;\r\n\r\n", header.contents())?;
    write!(out, "_array_data.data\r\n;\r\n")?;
    write!(out, "--CIF-BINARY-FORMAT-SECTION--\r\n")?;
    write!(out, "Content-Type: application/octet-stream;\r\n")?;
    write!(out, "     conversion=\"x-CBF_BYTE_OFFSET\"\r\n")?;
    write!(out, "Content-Transfer-Encoding: BINARY\r\n")?;
    write!(out, "X-Binary-Size: {}\r\n", binary.len())?;
    write!(out, "X-Binary-ID: 1\r\n")?;
    write!(out, "X-Binary-Element-Type: \"signed 32-bit integer\"\r\n")?;
    write!(out, "X-Binary-Element-Byte-Order: LITTLE_ENDIAN\r\n")?;
    write!(out, "X-Binary-Number-of-Elements: {}\r\n", flat.len())?;
    write!(out, "X-Binary-Size-Fastest-Dimension: {}\r\n", w)?;
    write!(out, "X-Binary-Size-Second-Dimension: {}\r\n", h)?;
    write!(out, "X-Binary-Size-Padding: {}\r\n\r\n", BINARY_PADDING)?;

    out.write_all(&BINARY_MARKER)?;
    out.write_all(&binary)?;
    out.write_all(&vec![0u8; BINARY_PADDING])?;
    write!(out, "\r\n--CIF-BINARY-FORMAT-SECTION----\r\n;\r\n")?;

    out.flush()?;
    Ok(())
}

/// CBF byte-offset compression: each element is stored as a delta from its
/// predecessor, escalating 8 -> 16 -> 32 -> 64 bit when the delta does not
/// fit, with the escape markers 0x80 / 0x8000 / 0x80000000.
fn write_byte_offset<W: Write>(out: &mut W, data: &[i32]) -> Result<()> {
    let mut prev: i64 = 0;
    for &value in data {
        let delta = value as i64 - prev;
        if (-127..=127).contains(&delta) {
            out.write_i8(delta as i8)?;
        } else {
            out.write_u8(0x80)?;
            if (-32767..=32767).contains(&delta) {
                out.write_i16::<LittleEndian>(delta as i16)?;
            } else {
                out.write_i16::<LittleEndian>(i16::MIN)?;
                if (-2147483647..=2147483647).contains(&delta) {
                    out.write_i32::<LittleEndian>(delta as i32)?;
                } else {
                    out.write_i32::<LittleEndian>(i32::MIN)?;
                    out.write_i64::<LittleEndian>(delta)?;
                }
            }
        }
        prev = value as i64;
    }
    Ok(())
}

/// Resolve an output template, replacing `{index}` with the zero-padded
/// frame number.
pub fn frame_path(template: &str, index: usize) -> PathBuf {
    PathBuf::from(template.replace("{index}", &format!("{:04}", index)))
}

/// Per-frame CBF sink: every frame becomes its own file, named from the
/// template. `finalize` is a no-op since the files are written eagerly.
pub struct CbfSink {
    template: String,
    offset: usize,
    header: CbfHeader,
}

impl CbfSink {
    pub fn new(template: impl Into<String>, offset: usize, header: CbfHeader) -> Self {
        Self {
            template: template.into(),
            offset,
            header,
        }
    }
}

impl<T: Intensity> FrameSink<T> for CbfSink {
    fn set_frame(&mut self, frame: Array2<T>, index: usize) -> Result<()> {
        let data = frame.mapv(Intensity::as_i32);
        let path = frame_path(&self.template, index + self.offset);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_frame(&path, &data, &self.header)
    }

    fn finalize(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}
