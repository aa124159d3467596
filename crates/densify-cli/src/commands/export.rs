use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use densify_core::io::cbf::{CbfHeader, CbfSink, HC_KEV_ANGSTROM};
use densify_core::io::open_sparse;
use densify_core::pipeline::ParallelDecompressor;
use densify_core::sink::FrameSink;
use densify_core::store::{AnySparseStore, Intensity, SparseStore};

#[derive(Args)]
pub struct ExportArgs {
    /// Input sparse HDF5 files (globs are expanded)
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output path template; `{index}` is replaced by the frame number
    #[arg(
        short,
        long,
        default_value = "densify/frame_{index}.cbf",
        value_parser = parse_template
    )]
    pub output: String,

    /// Index offset; CrysalisPro likes indexes to start at 1
    #[arg(short = 'O', long, default_value_t = 0)]
    pub offset: usize,

    /// Set masked pixels to this dummy value
    #[arg(short = 'D', long)]
    pub dummy: Option<f64>,

    /// Energy of the incident beam in keV
    #[arg(short, long)]
    pub energy: Option<f64>,

    /// Detector distance in meters
    #[arg(short, long)]
    pub distance: Option<f64>,

    /// Direct beam position in pixels x, y
    #[arg(short, long, num_args = 2, value_names = ["X", "Y"])]
    pub beam: Option<Vec<f64>>,

    /// Do everything except modifying the file system
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_template(s: &str) -> std::result::Result<String, String> {
    if s.contains("{index}") {
        Ok(s.to_string())
    } else {
        Err("output template must contain the `{index}` placeholder".into())
    }
}

pub fn run(args: &ExportArgs) -> Result<()> {
    let files = super::expand_inputs(&args.inputs)?;
    if files.is_empty() {
        bail!("no input files matched");
    }

    let mut failures = 0usize;
    let mut offset = args.offset;
    for file in &files {
        match export_one(file, args, offset) {
            // Frames of the next file continue where this one stopped.
            Ok(nframes) => offset += nframes,
            Err(e) => {
                error!(file = %file.display(), "export failed: {e:#}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} exports failed", failures, files.len());
    }
    Ok(())
}

fn export_one(input: &Path, args: &ExportArgs, offset: usize) -> Result<usize> {
    let mut store = open_sparse(input)?;
    if let Some(value) = args.dummy {
        store.override_dummy(value)?;
    }

    let header = CbfHeader {
        detector: None,
        wavelength_a: args.energy.map(|kev| HC_KEV_ANGSTROM / kev),
        distance_m: args.distance,
        beam_xy: args.beam.as_ref().map(|b| (b[0], b[1])),
    };

    match store {
        AnySparseStore::U16(s) => export_stack(s, input, args, offset, header),
        AnySparseStore::I32(s) => export_stack(s, input, args, offset, header),
        AnySparseStore::U32(s) => export_stack(s, input, args, offset, header),
        AnySparseStore::F32(s) => export_stack(s, input, args, offset, header),
        AnySparseStore::F64(s) => export_stack(s, input, args, offset, header),
    }
}

fn export_stack<T: Intensity>(
    store: SparseStore<T>,
    input: &Path,
    args: &ExportArgs,
    offset: usize,
    header: CbfHeader,
) -> Result<usize> {
    let nframes = store.nframes();
    let store = Arc::new(store);
    let mut sink = CbfSink::new(args.output.as_str(), offset, header);

    let pb = ProgressBar::new(nframes as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Exporting [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    for item in ParallelDecompressor::new().decompress_all(Arc::clone(&store))? {
        let (index, frame) = item?;
        if !args.dry_run {
            sink.set_frame(frame, index)?;
        }
        pb.inc(1);
    }
    pb.finish();

    println!(
        "{} {} frames from {}",
        style("Exported").green().bold(),
        nframes,
        input.display()
    );
    Ok(nframes)
}
