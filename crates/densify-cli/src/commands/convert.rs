use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::error;

use densify_core::io::eiger::EigerWriter;
use densify_core::io::lima::LimaWriter;
use densify_core::io::{open_sparse, H5Type};
use densify_core::pipeline::ParallelDecompressor;
use densify_core::reconstruct::ReconstructOptions;
use densify_core::sink::FrameSink;
use densify_core::store::{AnySparseStore, Intensity, SparseStore};

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Dense HDF5 stack, Lima layout
    Lima,
    /// Dense HDF5 stack, Eiger layout
    Eiger,
}

#[derive(Args)]
pub struct ConvertArgs {
    /// Input sparse HDF5 files (globs are expanded)
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output filename (default: {input stem}_dense.h5)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output container format
    #[arg(short = 'O', long = "output-format", value_enum, default_value = "lima")]
    pub format: OutputFormat,

    /// Set masked pixels to this dummy value
    #[arg(short = 'D', long)]
    pub dummy: Option<f64>,

    /// Do everything except modifying the file system
    #[arg(long)]
    pub dry_run: bool,

    /// Disable the noise reconstruction
    #[arg(short = 'N', long = "no-noise")]
    pub no_noise: bool,
}

pub fn run(args: &ConvertArgs) -> Result<()> {
    let files = super::expand_inputs(&args.inputs)?;
    if files.is_empty() {
        bail!("no input files matched");
    }

    let mut failures = 0usize;
    for file in &files {
        if let Err(e) = convert_one(file, args) {
            error!(file = %file.display(), "conversion failed: {e:#}");
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} of {} conversions failed", failures, files.len());
    }
    Ok(())
}

fn convert_one(input: &Path, args: &ConvertArgs) -> Result<()> {
    let t0 = Instant::now();
    let mut store = open_sparse(input)?;
    if let Some(value) = args.dummy {
        store.override_dummy(value)?;
    }
    let read_time = t0.elapsed().as_secs_f64();

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(input));

    match store {
        AnySparseStore::U16(s) => convert_stack(s, input, &output, args, read_time),
        AnySparseStore::I32(s) => convert_stack(s, input, &output, args, read_time),
        AnySparseStore::U32(s) => convert_stack(s, input, &output, args, read_time),
        AnySparseStore::F32(s) => convert_stack(s, input, &output, args, read_time),
        AnySparseStore::F64(s) => convert_stack(s, input, &output, args, read_time),
    }
}

fn convert_stack<T: Intensity + H5Type>(
    store: SparseStore<T>,
    input: &Path,
    output: &Path,
    args: &ConvertArgs,
    read_time: f64,
) -> Result<()> {
    let nframes = store.nframes();
    let shape = store.shape();
    let store = Arc::new(store);

    let mut sink: Box<dyn FrameSink<T>> = match args.format {
        OutputFormat::Lima => Box::new(LimaWriter::new(shape, nframes)),
        OutputFormat::Eiger => Box::new(EigerWriter::new(shape, nframes)),
    };

    let decompressor = ParallelDecompressor::new()
        .with_options(ReconstructOptions { noise: !args.no_noise });

    let pb = ProgressBar::new(nframes as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("Decompressing [{bar:40}] {pos}/{len}")?
            .progress_chars("=> "),
    );

    let t1 = Instant::now();
    for item in decompressor.decompress_all(Arc::clone(&store))? {
        let (index, frame) = item?;
        if !args.dry_run {
            sink.set_frame(frame, index)?;
        }
        pb.inc(1);
    }
    pb.finish();
    let decompress_time = t1.elapsed().as_secs_f64();

    let t2 = Instant::now();
    if !args.dry_run {
        sink.finalize(output)?;
    }
    let write_time = t2.elapsed().as_secs_f64();

    println!(
        "{} {} -> {}",
        style("Densified").green().bold(),
        input.display(),
        output.display()
    );
    println!("  read input: {:.3}s", read_time);
    println!("  decompress: {:.3}s", decompress_time);
    println!("  write:      {:.3}s", write_time);
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    input.with_file_name(format!("{}_dense.h5", stem))
}
