use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use densify_core::io::open_sparse;

#[derive(Args)]
pub struct InfoArgs {
    /// Input sparse HDF5 file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let store = open_sparse(&args.file)?;
    let (h, w) = store.shape();
    let nframes = store.nframes();

    println!("File:         {}", args.file.display());
    println!("Frames:       {}", nframes);
    println!("Dimensions:   {}x{}", w, h);
    println!("Element type: {}", store.dtype_name());
    println!("Radial bins:  {}", store.radial_bins());
    println!("Peak pixels:  {}", store.peak_count());
    if nframes > 0 {
        println!(
            "Peaks/frame:  {:.1}",
            store.peak_count() as f64 / nframes as f64
        );
    }
    println!("Dummy value:  {}", store.dummy_display());

    Ok(())
}
