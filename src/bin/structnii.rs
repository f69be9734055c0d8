//! Quick commandline utility to pull the cleaned lung and heart masks out of an
//! anatomical segmentation.
//!
//! Writes `{basename}_lung-left.nii.gz`, `{basename}_lung-right.nii.gz`,
//! `{basename}_lung.nii.gz` and `{basename}_heart.nii.gz` into the output
//! directory, on the grid of the segmentation. Useful to check what the
//! component selection keeps before running fusenii.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use fusenii::common::count_nonzero;
use fusenii::components::ComponentPolicy;
use fusenii::io::{NiftiStore, VolumeStore};
use fusenii::labels::AnatomyVocabulary;
use fusenii::structures::assemble_structures;

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// the anatomical segmentation
    #[arg(short, long)]
    input: PathBuf,

    /// directory the masks are written to, created if needed
    #[arg(short, long, default_value = "./")]
    output: PathBuf,

    /// components must be larger than this many voxels to be kept
    #[arg(long, default_value_t = 20)]
    min_voxels: usize,

    /// rank the background like a component when picking structures
    #[arg(long)]
    rank_background: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Args::parse();

    let basename = cli
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.trim_end_matches(".gz").trim_end_matches(".nii").to_string())
        .context("Could not parse input file name")?;

    let mut store = NiftiStore::new();
    let seg = store
        .read_labels(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let policy = ComponentPolicy {
        min_voxels: cli.min_voxels,
        rank_background: cli.rank_background,
        ..ComponentPolicy::default()
    };
    let structures = assemble_structures(&seg.data, &AnatomyVocabulary::default(), &policy);

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    for (name, mask) in [
        ("lung-left", &structures.left),
        ("lung-right", &structures.right),
        ("lung", &structures.combined),
        ("heart", &structures.heart),
    ] {
        let path = cli.output.join(format!("{basename}_{name}.nii.gz"));
        store.write_labels(&path, mask, &seg.geometry)?;
        println!("{}: {} voxels -> {}", name, count_nonzero(mask), path.display());
    }
    Ok(())
}
