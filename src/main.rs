//! Commandline utility to fuse per-fold lesion predictions with an anatomical
//! segmentation into a single lung/lesion label volume.
//!
//! The output is written on the grid of the CT. If the output file already
//! exists nothing is done.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use fusenii::components::ComponentPolicy;
use fusenii::ensemble::{discover_folds, DEFAULT_NUM_FOLDS, DEFAULT_THRESHOLD};
use fusenii::io::NiftiStore;
use fusenii::{postprocess, Outcome, PostprocessConfig};

// use clap to create commandline interface
#[derive(Parser, Debug)]
#[command(author, about, version, long_about)]
struct Args {
    /// directory holding the per-fold predictions ({prefix}_{fold}.nii.gz)
    #[arg(short, long)]
    save_dir: PathBuf,

    /// the CT scan; its geometry is copied to the output
    #[arg(short, long)]
    ct: PathBuf,

    /// the anatomical segmentation (TotalSegmentator label ids)
    #[arg(short, long)]
    anatomy: PathBuf,

    /// the output nifti file
    #[arg(short, long)]
    output: PathBuf,

    /// base name of the fold predictions
    #[arg(short, long)]
    prefix: String,

    /// label of the lesion in the fold predictions
    #[arg(short, long)]
    lesion_label: i32,

    /// number of folds to fuse
    #[arg(short, long, default_value_t = DEFAULT_NUM_FOLDS)]
    num_folds: usize,

    /// count the fold files in the save directory instead of using --num-folds
    #[arg(long)]
    discover_folds: bool,

    /// fraction of folds that must agree on a lesion voxel
    #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// write metastasis candidates as label 3 instead of clearing them
    #[arg(long)]
    emit_metastasis: bool,

    /// components must be larger than this many voxels to be kept
    #[arg(long, default_value_t = 20)]
    min_voxels: usize,

    /// rank the background like a component when picking structures
    #[arg(long)]
    rank_background: bool,
}

// main function parses commandline arguments and runs the program
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Args::parse();

    if !cli.save_dir.is_dir() {
        bail!(
            "Did not find fold directory {}. Use -s to pass an existing directory.",
            cli.save_dir.display()
        );
    }

    let num_folds = if cli.discover_folds {
        let n = discover_folds(&cli.save_dir, &cli.prefix)
            .with_context(|| format!("discovering folds for {}", cli.prefix))?;
        log::info!("Found {} folds for {}", n, cli.prefix);
        n
    } else {
        cli.num_folds
    };

    let mut config = PostprocessConfig::new(
        cli.save_dir,
        cli.ct,
        cli.anatomy,
        cli.output,
        cli.prefix,
        cli.lesion_label,
    );
    config.num_folds = num_folds;
    config.threshold = cli.threshold;
    config.emit_metastasis_class = cli.emit_metastasis;
    config.policy = ComponentPolicy {
        min_voxels: cli.min_voxels,
        rank_background: cli.rank_background,
        ..ComponentPolicy::default()
    };

    let mut store = NiftiStore::new();
    let outcome = postprocess(&mut store, &config)
        .with_context(|| format!("post-processing {}", config.ct_path.display()))?;
    match outcome {
        Outcome::Skipped => println!("{} already exists", config.output_path.display()),
        Outcome::Written(summary) => println!(
            "Wrote {}: {} lung, {} lesion voxels ({} cleared outside the field of view)",
            config.output_path.display(),
            summary.lung_voxels,
            summary.lesion_voxels,
            summary.out_of_field_voxels
        ),
    }
    Ok(())
}
