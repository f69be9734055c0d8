//! Consensus vote over the per-fold lesion predictions.

use glob::{glob, Pattern};
use ndarray::{Array3, ArrayBase, Data, Ix3, Zip};
use std::path::{Path, PathBuf};

use crate::common::BinaryVolume;
use crate::error::{ensure_shape, FuseError, Result};
use crate::io::VolumeStore;

pub const DEFAULT_NUM_FOLDS: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 0.6;

const FOLD_SUFFIX: &str = ".nii.gz";

/// `{save_dir}/{prefix}_{fold}.nii.gz`
pub fn fold_path(save_dir: &Path, prefix: &str, fold: usize) -> PathBuf {
    save_dir.join(format!("{prefix}_{fold}{FOLD_SUFFIX}"))
}

fn fold_index(path: &Path, prefix: &str) -> Option<usize> {
    let filename = path.file_name()?.to_str()?;
    filename
        .strip_prefix(prefix)?
        .strip_prefix('_')?
        .strip_suffix(FOLD_SUFFIX)?
        .parse::<usize>()
        .ok()
}

/// Counts the fold files present in `save_dir` for `prefix`.
///
/// Fold indices must run from 0 without gaps; the first missing fold is
/// reported as a missing input.
pub fn discover_folds(save_dir: &Path, prefix: &str) -> Result<usize> {
    let pattern = format!(
        "{}/{}_*{FOLD_SUFFIX}",
        Pattern::escape(&save_dir.to_string_lossy()),
        Pattern::escape(prefix)
    );
    let mut indices: Vec<usize> = glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| fold_index(&path, prefix))
        .collect();
    indices.sort_unstable();
    indices.dedup();
    log::debug!("Found folds {:?} for {}", indices, prefix);

    for (expected, &found) in indices.iter().enumerate() {
        if expected != found {
            return Err(FuseError::MissingInput {
                path: fold_path(save_dir, prefix, expected),
            });
        }
    }
    if indices.is_empty() {
        return Err(FuseError::MissingInput {
            path: fold_path(save_dir, prefix, 0),
        });
    }
    Ok(indices.len())
}

fn check_threshold(threshold: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(FuseError::InvalidParameter(format!(
            "fusion threshold {threshold} is outside [0, 1]"
        )));
    }
    Ok(())
}

/// Per-voxel count of folds voting for the lesion label.
///
/// Folds are added one at a time so only one prediction needs to be held in
/// memory alongside the counts.
#[derive(Debug, Clone)]
pub struct VoteAccumulator {
    label: i32,
    votes: Option<Array3<u16>>,
    folds: usize,
}

impl VoteAccumulator {
    pub fn new(label: i32) -> Self {
        Self {
            label,
            votes: None,
            folds: 0,
        }
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Adds one fold. All folds must share the shape of the first.
    pub fn add<S>(&mut self, fold: &ArrayBase<S, Ix3>) -> Result<()>
    where
        S: Data<Elem = i32>,
    {
        let label = self.label;
        match self.votes.as_mut() {
            None => {
                self.votes = Some(fold.mapv(|v| (v == label) as u16));
            }
            Some(votes) => {
                ensure_shape(
                    &format!("fold {}", self.folds),
                    votes.shape(),
                    fold.shape(),
                )?;
                Zip::from(votes)
                    .and(fold)
                    .for_each(|n, &v| *n += (v == label) as u16);
            }
        }
        self.folds += 1;
        Ok(())
    }

    /// 1 where the fraction of agreeing folds is at least `threshold`.
    pub fn finish(self, threshold: f64) -> Result<BinaryVolume> {
        check_threshold(threshold)?;
        let votes = self.votes.ok_or_else(|| {
            FuseError::InvalidParameter("cannot fuse zero folds".to_string())
        })?;
        let n = self.folds as f64;
        Ok(votes.mapv(|count| (count as f64 / n >= threshold) as u8))
    }
}

/// Fuses fold predictions already in memory.
pub fn fuse_folds<S>(folds: &[ArrayBase<S, Ix3>], label: i32, threshold: f64) -> Result<BinaryVolume>
where
    S: Data<Elem = i32>,
{
    let mut acc = VoteAccumulator::new(label);
    for fold in folds {
        acc.add(fold)?;
    }
    acc.finish(threshold)
}

/// Reads folds `0..num_folds` for `prefix` from `save_dir` and fuses them.
///
/// Any missing or unreadable fold aborts the fusion.
pub fn load_ensemble<V: VolumeStore>(
    store: &V,
    save_dir: &Path,
    prefix: &str,
    label: i32,
    num_folds: usize,
    threshold: f64,
) -> Result<BinaryVolume> {
    check_threshold(threshold)?;
    if num_folds == 0 {
        return Err(FuseError::InvalidParameter(
            "number of folds must be at least 1".to_string(),
        ));
    }
    let mut acc = VoteAccumulator::new(label);
    for fold in 0..num_folds {
        let path = fold_path(save_dir, prefix, fold);
        log::info!("Loading fold {}: {}", fold, path.display());
        let scan = store.read_labels(&path)?;
        acc.add(&scan.data)?;
    }
    acc.finish(threshold)
}
