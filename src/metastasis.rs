//! Separates the primary lesion mass from metastasis candidates.
//!
//! Each side is analysed on its own copy of the class volume with the other
//! lung cleared; the candidates of both analyses are intersected, so a voxel
//! only counts as metastatic if it lies outside the primary mass under both.

use ndarray::Zip;

use crate::common::{count_nonzero, BinaryVolume, Laterality};
use crate::components::{select_components, ComponentPolicy};
use crate::error::{ensure_shape, Result};
use crate::structures::LungStructures;

/// Metastasis candidates for one side.
///
/// `op_data` is the class volume (lung 1, lesion 2) and is consumed: voxels
/// under `opposite_lung` are cleared in place before the primary mass is
/// selected. Returns 1 at positive voxels outside the primary mass.
pub fn resolve_side(
    opposite_lung: &BinaryVolume,
    mut op_data: BinaryVolume,
    policy: &ComponentPolicy,
) -> Result<BinaryVolume> {
    ensure_shape("opposite lung", op_data.shape(), opposite_lung.shape())?;
    Zip::from(&mut op_data)
        .and(opposite_lung)
        .for_each(|v, &lung| {
            if lung == 1 {
                *v = 0;
            }
        });
    let primary = select_components(&op_data, policy);
    Ok(Zip::from(&op_data)
        .and(&primary)
        .map_collect(|&v, &p| (v > 0 && p == 0) as u8))
}

/// Intersection of the per-side metastasis candidates.
///
/// `labels` is left untouched; each side works on its own copy.
pub fn resolve_metastases(
    labels: &BinaryVolume,
    structures: &LungStructures,
    policy: &ComponentPolicy,
) -> Result<BinaryVolume> {
    let mut mets: Option<BinaryVolume> = None;
    for side in [Laterality::Right, Laterality::Left] {
        let candidates = resolve_side(structures.lung(side.opposite()), labels.clone(), policy)?;
        log::debug!(
            "{} side: {} metastasis candidates",
            side,
            count_nonzero(&candidates)
        );
        mets = Some(match mets {
            None => candidates,
            Some(prev) => &prev & &candidates,
        });
    }
    Ok(mets.unwrap_or_else(|| BinaryVolume::zeros(labels.raw_dim())))
}
