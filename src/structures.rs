//! Lung and heart masks cleaned out of the anatomical segmentation.

use ndarray::{ArrayBase, Data, Ix3};

use crate::common::{count_nonzero, BinaryVolume, Laterality};
use crate::components::{select_components, ComponentPolicy};
use crate::labels::{mask_labels, AnatomyVocabulary};

#[derive(Debug, Clone)]
pub struct LungStructures {
    pub left: BinaryVolume,
    pub right: BinaryVolume,
    /// Union of `left` and `right`.
    pub combined: BinaryVolume,
    pub heart: BinaryVolume,
}

impl LungStructures {
    pub fn lung(&self, side: Laterality) -> &BinaryVolume {
        match side {
            Laterality::Left => &self.left,
            Laterality::Right => &self.right,
        }
    }
}

/// Masks one structure and keeps the components the policy selects.
pub fn extract_structure<S>(
    labels: &[i32],
    seg: &ArrayBase<S, Ix3>,
    policy: &ComponentPolicy,
) -> BinaryVolume
where
    S: Data<Elem = i32>,
{
    select_components(&mask_labels(labels, seg), policy)
}

fn warn_if_empty(name: &str, mask: &BinaryVolume) {
    let voxels = count_nonzero(mask);
    if voxels == 0 {
        log::warn!("No {} found in the anatomical segmentation", name);
    } else {
        log::debug!("{}: {} voxels", name, voxels);
    }
}

/// Builds left lung, right lung, combined lung and heart.
///
/// A structure that is not found comes back as an all-zero mask.
pub fn assemble_structures<S>(
    seg: &ArrayBase<S, Ix3>,
    vocab: &AnatomyVocabulary,
    policy: &ComponentPolicy,
) -> LungStructures
where
    S: Data<Elem = i32>,
{
    let left = extract_structure(&vocab.left_lung, seg, policy);
    let right = extract_structure(&vocab.right_lung, seg, policy);
    let heart = extract_structure(&vocab.heart, seg, policy);
    warn_if_empty("left lung", &left);
    warn_if_empty("right lung", &right);
    warn_if_empty("heart", &heart);
    let combined = &left | &right;
    LungStructures {
        left,
        right,
        combined,
        heart,
    }
}
