//! Binary masks from sets of anatomical label ids.

use ndarray::{ArrayBase, Data, Ix3};

use crate::common::BinaryVolume;

/// Label ids of the structures picked out of the anatomical segmentation.
///
/// The defaults are the TotalSegmentator ids for the lung lobes and the heart
/// chambers; they must match whichever model produced the segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnatomyVocabulary {
    pub left_lung: Vec<i32>,
    pub right_lung: Vec<i32>,
    pub heart: Vec<i32>,
}

impl Default for AnatomyVocabulary {
    fn default() -> Self {
        Self {
            // upper and lower left lobes
            left_lung: vec![13, 14],
            // upper, middle and lower right lobes
            right_lung: vec![15, 16, 17],
            // myocardium, atria and ventricles
            heart: vec![44, 45, 46, 47, 48],
        }
    }
}

/// 1 wherever the label is in `labels`, 0 elsewhere.
pub fn mask_labels<S>(labels: &[i32], seg: &ArrayBase<S, Ix3>) -> BinaryVolume
where
    S: Data<Elem = i32>,
{
    seg.mapv(|v| labels.contains(&v) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn segmentation() -> Array3<i32> {
        Array3::from_shape_fn((3, 3, 3), |(i, j, k)| (i * 9 + j * 3 + k) as i32 + 10)
    }

    #[test]
    fn mask_is_binary_union_of_labels() {
        let seg = segmentation();
        let mask = mask_labels(&[13, 14], &seg);
        assert!(mask.iter().all(|&v| v == 0 || v == 1));
        for (m, s) in mask.iter().zip(seg.iter()) {
            assert_eq!(*m == 1, *s == 13 || *s == 14);
        }
        assert_eq!(mask.iter().filter(|&&v| v == 1).count(), 2);
    }

    #[test]
    fn disjoint_label_sets_give_disjoint_masks() {
        let seg = segmentation();
        let vocab = AnatomyVocabulary::default();
        let left = mask_labels(&vocab.left_lung, &seg);
        let right = mask_labels(&vocab.right_lung, &seg);
        let heart = mask_labels(&vocab.heart, &seg);
        for ((l, r), h) in left.iter().zip(right.iter()).zip(heart.iter()) {
            assert!(l + r + h <= 1);
        }
        assert_eq!(right.iter().filter(|&&v| v == 1).count(), 3);
    }

    #[test]
    fn empty_label_set_masks_nothing() {
        let mask = mask_labels(&[], &segmentation());
        assert!(mask.iter().all(|&v| v == 0));
    }
}
