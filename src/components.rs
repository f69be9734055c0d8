//! Connected component labelling and the rank/size rule that picks the
//! anatomically relevant components out of a mask.

use ndarray::{ArrayBase, Data, Ix3};
use std::collections::VecDeque;

use crate::common::{BinaryVolume, ComponentVolume};

/// Which components survive selection.
///
/// Components are ranked by descending voxel count, ties broken by ascending
/// component id. The first `skip_largest` ranks are dropped, the next `keep`
/// ranks are retained if they hold more than `min_voxels` voxels, everything
/// else is zeroed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentPolicy {
    pub skip_largest: usize,
    pub keep: usize,
    pub min_voxels: usize,
    /// Rank the background as if it were a component of its own. When the
    /// background is the largest region this keeps the two largest
    /// foreground components instead of the second and third.
    pub rank_background: bool,
}

impl Default for ComponentPolicy {
    fn default() -> Self {
        Self {
            skip_largest: 1,
            keep: 2,
            min_voxels: 20,
            rank_background: false,
        }
    }
}

impl ComponentPolicy {
    /// Orders `(id, voxel count)` pairs by rank. `sizes[0]` is the background.
    pub fn rank(&self, sizes: &[usize]) -> Vec<(u32, usize)> {
        let first = if self.rank_background { 0 } else { 1 };
        let mut ranked: Vec<(u32, usize)> = sizes
            .iter()
            .enumerate()
            .skip(first)
            .filter(|(_, &n)| n > 0)
            .map(|(id, &n)| (id as u32, n))
            .collect();
        // stable, so equal counts stay in ascending id order
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
    }

    /// Ids of the components to retain, never the background.
    pub fn select(&self, sizes: &[usize]) -> Vec<u32> {
        self.rank(sizes)
            .into_iter()
            .skip(self.skip_largest)
            .take(self.keep)
            .filter(|&(id, n)| id != 0 && n > self.min_voxels)
            .map(|(id, _)| id)
            .collect()
    }
}

// the 26 neighbours of a voxel
fn neighbour_offsets() -> Vec<[isize; 3]> {
    let mut offsets = Vec::with_capacity(26);
    for di in -1..=1 {
        for dj in -1..=1 {
            for dk in -1..=1 {
                if (di, dj, dk) != (0, 0, 0) {
                    offsets.push([di, dj, dk]);
                }
            }
        }
    }
    offsets
}

/// Labels 26-connected components of nonzero voxels sharing the same value.
///
/// Ids are assigned from 1 in scan order. Returns the label volume and the
/// number of components found.
pub fn label_components<S>(vol: &ArrayBase<S, Ix3>) -> (ComponentVolume, usize)
where
    S: Data<Elem = u8>,
{
    let (nx, ny, nz) = vol.dim();
    let offsets = neighbour_offsets();
    let mut labels = ComponentVolume::zeros((nx, ny, nz));
    let mut next: u32 = 0;
    let mut queue: VecDeque<(usize, usize, usize)> = VecDeque::new();

    for ((i, j, k), &value) in vol.indexed_iter() {
        if value == 0 || labels[[i, j, k]] != 0 {
            continue;
        }
        next += 1;
        labels[[i, j, k]] = next;
        queue.push_back((i, j, k));

        // BFS flood fill
        while let Some((x, y, z)) = queue.pop_front() {
            for off in &offsets {
                let xn = x as isize + off[0];
                let yn = y as isize + off[1];
                let zn = z as isize + off[2];
                if xn < 0
                    || yn < 0
                    || zn < 0
                    || xn >= nx as isize
                    || yn >= ny as isize
                    || zn >= nz as isize
                {
                    continue;
                }
                let n = [xn as usize, yn as usize, zn as usize];
                if vol[n] == value && labels[n] == 0 {
                    labels[n] = next;
                    queue.push_back((n[0], n[1], n[2]));
                }
            }
        }
    }
    (labels, next as usize)
}

/// Voxel count per component id, index 0 being the background.
pub fn component_sizes(labels: &ComponentVolume, count: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; count + 1];
    for &id in labels.iter() {
        sizes[id as usize] += 1;
    }
    sizes
}

/// Keeps the components chosen by `policy` and zeroes every other voxel.
///
/// An empty result means no structure was found; callers decide whether
/// that deserves a warning.
pub fn select_components<S>(vol: &ArrayBase<S, Ix3>, policy: &ComponentPolicy) -> BinaryVolume
where
    S: Data<Elem = u8>,
{
    let (labels, count) = label_components(vol);
    let sizes = component_sizes(&labels, count);
    let keep = policy.select(&sizes);
    log::debug!(
        "{} components, ranked {:?}, keeping {:?}",
        count,
        policy.rank(&sizes).iter().take(policy.skip_largest + policy.keep + 1).collect::<Vec<_>>(),
        keep
    );

    let mut retained = vec![false; count + 1];
    for id in keep {
        retained[id as usize] = true;
    }
    labels.mapv(|id| retained[id as usize] as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::count_nonzero;
    use ndarray::{s, Array3};

    /// Components of 500, 30, 25 and 5 voxels, separated by gaps of at least one voxel.
    fn four_blobs() -> Array3<u8> {
        let mut vol = Array3::<u8>::zeros((20, 20, 20));
        vol.slice_mut(s![0..5, 0..10, 0..10]).fill(1);
        vol.slice_mut(s![8..10, 0..3, 0..5]).fill(1);
        vol.slice_mut(s![12..17, 0..5, 0..1]).fill(1);
        vol.slice_mut(s![19..20, 19..20, 0..5]).fill(1);
        vol
    }

    #[test]
    fn labels_diagonal_neighbours_as_one_component() {
        let mut vol = Array3::<u8>::zeros((3, 3, 3));
        vol[[0, 0, 0]] = 1;
        vol[[1, 1, 1]] = 1;
        vol[[2, 2, 2]] = 1;
        let (labels, count) = label_components(&vol);
        assert_eq!(count, 1);
        assert_eq!(labels[[2, 2, 2]], 1);
    }

    #[test]
    fn different_values_form_different_components() {
        let mut vol = Array3::<u8>::zeros((4, 1, 1));
        vol[[0, 0, 0]] = 1;
        vol[[1, 0, 0]] = 1;
        vol[[2, 0, 0]] = 2;
        let (labels, count) = label_components(&vol);
        assert_eq!(count, 2);
        assert_eq!(labels[[1, 0, 0]], 1);
        assert_eq!(labels[[2, 0, 0]], 2);
        assert_eq!(component_sizes(&labels, count), vec![1, 2, 1]);
    }

    #[test]
    fn keeps_second_and_third_largest_above_floor() {
        let vol = four_blobs();
        let out = select_components(&vol, &ComponentPolicy::default());
        assert_eq!(count_nonzero(&out), 55);
        assert_eq!(out[[0, 0, 0]], 0);
        assert_eq!(out[[9, 2, 4]], 1);
        assert_eq!(out[[16, 4, 0]], 1);
        assert_eq!(out[[19, 19, 4]], 0);
    }

    #[test]
    fn output_is_a_subset_of_the_input() {
        let vol = four_blobs();
        let out = select_components(&vol, &ComponentPolicy::default());
        assert!(out.iter().zip(vol.iter()).all(|(&o, &v)| o <= v));
    }

    #[test]
    fn floor_is_exclusive() {
        let policy = ComponentPolicy::default();
        assert_eq!(policy.select(&[0, 100, 21, 20]), vec![2]);
    }

    #[test]
    fn ties_are_broken_by_ascending_id() {
        let policy = ComponentPolicy::default();
        assert_eq!(policy.rank(&[0, 30, 100, 30, 30])[1..], [(1, 30), (3, 30), (4, 30)]);
        assert_eq!(policy.select(&[0, 30, 100, 30, 30]), vec![1, 3]);
    }

    #[test]
    fn single_component_yields_empty_selection() {
        let mut vol = Array3::<u8>::zeros((6, 6, 6));
        vol.slice_mut(s![1..5, 1..5, 1..5]).fill(1);
        let out = select_components(&vol, &ComponentPolicy::default());
        assert_eq!(count_nonzero(&out), 0);
        let empty = select_components(&Array3::<u8>::zeros((2, 2, 2)), &ComponentPolicy::default());
        assert_eq!(count_nonzero(&empty), 0);
    }

    #[test]
    fn largest_component_is_never_returned() {
        let vol = four_blobs();
        let out = select_components(&vol, &ComponentPolicy::default());
        assert_eq!(count_nonzero(&out.slice(s![0..5, 0..10, 0..10]).to_owned()), 0);
    }

    #[test]
    fn background_ranking_keeps_two_largest_foreground_and_is_idempotent() {
        let policy = ComponentPolicy {
            rank_background: true,
            ..ComponentPolicy::default()
        };
        let vol = four_blobs();
        let once = select_components(&vol, &policy);
        assert_eq!(count_nonzero(&once), 530);
        let twice = select_components(&once, &policy);
        assert_eq!(once, twice);
    }

    #[test]
    fn background_is_never_selected() {
        let policy = ComponentPolicy {
            rank_background: true,
            skip_largest: 0,
            ..ComponentPolicy::default()
        };
        assert_eq!(policy.select(&[1000, 50, 40]), vec![1]);
    }
}
