use nalgebra::Matrix4;
use ndarray::Array3;
use nifti::NiftiHeader;
use std::fmt;

/// Integer labels from the anatomical segmentation or a fold prediction.
pub type LabelVolume = Array3<i32>;
/// Raw scan intensities (CT, Hounsfield-like units).
pub type IntensityVolume = Array3<f32>;
/// 0/1 indicator volume. Also used for the final class volume, which only holds small values.
pub type BinaryVolume = Array3<u8>;
/// 0 is background, every positive id is one connected component.
pub type ComponentVolume = Array3<u32>;

// classes of the emitted label volume
pub const BACKGROUND: u8 = 0;
pub const LUNG: u8 = 1;
pub const LESION: u8 = 2;
pub const METASTASIS: u8 = 3;

// set up enums and structs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Laterality {
    Left,
    Right,
}

impl Laterality {
    pub fn opposite(&self) -> Self {
        match self {
            Laterality::Left => Laterality::Right,
            Laterality::Right => Laterality::Left,
        }
    }
}
impl fmt::Display for Laterality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Laterality::Left => write!(f, "left"),
            Laterality::Right => write!(f, "right"),
        }
    }
}

/// Voxel grid geometry of a scan, carried as the NIfTI header it was read with.
///
/// The intensity scan is the single source of truth: every derived volume is
/// written with a copy of its geometry, never with geometry of its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    header: NiftiHeader,
}

impl Geometry {
    pub fn new(header: NiftiHeader) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    pub fn affine(&self) -> Matrix4<f64> {
        self.header.affine::<f64>()
    }

    /// Header for writing class labels on this grid.
    ///
    /// Spatial fields are copied unchanged; intensity scaling is reset so the
    /// stored integers are the classes themselves.
    pub fn label_header(&self) -> NiftiHeader {
        let mut header = self.header.clone();
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        header.cal_min = 0.0;
        header.cal_max = 0.0;
        header
    }

    /// Largest absolute difference between the two affines.
    pub fn affine_deviation(&self, other: &Geometry) -> f64 {
        (self.affine() - other.affine()).abs().max()
    }
}

/// A volume together with the geometry it was read with.
#[derive(Debug, Clone)]
pub struct Scan<T> {
    pub data: Array3<T>,
    pub geometry: Geometry,
}
impl<T> Scan<T> {
    pub fn new(data: Array3<T>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

/// Number of nonzero voxels.
pub fn count_nonzero(vol: &BinaryVolume) -> usize {
    vol.iter().filter(|&&v| v != 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laterality_opposite_swaps_sides() {
        assert_eq!(Laterality::Left.opposite(), Laterality::Right);
        assert_eq!(Laterality::Right.opposite().opposite(), Laterality::Right);
        assert_eq!(Laterality::Left.to_string(), "left");
    }

    #[test]
    fn label_header_resets_scaling_but_keeps_spacing() {
        let mut header = NiftiHeader::default();
        header.scl_slope = 2.0;
        header.scl_inter = -1024.0;
        header.pixdim = [1.0, 0.7, 0.7, 2.5, 0.0, 0.0, 0.0, 0.0];
        let geometry = Geometry::new(header);
        let out = geometry.label_header();
        assert_eq!(out.scl_slope, 1.0);
        assert_eq!(out.scl_inter, 0.0);
        assert_eq!(out.pixdim, geometry.header().pixdim);
    }

    #[test]
    fn identical_geometry_has_no_affine_deviation() {
        let geometry = Geometry::default();
        assert_eq!(geometry.affine_deviation(&geometry.clone()), 0.0);
    }
}
