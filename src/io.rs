//! Reading and writing volumes.
//!
//! The pipeline only talks to a [`VolumeStore`]. [`NiftiStore`] works on
//! `.nii`/`.nii.gz` files, [`MemoryStore`] keeps everything in memory.

use ndarray::{Array3, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{DataElement, IntoNdArray, NiftiObject, ReaderOptions};
use std::collections::HashMap;
use std::ops::{Add, Mul};
use std::path::{Path, PathBuf};

use crate::common::{BinaryVolume, Geometry, Scan};
use crate::error::{FuseError, Result};

pub trait VolumeStore {
    fn exists(&self, path: &Path) -> bool;

    /// Integer labels, e.g. an anatomical segmentation or one fold prediction.
    fn read_labels(&self, path: &Path) -> Result<Scan<i32>>;

    fn read_intensity(&self, path: &Path) -> Result<Scan<f32>>;

    /// Writes a class volume on the grid described by `geometry`.
    fn write_labels(&mut self, path: &Path, data: &BinaryVolume, geometry: &Geometry)
        -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NiftiStore;

impl NiftiStore {
    pub fn new() -> Self {
        Self
    }
}

/// Reads a 3D NIfTI file into an array of `T`.
///
/// A 4D file with a single volume is accepted and its last axis dropped.
fn read_nifti<T>(path: &Path) -> Result<Scan<T>>
where
    T: DataElement + Mul<Output = T> + Add<Output = T>,
{
    if !path.exists() {
        return Err(FuseError::MissingInput {
            path: path.to_path_buf(),
        });
    }
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|source| FuseError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let header = obj.header().clone();
    let img = obj
        .into_volume()
        .into_ndarray::<T>()
        .map_err(|source| FuseError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    // shave off a singleton 4th dimension
    let img = if img.ndim() == 4 && img.shape()[3] == 1 {
        img.index_axis_move(Axis(3), 0)
    } else {
        img
    };
    let ndim = img.ndim();
    let img = img
        .into_dimensionality::<Ix3>()
        .map_err(|_| FuseError::NotVolumetric {
            path: path.to_path_buf(),
            ndim,
        })?;
    log::debug!("Read {} with shape {:?}", path.display(), img.shape());
    Ok(Scan::new(img, Geometry::new(header)))
}

impl VolumeStore for NiftiStore {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_labels(&self, path: &Path) -> Result<Scan<i32>> {
        read_nifti::<i32>(path)
    }

    fn read_intensity(&self, path: &Path) -> Result<Scan<f32>> {
        read_nifti::<f32>(path)
    }

    fn write_labels(
        &mut self,
        path: &Path,
        data: &BinaryVolume,
        geometry: &Geometry,
    ) -> Result<()> {
        WriterOptions::new(path)
            .reference_header(&geometry.label_header())
            .write_nifti(data)
            .map_err(|source| FuseError::WriteFailed {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }
}

/// Volumes held in memory, keyed by path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    volumes: HashMap<PathBuf, Scan<f64>>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T>(&mut self, path: impl Into<PathBuf>, data: &Array3<T>, geometry: Geometry)
    where
        T: Copy + Into<f64>,
    {
        let data = data.mapv(|v| v.into());
        self.volumes.insert(path.into(), Scan::new(data, geometry));
    }

    pub fn get(&self, path: &Path) -> Option<&Scan<f64>> {
        self.volumes.get(path)
    }

    /// Number of successful `write_labels` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn lookup(&self, path: &Path) -> Result<&Scan<f64>> {
        self.volumes.get(path).ok_or_else(|| FuseError::MissingInput {
            path: path.to_path_buf(),
        })
    }
}

impl VolumeStore for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.volumes.contains_key(path)
    }

    fn read_labels(&self, path: &Path) -> Result<Scan<i32>> {
        let scan = self.lookup(path)?;
        Ok(Scan::new(
            scan.data.mapv(|v| v as i32),
            scan.geometry.clone(),
        ))
    }

    fn read_intensity(&self, path: &Path) -> Result<Scan<f32>> {
        let scan = self.lookup(path)?;
        Ok(Scan::new(
            scan.data.mapv(|v| v as f32),
            scan.geometry.clone(),
        ))
    }

    fn write_labels(
        &mut self,
        path: &Path,
        data: &BinaryVolume,
        geometry: &Geometry,
    ) -> Result<()> {
        self.insert(path, data, geometry.clone());
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn memory_store_reports_missing_input() {
        let store = MemoryStore::new();
        let err = store.read_labels(Path::new("nope.nii.gz")).unwrap_err();
        assert!(matches!(err, FuseError::MissingInput { .. }));
    }

    #[test]
    fn memory_store_round_trips_labels() {
        let mut store = MemoryStore::new();
        let mut data = Array3::<u8>::zeros((2, 3, 4));
        data[[1, 2, 3]] = 2;
        store
            .write_labels(Path::new("out.nii.gz"), &data, &Geometry::default())
            .unwrap();
        assert!(store.exists(Path::new("out.nii.gz")));
        assert_eq!(store.writes(), 1);
        let back = store.read_labels(Path::new("out.nii.gz")).unwrap();
        assert_eq!(back.data.mapv(|v| v as u8), data);
    }

    #[test]
    fn nifti_store_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.nii.gz");
        let err = NiftiStore::new().read_intensity(&path).unwrap_err();
        assert!(matches!(err, FuseError::MissingInput { .. }));
        assert!(!NiftiStore::new().exists(&path));
    }

    #[test]
    fn nifti_store_round_trips_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.nii.gz");
        let mut data = Array3::<u8>::zeros((4, 5, 6));
        data[[0, 1, 2]] = 1;
        data[[3, 4, 5]] = 2;
        let mut store = NiftiStore::new();
        store
            .write_labels(&path, &data, &Geometry::default())
            .unwrap();
        assert!(store.exists(&path));
        let back = store.read_labels(&path).unwrap();
        assert_eq!(back.shape(), &[4, 5, 6]);
        assert_eq!(back.data.mapv(|v| v as u8), data);
    }

    #[test]
    fn nifti_store_rejects_garbage_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.nii");
        std::fs::write(&path, b"definitely not a nifti header").unwrap();
        let err = NiftiStore::new().read_labels(&path).unwrap_err();
        assert!(matches!(err, FuseError::Unreadable { .. }));
    }
}
