//! Error types for reading, fusing and writing label volumes.

use nifti::error::NiftiError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FuseError {
    /// A required fold, segmentation or scan file does not exist.
    #[error("missing input file {}", path.display())]
    MissingInput { path: PathBuf },

    /// The file exists but could not be parsed as NIfTI.
    #[error("could not read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: NiftiError,
    },

    #[error("could not write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: NiftiError,
    },

    #[error("{} has {ndim} dimensions, expected a 3D volume", path.display())]
    NotVolumetric { path: PathBuf, ndim: usize },

    #[error("{what} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("bad fold file pattern: {0}")]
    FoldPattern(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, FuseError>;

/// Fails with `ShapeMismatch` unless `found` equals `expected`.
pub fn ensure_shape(what: &str, expected: &[usize], found: &[usize]) -> Result<()> {
    if expected != found {
        return Err(FuseError::ShapeMismatch {
            what: what.to_string(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        });
    }
    Ok(())
}
