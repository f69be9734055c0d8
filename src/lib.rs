//! Fuses per-fold lesion predictions with an anatomical segmentation into a
//! single lung/lesion label volume.
//!
//! The stages can be used on their own: [`labels`] and [`components`] build
//! cleaned masks, [`structures`] assembles lungs and heart, [`ensemble`] votes
//! over folds, [`metastasis`] splits primary lesion from metastasis candidates
//! and [`pipeline`] ties them together around a [`io::VolumeStore`].

pub mod common;
pub mod components;
pub mod ensemble;
pub mod error;
pub mod io;
pub mod labels;
pub mod metastasis;
pub mod pipeline;
pub mod structures;

pub use error::{FuseError, Result};
pub use pipeline::{postprocess, Outcome, PostprocessConfig, PostprocessSummary};
