//! The full post-processing run for one scan.
//!
//! anatomy -> lung/heart structures, folds -> consensus lesion, then the class
//! volume is composed, cleared outside the scanned field of view, checked for
//! metastasis candidates and written on the CT grid.

use ndarray::Zip;
use std::path::{Path, PathBuf};

use crate::common::{
    count_nonzero, BinaryVolume, Geometry, IntensityVolume, BACKGROUND, LESION, LUNG, METASTASIS,
};
use crate::components::ComponentPolicy;
use crate::ensemble::{load_ensemble, DEFAULT_NUM_FOLDS, DEFAULT_THRESHOLD};
use crate::error::{ensure_shape, Result};
use crate::io::VolumeStore;
use crate::labels::AnatomyVocabulary;
use crate::metastasis::resolve_metastases;
use crate::structures::{assemble_structures, LungStructures};

/// Affines further apart than this (in mm) are reported as drifted.
const AFFINE_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct PostprocessConfig {
    /// Directory holding the per-fold predictions.
    pub save_dir: PathBuf,
    pub ct_path: PathBuf,
    pub anatomy_path: PathBuf,
    pub output_path: PathBuf,
    /// Fold `i` is read from `{save_dir}/{fold_prefix}_{i}.nii.gz`.
    pub fold_prefix: String,
    /// Label of the lesion class in the fold predictions.
    pub lesion_label: i32,
    pub num_folds: usize,
    pub threshold: f64,
    /// Write metastasis candidates as class 3. When false they are cleared to
    /// background before writing.
    pub emit_metastasis_class: bool,
    pub policy: ComponentPolicy,
    pub vocabulary: AnatomyVocabulary,
}

impl PostprocessConfig {
    pub fn new(
        save_dir: impl Into<PathBuf>,
        ct_path: impl Into<PathBuf>,
        anatomy_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        fold_prefix: impl Into<String>,
        lesion_label: i32,
    ) -> Self {
        Self {
            save_dir: save_dir.into(),
            ct_path: ct_path.into(),
            anatomy_path: anatomy_path.into(),
            output_path: output_path.into(),
            fold_prefix: fold_prefix.into(),
            lesion_label,
            num_folds: DEFAULT_NUM_FOLDS,
            threshold: DEFAULT_THRESHOLD,
            emit_metastasis_class: false,
            policy: ComponentPolicy::default(),
            vocabulary: AnatomyVocabulary::default(),
        }
    }
}

/// Voxel counts gathered during one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostprocessSummary {
    pub lung_voxels: usize,
    pub lesion_voxels: usize,
    /// Labelled voxels cleared because the CT holds its minimum there.
    pub out_of_field_voxels: usize,
    pub metastasis_voxels: usize,
    pub heart_voxels: usize,
    pub lesion_voxels_in_heart: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The output already existed and was left alone.
    Skipped,
    Written(PostprocessSummary),
}

/// Clears every voxel where the CT equals its own minimum, i.e. outside the
/// scanned field of view. Returns how many labelled voxels were cleared.
pub fn mask_out_of_field(labels: &mut BinaryVolume, ct: &IntensityVolume) -> Result<usize> {
    ensure_shape("class volume", ct.shape(), labels.shape())?;
    let sentinel = ct.iter().copied().fold(f32::INFINITY, f32::min);
    let mut cleared = 0;
    Zip::from(labels).and(ct).for_each(|label, &hu| {
        if hu == sentinel {
            if *label != BACKGROUND {
                cleared += 1;
            }
            *label = BACKGROUND;
        }
    });
    Ok(cleared)
}

/// Composes the class volume from structures, consensus lesions and the CT.
///
/// Lung is 1, lesion 2 (lesion wins on overlap). Metastasis candidates are
/// marked 3 and, unless `emit_metastasis_class` is set, cleared again.
pub fn compose_labels(
    structures: &LungStructures,
    lesions: &BinaryVolume,
    ct: &IntensityVolume,
    policy: &ComponentPolicy,
    emit_metastasis_class: bool,
) -> Result<(BinaryVolume, PostprocessSummary)> {
    ensure_shape("lung mask", ct.shape(), structures.combined.shape())?;
    ensure_shape("fused lesions", ct.shape(), lesions.shape())?;

    let mut labels = BinaryVolume::zeros(ct.raw_dim());
    Zip::from(&mut labels)
        .and(&structures.combined)
        .and(lesions)
        .for_each(|out, &lung, &lesion| {
            if lesion == 1 {
                *out = LESION;
            } else if lung == 1 {
                *out = LUNG;
            }
        });

    let out_of_field_voxels = mask_out_of_field(&mut labels, ct)?;
    if out_of_field_voxels > 0 {
        log::warn!(
            "Cleared {} labelled voxels outside the scanned field of view",
            out_of_field_voxels
        );
    }

    let mut lesion_voxels_in_heart = 0;
    Zip::from(&labels)
        .and(&structures.heart)
        .for_each(|&label, &heart| {
            if label == LESION && heart == 1 {
                lesion_voxels_in_heart += 1;
            }
        });

    let mets = resolve_metastases(&labels, structures, policy)?;
    Zip::from(&mut labels).and(&mets).for_each(|label, &m| {
        if m == 1 {
            *label = METASTASIS;
        }
    });
    let metastasis_voxels = count_nonzero(&mets);
    if !emit_metastasis_class {
        labels.mapv_inplace(|v| if v == METASTASIS { BACKGROUND } else { v });
        log::debug!(
            "Metastasis class disabled, cleared {} candidate voxels",
            metastasis_voxels
        );
    }

    let summary = PostprocessSummary {
        lung_voxels: labels.iter().filter(|&&v| v == LUNG).count(),
        lesion_voxels: labels.iter().filter(|&&v| v == LESION).count(),
        out_of_field_voxels,
        metastasis_voxels,
        heart_voxels: count_nonzero(&structures.heart),
        lesion_voxels_in_heart,
    };
    Ok((labels, summary))
}

/// Runs the whole post-processing for one scan and writes the class volume.
///
/// Does nothing if the output already exists. Every input is read before the
/// single write, so a failed run leaves no output behind.
pub fn postprocess<V: VolumeStore>(store: &mut V, config: &PostprocessConfig) -> Result<Outcome> {
    if store.exists(&config.output_path) {
        log::info!(
            "Output {} already exists, skipping",
            config.output_path.display()
        );
        return Ok(Outcome::Skipped);
    }

    log::info!("Reading CT {}", config.ct_path.display());
    let ct = store.read_intensity(&config.ct_path)?;
    log::info!(
        "Reading anatomical segmentation {}",
        config.anatomy_path.display()
    );
    let anatomy = store.read_labels(&config.anatomy_path)?;
    ensure_shape("anatomical segmentation", ct.shape(), anatomy.shape())?;
    check_alignment(&config.anatomy_path, &anatomy.geometry, &ct.geometry);

    let structures = assemble_structures(&anatomy.data, &config.vocabulary, &config.policy);
    drop(anatomy);

    let lesions = load_ensemble(
        store,
        &config.save_dir,
        &config.fold_prefix,
        config.lesion_label,
        config.num_folds,
        config.threshold,
    )?;

    let (labels, summary) = compose_labels(
        &structures,
        &lesions,
        &ct.data,
        &config.policy,
        config.emit_metastasis_class,
    )?;
    log::debug!("{:?}", summary);

    store.write_labels(&config.output_path, &labels, &ct.geometry)?;
    log::info!(
        "Wrote {} ({} lung, {} lesion voxels)",
        config.output_path.display(),
        summary.lung_voxels,
        summary.lesion_voxels
    );
    Ok(Outcome::Written(summary))
}

fn check_alignment(path: &Path, geometry: &Geometry, reference: &Geometry) {
    let deviation = geometry.affine_deviation(reference);
    if deviation > AFFINE_TOLERANCE {
        log::warn!(
            "Affine of {} differs from the CT by up to {:.4}; labels are taken voxel for voxel",
            path.display(),
            deviation
        );
    }
}
