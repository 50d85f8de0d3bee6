use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use clamor_core::device::best_device;
use clamor_core::features::{FbankConfig, FbankExtractor, compute_and_store_features_batch};
use clamor_core::manifest::{CutSet, cache::read_recording_manifests_if_cached, combine};

const MANIFEST_PREFIX: &str = "musan";
const DATASET_PARTS: [&str; 3] = ["music", "speech", "noise"];

/// Workers in the extraction pool.
const NUM_WORKERS: usize = 10;
/// Seconds of audio per batch.
const BATCH_DURATION: f64 = 600.0;

const WINDOW_DURATION: f64 = 10.0;
const MIN_CUT_DURATION: f64 = 5.0;

/// Compute fbank features for the MUSAN corpus.
///
/// Reads cached recording manifests from `src_dir`, windows every recording
/// into 10 s cuts, drops cuts of 5 s or less, computes features in batches
/// and writes `cuts_musan.json.gz` plus `feats_musan*` under `output_dir`.
/// A pre-existing cuts manifest skips all work.
pub fn run(src_dir: &Path, output_dir: &Path) -> Result<()> {
    let manifests =
        read_recording_manifests_if_cached(MANIFEST_PREFIX, &DATASET_PARTS, src_dir)?
            .with_context(|| {
                format!(
                    "no cached {MANIFEST_PREFIX} recording manifests found in {}",
                    src_dir.display()
                )
            })?;

    let cuts_path = output_dir.join("cuts_musan.json.gz");
    if cuts_path.is_file() {
        info!("{} already exists - skipping", cuts_path.display());
        return Ok(());
    }

    info!("Extracting features for Musan");

    let device = best_device()?;
    info!("device: {device:?}");
    let extractor = FbankExtractor::new(FbankConfig::default(), device)?;

    let recordings = combine(manifests.into_values());
    let cuts = CutSet::from_recordings(recordings);
    let cuts: CutSet = cuts
        .cut_into_windows(WINDOW_DURATION)
        .filter(|cut| cut.duration > MIN_CUT_DURATION)
        .collect();
    info!("{} cuts after windowing and filtering", cuts.len());

    let cuts = compute_and_store_features_batch(
        cuts,
        &extractor,
        output_dir.join("feats_musan"),
        NUM_WORKERS,
        BATCH_DURATION,
    )?;

    cuts.to_json_gz(&cuts_path)?;
    info!("wrote {}", cuts_path.display());

    Ok(())
}
