use anyhow::{Context, Result, ensure};
use log::{info, warn};
use std::path::Path;
use walkdir::WalkDir;

use clamor_core::audio::probe::probe_audio;
use clamor_core::manifest::{Recording, RecordingSet};

const MANIFEST_PREFIX: &str = "musan";
const CORPUS_PARTS: [&str; 3] = ["music", "speech", "noise"];

/// Scan a MUSAN corpus tree and write per-part recording manifests.
///
/// Expects `corpus_dir/{music,speech,noise}` with WAV files at any depth.
/// Each readable file becomes one recording (id = file stem); unreadable
/// files are skipped with a warning. Manifests land in `output_dir` as
/// `musan_recordings_{part}.json.gz`.
pub fn run(corpus_dir: &Path, output_dir: &Path) -> Result<()> {
    ensure!(
        corpus_dir.is_dir(),
        "corpus directory not found: {}",
        corpus_dir.display()
    );
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    for part in CORPUS_PARTS {
        let part_dir = corpus_dir.join(part);
        ensure!(
            part_dir.is_dir(),
            "missing corpus part directory: {}",
            part_dir.display()
        );

        let mut recordings = RecordingSet::new();
        let mut skipped = 0usize;

        for entry in WalkDir::new(&part_dir).sort_by_file_name() {
            let entry = entry.context("failed to walk corpus directory")?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_wav = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("wav"));
            if !is_wav {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                skipped += 1;
                continue;
            };

            match probe_audio(path) {
                Ok(audio_info) => recordings.push(Recording {
                    id: id.to_string(),
                    path: path.to_path_buf(),
                    sampling_rate: audio_info.sampling_rate,
                    num_samples: audio_info.num_samples,
                    channels: (0..audio_info.channels).collect(),
                }),
                Err(e) => {
                    warn!("skipping {}: {e:#}", path.display());
                    skipped += 1;
                }
            }
        }

        if recordings.is_empty() {
            warn!("no usable recordings under {}", part_dir.display());
        }

        let manifest_path =
            output_dir.join(format!("{MANIFEST_PREFIX}_recordings_{part}.json.gz"));
        recordings.to_json_gz(&manifest_path)?;
        info!(
            "{part}: {} recordings ({skipped} skipped) -> {}",
            recordings.len(),
            manifest_path.display()
        );
    }

    Ok(())
}
