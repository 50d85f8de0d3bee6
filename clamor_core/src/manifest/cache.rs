use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use super::RecordingSet;

/// Load cached recording manifests for the given dataset parts.
///
/// Looks for `"{prefix}_recordings_{part}.json.gz"` under `src_dir` for each
/// part. Parts without a cached manifest are skipped; `Ok(None)` means no
/// part was cached at all. A present but unreadable manifest is an error.
pub fn read_recording_manifests_if_cached(
    prefix: &str,
    parts: &[&str],
    src_dir: &Path,
) -> Result<Option<BTreeMap<String, RecordingSet>>> {
    let mut manifests = BTreeMap::new();

    for &part in parts {
        let path = src_dir.join(format!("{prefix}_recordings_{part}.json.gz"));
        if !path.is_file() {
            log::debug!("no cached manifest for part {part}: {}", path.display());
            continue;
        }
        let recordings = RecordingSet::from_json_gz(&path)
            .with_context(|| format!("failed to load cached manifest for part {part}"))?;
        manifests.insert(part.to_string(), recordings);
    }

    if manifests.is_empty() {
        return Ok(None);
    }
    Ok(Some(manifests))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Recording;
    use std::path::PathBuf;

    fn write_part(dir: &Path, prefix: &str, part: &str) {
        let set = RecordingSet::from_recordings(vec![Recording {
            id: format!("{part}-0001"),
            path: PathBuf::from(format!("{part}-0001.wav")),
            sampling_rate: 16_000,
            num_samples: 160_000,
            channels: vec![0],
        }]);
        set.to_json_gz(&dir.join(format!("{prefix}_recordings_{part}.json.gz")))
            .unwrap();
    }

    #[test]
    fn nothing_cached_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let found =
            read_recording_manifests_if_cached("musan", &["music", "speech"], dir.path()).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn partial_cache_returns_present_parts() {
        let dir = tempfile::tempdir().unwrap();
        write_part(dir.path(), "musan", "music");

        let found =
            read_recording_manifests_if_cached("musan", &["music", "speech", "noise"], dir.path())
                .unwrap()
                .unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("music"));
    }

    #[test]
    fn all_parts_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        for part in ["music", "speech", "noise"] {
            write_part(dir.path(), "musan", part);
        }

        let found =
            read_recording_manifests_if_cached("musan", &["music", "speech", "noise"], dir.path())
                .unwrap()
                .unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found["speech"].len(), 1);
    }

    #[test]
    fn corrupt_manifest_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("musan_recordings_music.json.gz"),
            b"corrupt",
        )
        .unwrap();
        assert!(read_recording_manifests_if_cached("musan", &["music"], dir.path()).is_err());
    }
}
