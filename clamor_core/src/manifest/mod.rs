pub mod cache;
mod cut;
mod recording;

pub use cut::{Cut, CutIntoWindows, CutSet, Features};
pub use recording::{Recording, RecordingSet};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Union of several recording collections into one, preserving order.
pub fn combine<I>(sets: I) -> RecordingSet
where
    I: IntoIterator<Item = RecordingSet>,
{
    let mut combined = RecordingSet::new();
    for set in sets {
        combined.extend(set);
    }
    combined
}

/// Serialize a manifest to gzip-compressed JSON.
pub(crate) fn write_json_gz<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create manifest: {}", path.display()))?;
    let mut encoder =
        flate2::write::GzEncoder::new(BufWriter::new(file), flate2::Compression::default());
    serde_json::to_writer(&mut encoder, value)
        .with_context(|| format!("failed to serialize manifest: {}", path.display()))?;
    encoder
        .finish()
        .with_context(|| format!("failed to finish gzip stream: {}", path.display()))?;
    Ok(())
}

/// Deserialize a manifest from gzip-compressed JSON.
pub(crate) fn read_json_gz<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("failed to open manifest: {}", path.display()))?;
    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));
    serde_json::from_reader(decoder)
        .with_context(|| format!("failed to parse manifest: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn recording(id: &str, seconds: f64) -> Recording {
        Recording {
            id: id.to_string(),
            path: PathBuf::from(format!("{id}.wav")),
            sampling_rate: 16_000,
            num_samples: (seconds * 16_000.0) as u64,
            channels: vec![0],
        }
    }

    #[test]
    fn combine_preserves_order() {
        let a = RecordingSet::from_recordings(vec![recording("a", 1.0)]);
        let b = RecordingSet::from_recordings(vec![recording("b", 2.0), recording("c", 3.0)]);
        let combined = combine([a, b]);
        let ids: Vec<&str> = combined.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn combine_of_nothing_is_empty() {
        assert!(combine(Vec::<RecordingSet>::new()).is_empty());
    }
}
