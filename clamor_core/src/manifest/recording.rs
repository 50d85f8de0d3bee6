use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reference to a source audio file and its stream parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recording {
    pub id: String,
    pub path: PathBuf,
    pub sampling_rate: u32,
    pub num_samples: u64,
    pub channels: Vec<u16>,
}

impl Recording {
    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.num_samples as f64 / self.sampling_rate as f64
    }
}

/// Ordered collection of recordings, serialized as a JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RecordingSet {
    recordings: Vec<Recording>,
}

impl RecordingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_recordings(recordings: Vec<Recording>) -> Self {
        Self { recordings }
    }

    pub fn push(&mut self, recording: Recording) {
        self.recordings.push(recording);
    }

    pub fn extend<I: IntoIterator<Item = Recording>>(&mut self, recordings: I) {
        self.recordings.extend(recordings);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recording> {
        self.recordings.iter()
    }

    pub fn len(&self) -> usize {
        self.recordings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recordings.is_empty()
    }

    pub fn to_json_gz(&self, path: &Path) -> Result<()> {
        super::write_json_gz(path, self)
    }

    pub fn from_json_gz(path: &Path) -> Result<Self> {
        super::read_json_gz(path)
    }
}

impl IntoIterator for RecordingSet {
    type Item = Recording;
    type IntoIter = std::vec::IntoIter<Recording>;

    fn into_iter(self) -> Self::IntoIter {
        self.recordings.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordingSet {
    type Item = &'a Recording;
    type IntoIter = std::slice::Iter<'a, Recording>;

    fn into_iter(self) -> Self::IntoIter {
        self.recordings.iter()
    }
}

impl FromIterator<Recording> for RecordingSet {
    fn from_iter<I: IntoIterator<Item = Recording>>(iter: I) -> Self {
        Self {
            recordings: iter.into_iter().collect(),
        }
    }
}
