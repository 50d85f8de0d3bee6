use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{Recording, RecordingSet};

/// Reference to a feature array stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Features {
    pub storage_path: String,
    pub byte_offset: u64,
    pub num_frames: usize,
    pub num_features: usize,
    pub frame_shift: f64,
}

/// A time-bounded slice of a recording, the unit of feature computation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cut {
    pub id: String,
    pub start: f64,
    pub duration: f64,
    pub channel: u16,
    pub recording: Recording,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Features>,
}

impl Cut {
    /// A cut spanning the whole recording.
    pub fn from_recording(recording: Recording) -> Self {
        let channel = recording.channels.first().copied().unwrap_or(0);
        Self {
            id: recording.id.clone(),
            start: 0.0,
            duration: recording.duration(),
            channel,
            recording,
            features: None,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = Some(features);
        self
    }
}

/// Ordered sequence of cuts, serialized as a JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct CutSet {
    cuts: Vec<Cut>,
}

impl CutSet {
    /// One full-length cut per recording.
    pub fn from_recordings(recordings: RecordingSet) -> Self {
        recordings.into_iter().map(Cut::from_recording).collect()
    }

    /// Slice every cut into consecutive non-overlapping windows of at most
    /// `window` seconds; the last partial window is kept. Lazy: nothing is
    /// materialized until the iterator is collected.
    pub fn cut_into_windows(&self, window: f64) -> CutIntoWindows<'_> {
        CutIntoWindows {
            cuts: self.cuts.iter(),
            window,
            current: None,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Cut> {
        self.cuts.iter()
    }

    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    pub fn to_json_gz(&self, path: &Path) -> Result<()> {
        super::write_json_gz(path, self)
    }

    pub fn from_json_gz(path: &Path) -> Result<Self> {
        super::read_json_gz(path)
    }
}

impl IntoIterator for CutSet {
    type Item = Cut;
    type IntoIter = std::vec::IntoIter<Cut>;

    fn into_iter(self) -> Self::IntoIter {
        self.cuts.into_iter()
    }
}

impl<'a> IntoIterator for &'a CutSet {
    type Item = &'a Cut;
    type IntoIter = std::slice::Iter<'a, Cut>;

    fn into_iter(self) -> Self::IntoIter {
        self.cuts.iter()
    }
}

impl FromIterator<Cut> for CutSet {
    fn from_iter<I: IntoIterator<Item = Cut>>(iter: I) -> Self {
        Self {
            cuts: iter.into_iter().collect(),
        }
    }
}

/// Windowing stage over a cut sequence. Yields windows in source order,
/// numbered per cut; a zero-duration cut yields nothing.
pub struct CutIntoWindows<'a> {
    cuts: std::slice::Iter<'a, Cut>,
    window: f64,
    current: Option<(&'a Cut, usize)>,
}

impl Iterator for CutIntoWindows<'_> {
    type Item = Cut;

    fn next(&mut self) -> Option<Cut> {
        loop {
            if let Some((cut, index)) = self.current {
                let offset = index as f64 * self.window;
                if offset < cut.duration {
                    let duration = (cut.duration - offset).min(self.window);
                    self.current = Some((cut, index + 1));
                    return Some(Cut {
                        id: format!("{}-{}", cut.id, index),
                        start: cut.start + offset,
                        duration,
                        channel: cut.channel,
                        recording: cut.recording.clone(),
                        features: None,
                    });
                }
                self.current = None;
            }
            let next = self.cuts.next()?;
            self.current = Some((next, 0));
        }
    }
}
