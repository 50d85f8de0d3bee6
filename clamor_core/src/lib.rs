//! Dataset preparation library for ASR training: audio decoding, recording
//! and cut manifests, Kaldi-style fbank extraction and batched feature
//! storage.

pub mod audio;
pub mod device;
pub mod features;
pub mod manifest;
pub mod threads;
