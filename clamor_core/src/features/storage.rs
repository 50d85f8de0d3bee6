use anyhow::{Context, Result, ensure};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::manifest::Features;

/// Appends feature arrays as raw little-endian f32 to chunk files named
/// `"{prefix}-{chunk:05}.bin"`; `rotate` starts the next chunk.
pub struct FeatureWriter {
    prefix: PathBuf,
    frame_shift: f64,
    chunk: usize,
    writer: Option<BufWriter<File>>,
    byte_offset: u64,
}

impl FeatureWriter {
    /// `prefix` is a path prefix, not a directory: `data/fbank/feats_musan`.
    pub fn new<P: AsRef<Path>>(prefix: P, frame_shift: f64) -> Result<Self> {
        let prefix = prefix.as_ref().to_path_buf();
        if let Some(parent) = prefix.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(Self {
            prefix,
            frame_shift,
            chunk: 0,
            writer: None,
            byte_offset: 0,
        })
    }

    fn chunk_path(&self) -> PathBuf {
        let mut name = self.prefix.as_os_str().to_os_string();
        name.push(format!("-{:05}.bin", self.chunk));
        PathBuf::from(name)
    }

    /// Append one feature array and return its storage reference.
    pub fn write(&mut self, feats: &Array2<f32>) -> Result<Features> {
        ensure!(
            feats.is_standard_layout(),
            "feature array must be in row-major layout"
        );

        let path = self.chunk_path();
        if self.writer.is_none() {
            let file = File::create(&path)
                .with_context(|| format!("failed to create feature chunk {}", path.display()))?;
            self.writer = Some(BufWriter::new(file));
            self.byte_offset = 0;
        }
        let writer = self.writer.as_mut().unwrap();

        let offset = self.byte_offset;
        let mut bytes = Vec::with_capacity(feats.len() * 4);
        for &value in feats.iter() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        writer
            .write_all(&bytes)
            .with_context(|| format!("failed to write features to {}", path.display()))?;
        self.byte_offset += bytes.len() as u64;

        let (num_frames, num_features) = feats.dim();
        Ok(Features {
            storage_path: path.to_string_lossy().into_owned(),
            byte_offset: offset,
            num_frames,
            num_features,
            frame_shift: self.frame_shift,
        })
    }

    /// Close the current chunk; the next write opens a new one.
    pub fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().context("failed to flush feature chunk")?;
            self.chunk += 1;
            self.byte_offset = 0;
        }
        Ok(())
    }

    /// Flush everything to disk.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush().context("failed to flush feature chunk")?;
        }
        Ok(())
    }
}

/// Read a stored feature array back into memory.
pub fn read_features(features: &Features) -> Result<Array2<f32>> {
    let mut file = File::open(&features.storage_path)
        .with_context(|| format!("failed to open feature chunk {}", features.storage_path))?;
    file.seek(SeekFrom::Start(features.byte_offset))
        .context("failed to seek to feature array")?;

    let len = features.num_frames * features.num_features;
    let mut bytes = vec![0u8; len * 4];
    file.read_exact(&mut bytes)
        .with_context(|| format!("short read from {}", features.storage_path))?;

    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Array2::from_shape_vec(
        (features.num_frames, features.num_features),
        values,
    )?)
}
