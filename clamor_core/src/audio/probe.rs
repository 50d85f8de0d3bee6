use anyhow::{Context, Result, anyhow};
use std::path::Path;

use symphonia::core::{
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

/// Stream parameters of an audio file, as declared by its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    pub sampling_rate: u32,
    pub num_samples: u64,
    pub channels: u16,
}

/// Probe an audio file for its sample rate, length and channel count.
///
/// When the container does not declare a frame count (some compressed
/// formats), the stream is decoded once to count frames.
pub fn probe_audio<P: AsRef<Path>>(path: P) -> Result<AudioInfo> {
    let path = path.as_ref();

    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("unsupported or corrupt container: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow!("no supported audio track in {}", path.display()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let declared_rate = params.sample_rate;
    let declared_frames = params.n_frames;
    let declared_channels = params.channels.map(|c| c.count());

    if let (Some(rate), Some(frames), Some(channels)) =
        (declared_rate, declared_frames, declared_channels)
    {
        return Ok(AudioInfo {
            sampling_rate: rate,
            num_samples: frames,
            channels: channels as u16,
        });
    }

    // Container is silent about length or layout: decode and count.
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .context("failed to create decoder for selected track")?;

    let mut rate = declared_rate;
    let mut channels = declared_channels;
    let mut frames: u64 = 0;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(e).context("error reading next packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e).context("unrecoverable decode error"),
        };
        rate.get_or_insert(decoded.spec().rate);
        channels.get_or_insert(decoded.spec().channels.count());
        frames += decoded.frames() as u64;
    }

    Ok(AudioInfo {
        sampling_rate: rate
            .ok_or_else(|| anyhow!("could not determine sample rate of {}", path.display()))?,
        num_samples: frames,
        channels: channels
            .ok_or_else(|| anyhow!("could not determine channel count of {}", path.display()))?
            as u16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_wav_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..48_000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let info = probe_audio(&path).unwrap();
        assert_eq!(info.sampling_rate, 16_000);
        assert_eq!(info.num_samples, 48_000);
        assert_eq!(info.channels, 1);
    }

    #[test]
    fn probe_of_non_audio_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_audio.wav");
        std::fs::write(&path, b"plainly not a wav file").unwrap();
        assert!(probe_audio(&path).is_err());
    }
}
