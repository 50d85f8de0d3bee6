use anyhow::{Context, Result, anyhow};
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

/// Decode an audio file to mono f32 samples at `target_rate` Hz.
///
/// Any container/codec symphonia can probe is accepted; multi-channel audio
/// is downmixed by averaging and the result is resampled when the source
/// rate differs from `target_rate`.
pub fn decode_to_mono<P: AsRef<Path>>(path: P, target_rate: u32) -> Result<Vec<f32>> {
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

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create decoder for selected track")?;

    let mut source_rate: Option<u32> = track.codec_params.sample_rate;
    let mut source_channels: Option<usize> = None;
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) => break, // end of stream
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow!("chained stream in {}", path.display()));
            }
            Err(e) => return Err(e).context("error reading next packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // Recoverable per-packet errors: drop the packet and continue.
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(SymphoniaError::ResetRequired) => {
                return Err(anyhow!("decoder reset required mid-stream in {}", path.display()));
            }
            Err(e) => return Err(e).context("unrecoverable decode error"),
        };

        source_rate.get_or_insert(decoded.spec().rate);
        source_channels.get_or_insert(decoded.spec().channels.count());

        let mut sbuf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        sbuf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sbuf.samples());
    }

    let rate = source_rate
        .ok_or_else(|| anyhow!("could not determine sample rate of {}", path.display()))?;
    let channels = source_channels
        .ok_or_else(|| anyhow!("could not determine channel count of {}", path.display()))?;

    if interleaved.is_empty() {
        return Err(anyhow!("decoded no audio from {}", path.display()));
    }

    let mono = downmix(interleaved, channels);

    if rate == target_rate {
        Ok(mono)
    } else {
        resample_mono(&mono, rate, target_rate)
            .with_context(|| format!("resampling {} from {rate} Hz", path.display()))
    }
}

/// Average interleaved channels down to a single channel.
fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }
    let frames = interleaved.len() / channels;
    let mut mono = Vec::with_capacity(frames);
    for frame in 0..frames {
        let base = frame * channels;
        let sum: f32 = interleaved[base..base + channels].iter().sum();
        mono.push(sum / channels as f32);
    }
    mono
}

/// Resample a whole mono clip with the FFT resampler (offline, fixed input
/// chunking).
fn resample_mono(mono: &[f32], rate_in: u32, rate_out: u32) -> Result<Vec<f32>> {
    let chunk_size = 1024;
    let sub_chunks = 1;

    let mut resampler = Fft::<f32>::new(
        rate_in as usize,
        rate_out as usize,
        chunk_size,
        sub_chunks,
        1, // mono
        FixedSync::Input,
    )
    .context("failed to construct FFT resampler")?;

    let frames_in = mono.len();
    let frames_out = resampler.process_all_needed_output_len(frames_in);
    let mut out = vec![0.0f32; frames_out];

    // One channel, so the interleaved adapters are plain slices.
    let input = InterleavedSlice::new(mono, 1, frames_in).context("bad input adapter")?;
    let mut output =
        InterleavedSlice::new_mut(&mut out, 1, frames_out).context("bad output adapter")?;

    let (_frames_read, frames_written) =
        resampler.process_all_into_buffer(&input, &mut output, frames_in, None)?;

    out.truncate(frames_written);
    Ok(out)
}
