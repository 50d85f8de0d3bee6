use anyhow::{Context, Result, ensure};
use log::info;
use ndarray::Array2;
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;

use super::fbank::FbankExtractor;
use super::storage::FeatureWriter;
use crate::audio::decoder::decode_to_mono;
use crate::manifest::{Cut, CutSet, Features};

/// Compute fbank features for every cut and persist them under
/// `storage_prefix`, returning the cuts annotated with their storage
/// references, in the original order.
///
/// Cuts are processed in consecutive batches holding at most
/// `batch_duration` seconds of audio (an over-long cut forms its own
/// batch). Within a batch each recording is decoded once on a dedicated
/// pool of `num_workers` threads and its windows are extracted from the
/// decoded samples; storage appends happen in cut order, one chunk file per
/// batch.
///
/// Any decode, extraction or write failure aborts the whole call.
pub fn compute_and_store_features_batch<P: AsRef<Path>>(
    cuts: CutSet,
    extractor: &FbankExtractor,
    storage_prefix: P,
    num_workers: usize,
    batch_duration: f64,
) -> Result<CutSet> {
    ensure!(num_workers > 0, "num_workers must be positive");
    ensure!(batch_duration > 0.0, "batch_duration must be positive");

    let mut writer = FeatureWriter::new(storage_prefix, extractor.frame_shift())?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_workers)
        .thread_name(|i| format!("fbank-worker-{i}"))
        .build()
        .context("failed to build extraction worker pool")?;

    let cuts: Vec<Cut> = cuts.into_iter().collect();
    let batches = split_batches(&cuts, batch_duration);
    let num_batches = batches.len();

    let mut references: Vec<Option<Features>> = vec![None; cuts.len()];

    for (batch_index, batch) in batches.iter().enumerate() {
        let seconds: f64 = batch.iter().map(|&i| cuts[i].duration).sum();

        // Decode each recording once per batch, then slice out its windows.
        // TODO: carry decoded audio across batch boundaries when a
        // recording's windows span two batches.
        let groups = group_by_recording(&cuts, batch);
        let computed: Vec<Vec<(usize, Array2<f32>)>> = pool.install(|| {
            groups
                .par_iter()
                .map(|group| extract_group(&cuts, group, extractor))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut in_order: Vec<(usize, Array2<f32>)> = computed.into_iter().flatten().collect();
        in_order.sort_by_key(|&(index, _)| index);

        for (index, feats) in in_order {
            references[index] = Some(writer.write(&feats)?);
        }
        writer.rotate()?;

        info!(
            "batch {}/{}: {} cuts, {:.1} s of audio",
            batch_index + 1,
            num_batches,
            batch.len(),
            seconds
        );
    }

    writer.finish()?;

    cuts.into_iter()
        .zip(references)
        .map(|(cut, reference)| {
            let reference = reference
                .with_context(|| format!("cut {} was never assigned to a batch", cut.id))?;
            Ok(cut.with_features(reference))
        })
        .collect()
}

/// Consecutive batches of cut indices whose summed duration stays within
/// `batch_duration` seconds.
fn split_batches(cuts: &[Cut], batch_duration: f64) -> Vec<Vec<usize>> {
    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_seconds = 0.0;

    for (index, cut) in cuts.iter().enumerate() {
        if !current.is_empty() && current_seconds + cut.duration > batch_duration {
            batches.push(std::mem::take(&mut current));
            current_seconds = 0.0;
        }
        current.push(index);
        current_seconds += cut.duration;
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Group a batch's cut indices by recording id, preserving first-seen order.
fn group_by_recording(cuts: &[Cut], batch: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();

    for &index in batch {
        let id = cuts[index].recording.id.as_str();
        match by_id.get(id) {
            Some(&g) => groups[g].push(index),
            None => {
                by_id.insert(id, groups.len());
                groups.push(vec![index]);
            }
        }
    }
    groups
}

/// Decode one recording and extract features for each of its cuts.
fn extract_group(
    cuts: &[Cut],
    group: &[usize],
    extractor: &FbankExtractor,
) -> Result<Vec<(usize, Array2<f32>)>> {
    let recording = &cuts[group[0]].recording;
    let rate = extractor.sampling_rate();
    let samples = decode_to_mono(&recording.path, rate)
        .with_context(|| format!("failed to decode recording {}", recording.id))?;

    let mut out = Vec::with_capacity(group.len());
    for &index in group {
        let cut = &cuts[index];
        let start = (cut.start * rate as f64).round() as usize;
        ensure!(
            start < samples.len(),
            "cut {} starts at {:.2} s, beyond the decoded audio of {}",
            cut.id,
            cut.start,
            recording.id
        );
        // The decoded length can differ from the manifest by a few frames
        // after resampling; the slice is clamped to the decoded range.
        let end = ((cut.end() * rate as f64).round() as usize).min(samples.len());

        let feats = extractor
            .extract(&samples[start..end])
            .with_context(|| format!("feature extraction failed for cut {}", cut.id))?;
        out.push((index, feats));
    }
    Ok(out)
}
