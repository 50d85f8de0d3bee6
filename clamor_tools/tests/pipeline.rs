//! End-to-end pipeline tests over a generated miniature MUSAN tree.

use std::f32::consts::PI;
use std::path::Path;

use clamor_core::features::read_features;
use clamor_core::manifest::CutSet;
use clamor_tools::{fbank_musan, prepare_musan};

fn write_tone(path: &Path, seconds: f64, hz: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..(seconds * 16_000.0) as usize {
        let t = i as f32 / 16_000.0;
        let s = (0.3 * (2.0 * PI * hz * t).sin() * 32767.0) as i16;
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

/// `root/musan/{music,speech,noise}` with one 12 s recording each.
fn make_corpus(root: &Path) {
    for (part, hz) in [("music", 330.0), ("speech", 220.0), ("noise", 95.0)] {
        let dir = root.join("musan").join(part);
        std::fs::create_dir_all(&dir).unwrap();
        write_tone(&dir.join(format!("{part}-0001.wav")), 12.0, hz);
    }
}

#[test]
fn prepare_then_compute_fbank() {
    let tmp = tempfile::tempdir().unwrap();
    make_corpus(tmp.path());
    let corpus = tmp.path().join("musan");
    let manifests = tmp.path().join("manifests");
    let fbank = tmp.path().join("fbank");

    prepare_musan::run(&corpus, &manifests).unwrap();
    for part in ["music", "speech", "noise"] {
        assert!(
            manifests
                .join(format!("musan_recordings_{part}.json.gz"))
                .is_file()
        );
    }

    fbank_musan::run(&manifests, &fbank).unwrap();

    let cuts = CutSet::from_json_gz(&fbank.join("cuts_musan.json.gz")).unwrap();
    // One 12 s recording per part: the 10 s head window survives the
    // 5 s filter, the 2 s tail does not.
    assert_eq!(cuts.len(), 3);
    for cut in cuts.iter() {
        assert!(cut.duration > 5.0 && cut.duration <= 10.0);
        let features = cut.features.as_ref().expect("cut must carry features");
        assert_eq!(features.num_frames, 998);
        assert_eq!(features.num_features, 80);
        assert!(features.storage_path.contains("feats_musan"));

        let array = read_features(features).unwrap();
        assert_eq!(array.shape(), &[998, 80]);
        assert!(array.iter().all(|v| v.is_finite()));
    }

    assert!(fbank.join("feats_musan-00000.bin").is_file());
}

#[test]
fn rerun_skips_and_leaves_output_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    make_corpus(tmp.path());
    let manifests = tmp.path().join("manifests");
    let fbank = tmp.path().join("fbank");

    prepare_musan::run(&tmp.path().join("musan"), &manifests).unwrap();
    fbank_musan::run(&manifests, &fbank).unwrap();

    let cuts_path = fbank.join("cuts_musan.json.gz");
    let before = std::fs::read(&cuts_path).unwrap();

    fbank_musan::run(&manifests, &fbank).unwrap();

    let after = std::fs::read(&cuts_path).unwrap();
    assert_eq!(before, after, "skip run must leave the manifest byte-identical");
}

#[test]
fn missing_manifests_fail_fast() {
    let tmp = tempfile::tempdir().unwrap();
    let manifests = tmp.path().join("empty");
    std::fs::create_dir_all(&manifests).unwrap();
    let fbank = tmp.path().join("fbank");

    let result = fbank_musan::run(&manifests, &fbank);
    assert!(result.is_err());
    assert!(!fbank.join("cuts_musan.json.gz").exists());
}

#[test]
fn partial_manifests_still_compute() {
    let tmp = tempfile::tempdir().unwrap();
    make_corpus(tmp.path());
    let manifests = tmp.path().join("manifests");
    let fbank = tmp.path().join("fbank");

    prepare_musan::run(&tmp.path().join("musan"), &manifests).unwrap();
    // Drop two of the three parts: the remaining one must still go through.
    for part in ["speech", "noise"] {
        std::fs::remove_file(manifests.join(format!("musan_recordings_{part}.json.gz"))).unwrap();
    }

    fbank_musan::run(&manifests, &fbank).unwrap();
    let cuts = CutSet::from_json_gz(&fbank.join("cuts_musan.json.gz")).unwrap();
    assert_eq!(cuts.len(), 1);
}

#[test]
fn prepare_rejects_incomplete_corpus() {
    let tmp = tempfile::tempdir().unwrap();
    let corpus = tmp.path().join("musan");
    std::fs::create_dir_all(corpus.join("music")).unwrap();
    // speech and noise are missing entirely
    let result = prepare_musan::run(&corpus, &tmp.path().join("manifests"));
    assert!(result.is_err());
}

#[test]
fn prepare_skips_unreadable_audio() {
    let tmp = tempfile::tempdir().unwrap();
    make_corpus(tmp.path());
    let corpus = tmp.path().join("musan");
    std::fs::write(corpus.join("music/broken-0002.wav"), b"not audio").unwrap();

    let manifests = tmp.path().join("manifests");
    prepare_musan::run(&corpus, &manifests).unwrap();

    let music = clamor_core::manifest::RecordingSet::from_json_gz(
        &manifests.join("musan_recordings_music.json.gz"),
    )
    .unwrap();
    assert_eq!(music.len(), 1, "broken file must be skipped, not fatal");
}
