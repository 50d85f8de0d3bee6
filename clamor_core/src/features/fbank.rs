use anyhow::{Context, Result, ensure};
use candle_core::{Device, Tensor};
use ndarray::Array2;
use rustfft::{FftPlanner, num_complex::Complex};
use std::f64::consts::PI;

/// Kaldi-style log-mel filterbank parameters.
#[derive(Debug, Clone)]
pub struct FbankConfig {
    pub sampling_rate: u32,
    /// Frame length in seconds.
    pub frame_length: f64,
    /// Frame shift in seconds.
    pub frame_shift: f64,
    pub num_mel_bins: usize,
    pub low_freq: f64,
    /// Upper band edge; zero or negative means Nyquist plus this offset.
    pub high_freq: f64,
    pub remove_dc_offset: bool,
    pub preemphasis: f64,
}

impl Default for FbankConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 16_000,
            frame_length: 0.025,
            frame_shift: 0.01,
            num_mel_bins: 80,
            low_freq: 20.0,
            high_freq: 0.0,
            remove_dc_offset: true,
            preemphasis: 0.97,
        }
    }
}

impl FbankConfig {
    /// Frame length in samples.
    pub fn window_size(&self) -> usize {
        (self.frame_length * self.sampling_rate as f64).round() as usize
    }

    /// Frame shift in samples.
    pub fn window_shift(&self) -> usize {
        (self.frame_shift * self.sampling_rate as f64).round() as usize
    }

    /// FFT size: the window padded to the next power of two.
    pub fn padded_window_size(&self) -> usize {
        self.window_size().next_power_of_two()
    }

    fn resolved_high_freq(&self) -> f64 {
        let nyquist = self.sampling_rate as f64 / 2.0;
        if self.high_freq > 0.0 {
            self.high_freq
        } else {
            nyquist + self.high_freq
        }
    }
}

/// Log-mel fbank extractor. The mel projection runs as a matmul on the
/// configured device; framing and the FFT stay on the host.
pub struct FbankExtractor {
    config: FbankConfig,
    device: Device,
    window: Vec<f32>,
    /// `[num_bins, num_mel_bins]`, resident on `device`.
    mel_filters: Tensor,
}

impl FbankExtractor {
    pub fn new(config: FbankConfig, device: Device) -> Result<Self> {
        ensure!(config.num_mel_bins > 0, "num_mel_bins must be positive");
        ensure!(
            config.window_shift() > 0 && config.window_size() > 0,
            "frame length and shift must be positive"
        );
        ensure!(
            config.resolved_high_freq() > config.low_freq,
            "high_freq must lie above low_freq"
        );

        let window = hann_window(config.window_size());
        let filters = mel_filterbank(
            config.num_mel_bins,
            config.padded_window_size(),
            config.sampling_rate as f64,
            config.low_freq,
            config.resolved_high_freq(),
        );

        let num_bins = config.padded_window_size() / 2 + 1;
        // Transpose [num_mels][num_bins] -> flat [num_bins, num_mels] so the
        // projection is a plain `spectrum x filters` matmul.
        let mut flat = vec![0.0f32; num_bins * config.num_mel_bins];
        for (m, filter) in filters.iter().enumerate() {
            for (k, &weight) in filter.iter().enumerate() {
                flat[k * config.num_mel_bins + m] = weight;
            }
        }
        let mel_filters = Tensor::from_vec(flat, (num_bins, config.num_mel_bins), &device)
            .context("failed to upload mel filterbank")?;

        Ok(Self {
            config,
            device,
            window,
            mel_filters,
        })
    }

    pub fn sampling_rate(&self) -> u32 {
        self.config.sampling_rate
    }

    pub fn frame_shift(&self) -> f64 {
        self.config.frame_shift
    }

    /// Number of frames produced for an input of `num_samples` samples
    /// (snip-edges framing: only fully covered windows count).
    pub fn num_frames(&self, num_samples: usize) -> usize {
        let size = self.config.window_size();
        if num_samples < size {
            return 0;
        }
        (num_samples - size) / self.config.window_shift() + 1
    }

    /// Compute log-mel fbank features, shape `[frames, num_mel_bins]`.
    pub fn extract(&self, samples: &[f32]) -> Result<Array2<f32>> {
        let num_frames = self.num_frames(samples.len());
        let num_mels = self.config.num_mel_bins;
        if num_frames == 0 {
            return Ok(Array2::zeros((0, num_mels)));
        }

        let power = self.power_spectrum(samples, num_frames);
        let num_bins = self.config.padded_window_size() / 2 + 1;

        let spectrum = Tensor::from_vec(power, (num_frames, num_bins), &self.device)
            .context("failed to upload power spectrum")?;
        let mel = spectrum
            .matmul(&self.mel_filters)
            .context("mel projection failed")?;
        let log_mel = mel.maximum(1e-10f32)?.log()?;

        let rows = log_mel.to_device(&Device::Cpu)?.to_vec2::<f32>()?;
        let flat: Vec<f32> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((num_frames, num_mels), flat)?)
    }

    /// Frame, condition and transform the signal; returns a flat
    /// `[num_frames * num_bins]` power spectrum.
    fn power_spectrum(&self, samples: &[f32], num_frames: usize) -> Vec<f32> {
        let size = self.config.window_size();
        let shift = self.config.window_shift();
        let n_fft = self.config.padded_window_size();
        let num_bins = n_fft / 2 + 1;
        let preemph = self.config.preemphasis as f32;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        let mut power = Vec::with_capacity(num_frames * num_bins);
        let mut frame = vec![0.0f32; size];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];

        for index in 0..num_frames {
            let start = index * shift;
            frame.copy_from_slice(&samples[start..start + size]);

            if self.config.remove_dc_offset {
                let mean = frame.iter().sum::<f32>() / size as f32;
                for s in frame.iter_mut() {
                    *s -= mean;
                }
            }

            if preemph != 0.0 {
                for i in (1..size).rev() {
                    frame[i] -= preemph * frame[i - 1];
                }
                frame[0] -= preemph * frame[0];
            }

            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = if i < size { frame[i] * self.window[i] } else { 0.0 };
                *slot = Complex::new(sample, 0.0);
            }

            fft.process(&mut buffer);
            power.extend(
                buffer
                    .iter()
                    .take(num_bins)
                    .map(|c| c.re * c.re + c.im * c.im),
            );
        }

        power
    }
}

/// Periodic Hann window.
fn hann_window(length: usize) -> Vec<f32> {
    (0..length)
        .map(|n| (0.5 * (1.0 - (2.0 * PI * n as f64 / length as f64).cos())) as f32)
        .collect()
}

/// HTK-scale mel: 1127 * ln(1 + hz / 700).
fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// Triangular mel filterbank over `n_fft / 2 + 1` bins, `[num_mels][num_bins]`.
/// Unnormalized triangles, as in Kaldi fbank.
fn mel_filterbank(
    num_mels: usize,
    n_fft: usize,
    sampling_rate: f64,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f32>> {
    let num_bins = n_fft / 2 + 1;
    let bin_freqs: Vec<f64> = (0..num_bins)
        .map(|k| k as f64 * sampling_rate / n_fft as f64)
        .collect();

    let mel_low = hz_to_mel(low_freq);
    let mel_high = hz_to_mel(high_freq);
    let edges: Vec<f64> = (0..num_mels + 2)
        .map(|i| mel_to_hz(mel_low + i as f64 * (mel_high - mel_low) / (num_mels + 1) as f64))
        .collect();

    let mut filters = vec![vec![0.0f32; num_bins]; num_mels];
    for m in 0..num_mels {
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        for (k, &freq) in bin_freqs.iter().enumerate() {
            if freq > left && freq < center {
                filters[m][k] = ((freq - left) / (center - left)) as f32;
            } else if freq >= center && freq < right {
                filters[m][k] = ((right - freq) / (right - center)) as f32;
            }
        }
    }
    filters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cpu_extractor() -> FbankExtractor {
        FbankExtractor::new(FbankConfig::default(), Device::Cpu).unwrap()
    }

    fn sine(seconds: f64, hz: f64, rate: u32) -> Vec<f32> {
        (0..(seconds * rate as f64) as usize)
            .map(|i| (2.0 * PI * hz * i as f64 / rate as f64).sin() as f32 * 0.5)
            .collect()
    }

    #[test]
    fn default_config_matches_16k_framing() {
        let config = FbankConfig::default();
        assert_eq!(config.window_size(), 400);
        assert_eq!(config.window_shift(), 160);
        assert_eq!(config.padded_window_size(), 512);
    }

    #[test]
    fn ten_seconds_is_998_frames() {
        let extractor = cpu_extractor();
        assert_eq!(extractor.num_frames(160_000), 998);
    }

    #[test]
    fn input_shorter_than_a_window_has_no_frames() {
        let extractor = cpu_extractor();
        assert_eq!(extractor.num_frames(399), 0);
        let feats = extractor.extract(&vec![0.1; 399]).unwrap();
        assert_eq!(feats.shape(), &[0, 80]);
    }

    #[test]
    fn extract_shape_and_finiteness() {
        let extractor = cpu_extractor();
        let samples = sine(1.0, 440.0, 16_000);
        let feats = extractor.extract(&samples).unwrap();
        assert_eq!(feats.shape(), &[98, 80]);
        assert!(feats.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn silence_hits_the_log_floor() {
        let extractor = cpu_extractor();
        let feats = extractor.extract(&vec![0.0f32; 16_000]).unwrap();
        let floor = (1e-10f32).ln();
        assert!(feats.iter().all(|&v| (v - floor).abs() < 1e-3));
    }

    #[test]
    fn tone_concentrates_energy_off_the_floor() {
        let extractor = cpu_extractor();
        let feats = extractor.extract(&sine(1.0, 1000.0, 16_000)).unwrap();
        let max = feats.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!(max > (1e-10f32).ln() + 5.0);
    }

    #[test]
    fn hann_window_shape() {
        let window = hann_window(400);
        assert_eq!(window.len(), 400);
        assert!(window[0].abs() < 1e-6);
        assert!((window[200] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn mel_scale_round_trip() {
        for hz in [20.0, 440.0, 4000.0, 7800.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn filterbank_shape_and_coverage() {
        let filters = mel_filterbank(80, 512, 16_000.0, 20.0, 8_000.0);
        assert_eq!(filters.len(), 80);
        assert_eq!(filters[0].len(), 257);
        for filter in &filters {
            assert!(filter.iter().all(|&w| (0.0..=1.0).contains(&w)));
            assert!(filter.iter().sum::<f32>() > 0.0);
        }
    }

    #[test]
    fn rejects_inverted_band_edges() {
        let config = FbankConfig {
            low_freq: 9_000.0,
            ..FbankConfig::default()
        };
        assert!(FbankExtractor::new(config, Device::Cpu).is_err());
    }
}
