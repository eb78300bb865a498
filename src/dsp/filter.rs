//! Biquad filter — matches WebAudio BiquadFilterNode coefficients.

use std::f64::consts::PI;

use super::Processor;

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    /// Constant 0 dB peak gain band-pass.
    Bandpass,
    /// High shelf with slope 1; `gain_db` sets the shelf level.
    Highshelf,
}

/// A biquad IIR filter (2nd order) with independent state per channel.
///
/// Implements the standard Direct Form II Transposed structure.
/// Coefficient formulas from the Audio EQ Cookbook (Robert Bristow-Johnson).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    pub frequency: f64,
    pub q: f64,
    pub gain_db: f64, // only used for Highshelf

    // Coefficients
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed), one pair per channel
    state: Vec<[f64; 2]>,

    sample_rate: f64,
    dirty: bool,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, sample_rate: f64, channels: usize) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency: 350.0,
            q: 1.0, // WebAudio default
            gain_db: 0.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            state: vec![[0.0; 2]; channels],
            sample_rate,
            dirty: true,
        };
        f.update_coefficients();
        f
    }

    /// Create a filter with specific parameters.
    pub fn with_params(
        filter_type: FilterType,
        sample_rate: f64,
        channels: usize,
        frequency: f64,
        q: f64,
        gain_db: f64,
    ) -> Self {
        let mut f = Self::new(filter_type, sample_rate, channels);
        f.frequency = frequency;
        f.q = q;
        f.gain_db = gain_db;
        f.update_coefficients();
        f
    }

    /// Recompute filter coefficients from current parameters.
    pub fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        // below 2 Hz there is no room between 1 Hz and Nyquist
        let freq = self.frequency.clamp(1.0, (nyquist * 0.999).max(1.0));
        let w0 = 2.0 * PI * freq / self.sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Bandpass => {
                let alpha = sin_w0 / (2.0 * self.q.max(1e-4));
                let b0 = alpha;
                let b1 = 0.0;
                let b2 = -alpha;
                let a0 = 1.0 + alpha;
                let a1 = -2.0 * cos_w0;
                let a2 = 1.0 - alpha;
                (b0, b1, b2, a0, a1, a2)
            }
            FilterType::Highshelf => {
                let a_lin = (10.0_f64).powf(self.gain_db / 40.0);
                let alpha = sin_w0 / 2.0 * 2.0_f64.sqrt();
                let two_sqrt_a_alpha = 2.0 * a_lin.sqrt() * alpha;
                let b0 = a_lin * ((a_lin + 1.0) + (a_lin - 1.0) * cos_w0 + two_sqrt_a_alpha);
                let b1 = -2.0 * a_lin * ((a_lin - 1.0) + (a_lin + 1.0) * cos_w0);
                let b2 = a_lin * ((a_lin + 1.0) + (a_lin - 1.0) * cos_w0 - two_sqrt_a_alpha);
                let a0 = (a_lin + 1.0) - (a_lin - 1.0) * cos_w0 + two_sqrt_a_alpha;
                let a1 = 2.0 * ((a_lin - 1.0) - (a_lin + 1.0) * cos_w0);
                let a2 = (a_lin + 1.0) - (a_lin - 1.0) * cos_w0 - two_sqrt_a_alpha;
                (b0, b1, b2, a0, a1, a2)
            }
        };

        // Normalize by a0
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
        self.dirty = false;
    }

    /// Process a single sample of one channel through the filter.
    #[inline]
    pub fn process_sample(&mut self, channel: usize, input: f64) -> f64 {
        if self.dirty {
            self.update_coefficients();
        }

        let z = &mut self.state[channel];
        let output = self.b0 * input + z[0];
        z[0] = self.b1 * input - self.a1 * output + z[1];
        z[1] = self.b2 * input - self.a2 * output;
        output
    }

    /// Set frequency and mark coefficients dirty.
    pub fn set_frequency(&mut self, freq: f64) {
        self.frequency = freq;
        self.dirty = true;
    }

    /// Set Q and mark coefficients dirty.
    pub fn set_q(&mut self, q: f64) {
        self.q = q;
        self.dirty = true;
    }

    /// Set shelf gain and mark coefficients dirty.
    pub fn set_gain_db(&mut self, gain_db: f64) {
        self.gain_db = gain_db;
        self.dirty = true;
    }
}

impl Processor for BiquadFilter {
    fn process(&mut self, block: &mut [Vec<f32>]) {
        for (c, samples) in block.iter_mut().enumerate() {
            for s in samples.iter_mut() {
                *s = self.process_sample(c, *s as f64) as f32;
            }
        }
    }

    fn reset(&mut self) {
        self.state.fill([0.0; 2]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_peak(f: &mut BiquadFilter, freq: f64, sample_rate: f64) -> f64 {
        let mut max_out = 0.0_f64;
        for i in 0..(sample_rate as usize / 5) {
            let t = i as f64 / sample_rate;
            let out = f.process_sample(0, (2.0 * PI * freq * t).sin());
            if i > 2000 {
                // skip transient
                max_out = max_out.max(out.abs());
            }
        }
        max_out
    }

    #[test]
    fn bandpass_blocks_dc() {
        let mut f = BiquadFilter::with_params(FilterType::Bandpass, 44100.0, 1, 1200.0, 1.0, 0.0);
        let mut output = 0.0;
        for _ in 0..5000 {
            output = f.process_sample(0, 1.0);
        }
        assert!(output.abs() < 0.001, "Bandpass should block DC, got {output}");
    }

    #[test]
    fn bandpass_passes_center_frequency() {
        let mut f = BiquadFilter::with_params(FilterType::Bandpass, 44100.0, 1, 1000.0, 1.5, 0.0);
        let peak = sine_peak(&mut f, 1000.0, 44100.0);
        assert!((peak - 1.0).abs() < 0.02, "Center frequency should pass at unity, got {peak}");
    }

    #[test]
    fn highshelf_cut_attenuates_treble_only() {
        let mut f = BiquadFilter::with_params(FilterType::Highshelf, 44100.0, 1, 8000.0, 1.0, -40.0);
        let treble = sine_peak(&mut f, 18000.0, 44100.0);
        assert!(treble < 0.05, "-40 dB shelf should cut 18kHz, got {treble}");

        let mut f = BiquadFilter::with_params(FilterType::Highshelf, 44100.0, 1, 8000.0, 1.0, -40.0);
        let bass = sine_peak(&mut f, 200.0, 44100.0);
        assert!(bass > 0.95, "-40 dB shelf should leave 200Hz alone, got {bass}");
    }

    #[test]
    fn zero_db_highshelf_is_identity() {
        let mut f = BiquadFilter::with_params(FilterType::Highshelf, 48000.0, 1, 8000.0, 1.0, 0.0);
        for i in 0..1000 {
            let x = ((i * 37) % 101) as f64 / 50.0 - 1.0;
            let y = f.process_sample(0, x);
            assert!((y - x).abs() < 1e-9, "sample {i}: {y} != {x}");
        }
    }

    #[test]
    fn channels_keep_separate_state() {
        let mut f = BiquadFilter::with_params(FilterType::Bandpass, 44100.0, 2, 1000.0, 1.0, 0.0);
        let mut block = vec![vec![1.0, 0.0, 0.0, 0.0], vec![0.0; 4]];
        f.process(&mut block);
        assert!(block[0][0] != 0.0);
        assert!(block[1].iter().all(|&s| s == 0.0), "silent channel must stay silent");
    }

    #[test]
    fn filter_output_finite() {
        let mut f = BiquadFilter::new(FilterType::Bandpass, 44100.0, 1);
        f.set_frequency(30000.0); // above Nyquist, clamped
        f.set_q(0.0);
        for i in 0..10000 {
            let input = if i % 100 == 0 { 1.0 } else { 0.0 };
            let out = f.process_sample(0, input);
            assert!(out.is_finite(), "Filter output not finite at sample {i}");
        }
    }

    #[test]
    fn tiny_sample_rates_stay_finite() {
        for sample_rate in [1.0, 2.0, 3.0] {
            let mut f = BiquadFilter::new(FilterType::Highshelf, sample_rate, 1);
            f.set_frequency(8000.0);
            f.set_gain_db(-40.0);
            let mut block = vec![vec![1.0, -1.0, 0.5]];
            f.process(&mut block);
            assert!(block[0].iter().all(|s| s.is_finite()), "rate {sample_rate}");
        }
    }

    #[test]
    fn shelf_gain_change_takes_effect() {
        let mut f = BiquadFilter::with_params(FilterType::Highshelf, 44100.0, 1, 8000.0, 1.0, 0.0);
        let flat = f.process_sample(0, 1.0);
        f.reset();
        f.set_gain_db(-40.0);
        let cut = f.process_sample(0, 1.0);
        assert!((flat - 1.0).abs() < 1e-9, "0 dB shelf passes the impulse");
        assert!(cut < flat);
    }
}
