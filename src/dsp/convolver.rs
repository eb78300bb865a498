//! Convolution reverb — uniformly partitioned FFT convolution.
//!
//! The impulse response is split into partitions one block long. Each
//! partition is transformed once up front; every incoming block is
//! transformed once, pushed onto a frequency-domain delay line, and
//! multiplied against all partitions (overlap-save, FFT size = 2 × block).
//! Cost per block stays linear in IR length with no added latency.

use std::sync::Arc;

use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use tracing::warn;

use super::Processor;
use crate::buffer::SampleBuffer;

const GAIN_CALIBRATION: f64 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

/// Loudness normalization applied to an impulse response.
///
/// Scales by the inverse RMS power across all channels so that impulse
/// responses of different lengths and levels come out at similar loudness.
pub fn normalization_scale(ir: &SampleBuffer) -> f64 {
    let channels = ir.channel_count();
    let len = ir.frame_count();
    let mut power: f64 = ir
        .channels()
        .iter()
        .flat_map(|ch| ch.iter())
        .map(|&s| s as f64 * s as f64)
        .sum();
    power = (power / (channels * len.max(1)) as f64).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    scale *= GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate() as f64;
    if channels == 4 {
        scale *= 0.5;
    }
    scale
}

/// Per-output-channel convolution state.
struct Lane {
    ir_channel: usize,
    /// Previous block followed by the current block.
    window: Vec<f32>,
    /// Spectra of the most recent input blocks, newest at `head`.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
}

/// Streaming convolver for a fixed block size.
pub struct Convolver {
    block: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    /// `[ir channel][partition]` spectra, pre-scaled.
    partitions: Vec<Vec<Vec<Complex<f32>>>>,
    lanes: Vec<Lane>,
    time_scratch: Vec<f32>,
    accum: Vec<Complex<f32>>,
    pending: Vec<f32>,
}

impl Convolver {
    /// Build a convolver for `channels` outputs.
    ///
    /// The impulse response is resampled to `sample_rate` when needed and
    /// normalized. Output channel `c` is convolved with IR channel
    /// `c % ir_channels`.
    pub fn new(ir: &SampleBuffer, sample_rate: u32, channels: usize, block: usize) -> Self {
        let ir = ir.resampled(sample_rate);
        let fft_size = 2 * block;
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        // Fold the inverse-FFT 1/N into the IR spectra.
        let scale = (normalization_scale(&ir) / fft_size as f64) as f32;
        let num_partitions = ir.frame_count().div_ceil(block).max(1);

        let partitions = ir
            .channels()
            .iter()
            .map(|data| {
                (0..num_partitions)
                    .map(|p| {
                        let start = (p * block).min(data.len());
                        let end = (start + block).min(data.len());
                        let mut padded = vec![0.0; fft_size];
                        for (dst, &src) in padded.iter_mut().zip(&data[start..end]) {
                            *dst = src * scale;
                        }
                        let mut spectrum = r2c.make_output_vec();
                        if let Err(e) = r2c.process(&mut padded, &mut spectrum) {
                            warn!("impulse response partition transform failed: {e}");
                            spectrum.fill(Complex::new(0.0, 0.0));
                        }
                        spectrum
                    })
                    .collect()
            })
            .collect::<Vec<Vec<_>>>();

        let lanes = (0..channels)
            .map(|c| Lane {
                ir_channel: c % partitions.len(),
                window: vec![0.0; fft_size],
                history: vec![r2c.make_output_vec(); num_partitions],
                head: 0,
            })
            .collect();

        Convolver {
            block,
            time_scratch: vec![0.0; fft_size],
            accum: r2c.make_output_vec(),
            pending: vec![0.0; block],
            r2c,
            c2r,
            partitions,
            lanes,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    pub fn partition_count(&self) -> usize {
        self.partitions[0].len()
    }

    /// Convolve one block for one lane. `samples` may be shorter than the
    /// block only at the very end of a stream; it is treated as zero-padded.
    fn process_lane(&mut self, lane_idx: usize, samples: &mut [f32]) {
        let block = self.block;
        let n = samples.len().min(block);
        self.pending[..n].copy_from_slice(&samples[..n]);
        self.pending[n..].fill(0.0);

        let lane = &mut self.lanes[lane_idx];
        lane.window.copy_within(block.., 0);
        lane.window[block..].copy_from_slice(&self.pending);

        let partitions = &self.partitions[lane.ir_channel];
        let count = partitions.len();
        lane.head = (lane.head + 1) % count;

        self.time_scratch.copy_from_slice(&lane.window);
        if let Err(e) = self.r2c.process(&mut self.time_scratch, &mut lane.history[lane.head]) {
            warn!("convolver forward transform failed: {e}");
            samples[..n].fill(0.0);
            return;
        }

        self.accum.fill(Complex::new(0.0, 0.0));
        for (p, h) in partitions.iter().enumerate() {
            let x = &lane.history[(lane.head + count - p) % count];
            for ((acc, &xv), &hv) in self.accum.iter_mut().zip(x).zip(h) {
                *acc += xv * hv;
            }
        }
        // DC and Nyquist bins of a real signal have no imaginary part.
        let last = self.accum.len() - 1;
        self.accum[0].im = 0.0;
        self.accum[last].im = 0.0;

        if let Err(e) = self.c2r.process(&mut self.accum, &mut self.time_scratch) {
            warn!("convolver inverse transform failed: {e}");
            samples[..n].fill(0.0);
            return;
        }
        samples[..n].copy_from_slice(&self.time_scratch[block..block + n]);
    }
}

impl Processor for Convolver {
    fn process(&mut self, block: &mut [Vec<f32>]) {
        for (c, samples) in block.iter_mut().enumerate().take(self.lanes.len()) {
            self.process_lane(c, samples);
        }
    }

    fn reset(&mut self) {
        for lane in &mut self.lanes {
            lane.window.fill(0.0);
            for spectrum in &mut lane.history {
                spectrum.fill(Complex::new(0.0, 0.0));
            }
            lane.head = 0;
        }
    }
}
