//! Wave-shaper distortion with a sampled soft-clip transfer curve.

use super::Processor;

/// Points in the sampled transfer curve.
pub const CURVE_LEN: usize = 44100;

/// Soft-clip curve `tanh(k·x) / tanh(k)` sampled over `x ∈ [-1, 1)`.
pub fn soft_clip_curve(drive: f64) -> Vec<f32> {
    let norm = drive.tanh();
    (0..CURVE_LEN)
        .map(|i| {
            let x = i as f64 * 2.0 / CURVE_LEN as f64 - 1.0;
            ((drive * x).tanh() / norm) as f32
        })
        .collect()
}

/// Maps every sample through a transfer curve, interpolating between points.
///
/// Inputs outside [-1, 1] clamp to the curve's end points.
#[derive(Debug, Clone)]
pub struct WaveShaper {
    curve: Vec<f32>,
}

impl WaveShaper {
    pub fn new(curve: Vec<f32>) -> Self {
        WaveShaper { curve }
    }

    /// Soft-clip shaper with the given drive constant.
    pub fn soft_clip(drive: f64) -> Self {
        Self::new(soft_clip_curve(drive))
    }

    #[inline]
    pub fn shape(&self, input: f32) -> f32 {
        let n = self.curve.len();
        if n == 0 {
            return input;
        }
        let v = (n - 1) as f32 * 0.5 * (input + 1.0);
        if v <= 0.0 {
            return self.curve[0];
        }
        if v >= (n - 1) as f32 {
            return self.curve[n - 1];
        }
        let k = v as usize;
        let f = v - k as f32;
        (1.0 - f) * self.curve[k] + f * self.curve[k + 1]
    }
}

impl Processor for WaveShaper {
    fn process(&mut self, block: &mut [Vec<f32>]) {
        for samples in block.iter_mut() {
            for s in samples.iter_mut() {
                *s = self.shape(*s);
            }
        }
    }
}
