//! Mixer — gain stages and the reverb wet/dry sum.

use super::Processor;
use super::convolver::Convolver;

/// Plain linear gain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gain {
    pub gain: f32,
}

impl Gain {
    pub fn new(gain: f64) -> Self {
        Gain { gain: gain as f32 }
    }
}

impl Processor for Gain {
    fn process(&mut self, block: &mut [Vec<f32>]) {
        let g = self.gain;
        for samples in block.iter_mut() {
            for s in samples.iter_mut() {
                *s *= g;
            }
        }
    }
}

/// Splits the signal into a dry path and a convolved wet path and sums them:
/// `out = dry_gain·x + wet_gain·(x ∗ ir)`.
pub struct ReverbMix {
    convolver: Convolver,
    pub dry_gain: f32,
    pub wet_gain: f32,
    wet: Vec<Vec<f32>>,
}

impl ReverbMix {
    /// `wet_mix` is the wet share; the dry path gets `1 - wet_mix`.
    pub fn new(convolver: Convolver, wet_mix: f64) -> Self {
        let wet_mix = wet_mix.clamp(0.0, 1.0);
        ReverbMix {
            convolver,
            dry_gain: (1.0 - wet_mix) as f32,
            wet_gain: wet_mix as f32,
            wet: Vec::new(),
        }
    }
}

impl Processor for ReverbMix {
    fn process(&mut self, block: &mut [Vec<f32>]) {
        self.wet.resize_with(block.len(), Vec::new);
        for (wet, dry) in self.wet.iter_mut().zip(block.iter()) {
            wet.clear();
            wet.extend_from_slice(dry);
        }
        self.convolver.process(&mut self.wet);

        for (samples, wet) in block.iter_mut().zip(&self.wet) {
            for (s, &w) in samples.iter_mut().zip(wet) {
                *s = *s * self.dry_gain + w * self.wet_gain;
            }
        }
    }

    fn reset(&mut self) {
        self.convolver.reset();
    }
}
