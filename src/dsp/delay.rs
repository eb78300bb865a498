//! Echo — a recirculating feedback delay line.

use super::Processor;

/// A multi-channel delay whose output feeds back into its own input.
///
/// The stage emits only the delayed signal: `y[n] = x[n-D] + feedback·y[n-D]`.
/// The dry signal is not passed through.
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    buffers: Vec<Vec<f32>>,
    write_pos: usize,
    delay_samples: usize,

    /// Feedback amount (0.0 = single repeat, < 1.0 to stay stable).
    pub feedback: f32,
}

impl FeedbackDelay {
    /// Create a delay line.
    ///
    /// # Arguments
    /// - `sample_rate`: Audio sample rate in Hz.
    /// - `channels`: Number of independent delay lines.
    /// - `delay_time`: Delay in seconds.
    /// - `feedback`: Recirculation gain, clamped to [0, 0.99].
    pub fn new(sample_rate: f64, channels: usize, delay_time: f64, feedback: f64) -> Self {
        let delay_samples = ((delay_time.max(0.0) * sample_rate).round() as usize).max(1);
        Self {
            buffers: vec![vec![0.0; delay_samples]; channels],
            write_pos: 0,
            delay_samples,
            feedback: feedback.clamp(0.0, 0.99) as f32,
        }
    }

    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Clear the delay buffers.
    pub fn clear(&mut self) {
        for buf in &mut self.buffers {
            buf.fill(0.0);
        }
        self.write_pos = 0;
    }
}

impl Processor for FeedbackDelay {
    fn process(&mut self, block: &mut [Vec<f32>]) {
        let frames = block.first().map_or(0, Vec::len);
        for i in 0..frames {
            // The ring holds exactly D samples, so the slot about to be
            // overwritten is the one written D samples ago.
            let pos = (self.write_pos + i) % self.delay_samples;
            for (buf, samples) in self.buffers.iter_mut().zip(block.iter_mut()) {
                let delayed = buf[pos];
                buf[pos] = samples[i] + delayed * self.feedback;
                samples[i] = delayed;
            }
        }
        self.write_pos = (self.write_pos + frames) % self.delay_samples;
    }

    fn reset(&mut self) {
        self.clear();
    }
}
