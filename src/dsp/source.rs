//! Buffer player — reads a [`SampleBuffer`] at a variable playback rate.

use std::sync::Arc;

use crate::buffer::SampleBuffer;

/// Plays a shared buffer with linear-interpolation resampling.
///
/// A rate of 2.0 plays twice as fast (and an octave up); reads past the
/// end produce silence.
#[derive(Debug, Clone)]
pub struct BufferPlayer {
    buffer: Arc<SampleBuffer>,
    position: f64,
    playback_rate: f64,
}

impl BufferPlayer {
    pub fn new(buffer: Arc<SampleBuffer>, playback_rate: f64) -> Self {
        BufferPlayer {
            buffer,
            position: 0.0,
            playback_rate: playback_rate.max(0.0),
        }
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate.max(0.0);
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Current read position in seconds of source time.
    pub fn position(&self) -> f64 {
        self.position / self.buffer.sample_rate() as f64
    }

    pub fn seek(&mut self, seconds: f64) {
        self.position = (seconds.max(0.0) * self.buffer.sample_rate() as f64)
            .min(self.buffer.frame_count() as f64);
    }

    pub fn is_finished(&self) -> bool {
        self.position >= self.buffer.frame_count() as f64
    }

    /// Fill `block` (one Vec per output channel) with the next frames.
    ///
    /// Output channels beyond the source's channel count repeat the last
    /// source channel.
    pub fn fill(&mut self, block: &mut [Vec<f32>]) {
        let frames = block.first().map_or(0, Vec::len);
        let src_channels = self.buffer.channel_count();
        for i in 0..frames {
            let pos = self.position + i as f64 * self.playback_rate;
            for (c, samples) in block.iter_mut().enumerate() {
                samples[i] = self.buffer.read_interpolated(c.min(src_channels - 1), pos);
            }
        }
        self.position += frames as f64 * self.playback_rate;
    }
}
