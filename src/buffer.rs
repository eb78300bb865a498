//! Multi-channel float audio buffers.
//!
//! A [`SampleBuffer`] is immutable once built: every transform returns a new
//! buffer, so buffers can be shared between the live monitor and the offline
//! renderer without locking.

use crate::error::{RadioFryError, Result};

/// Decoded multi-channel PCM audio with its sample rate.
///
/// Invariant: at least one channel, every channel holds exactly
/// `frame_count()` samples, and the sample rate is non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl SampleBuffer {
    /// Build a buffer from planar channel data.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self> {
        if channels.is_empty() {
            return Err(RadioFryError::InvalidBuffer("at least one channel is required".into()));
        }
        if sample_rate == 0 {
            return Err(RadioFryError::InvalidBuffer("sample rate must be positive".into()));
        }
        let frames = channels[0].len();
        if let Some(c) = channels.iter().position(|ch| ch.len() != frames) {
            return Err(RadioFryError::InvalidBuffer(format!(
                "channel {c} has {} frames, expected {frames}",
                channels[c].len()
            )));
        }
        Ok(SampleBuffer { channels, sample_rate })
    }

    /// A buffer of `frames` zero samples per channel.
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> Result<Self> {
        Self::new(vec![vec![0.0; frames]; channel_count], sample_rate)
    }

    /// Build from interleaved f32 samples (`L R L R ...`).
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Result<Self> {
        if channel_count == 0 {
            return Err(RadioFryError::InvalidBuffer("at least one channel is required".into()));
        }
        if samples.len() % channel_count != 0 {
            return Err(RadioFryError::InvalidBuffer(format!(
                "{} interleaved samples do not divide into {channel_count} channels",
                samples.len()
            )));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::new(channels, sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count() == 0
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Samples of one channel. Panics if `channel` is out of range.
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Interleave all channels frame by frame.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frame_count() * self.channel_count());
        for i in 0..self.frame_count() {
            for ch in &self.channels {
                out.push(ch[i]);
            }
        }
        out
    }

    /// Read a sample at a fractional frame position with linear interpolation.
    ///
    /// Positions before the start or past the end read as silence.
    pub fn read_interpolated(&self, channel: usize, position: f64) -> f32 {
        let data = &self.channels[channel];
        if data.is_empty() || position < 0.0 {
            return 0.0;
        }

        let idx = position as usize;
        if idx >= data.len() - 1 {
            return if idx < data.len() { data[idx] } else { 0.0 };
        }

        let frac = (position - idx as f64) as f32;
        data[idx] * (1.0 - frac) + data[idx + 1] * frac
    }

    /// A sample-reversed copy: `out[c][i] == self[c][len - 1 - i]`.
    pub fn reversed(&self) -> SampleBuffer {
        let channels = self
            .channels
            .iter()
            .map(|ch| ch.iter().rev().copied().collect())
            .collect();
        SampleBuffer { channels, sample_rate: self.sample_rate }
    }

    /// Linearly resample to `sample_rate`. Returns a clone when the rate already matches.
    pub fn resampled(&self, sample_rate: u32) -> SampleBuffer {
        if sample_rate == self.sample_rate || sample_rate == 0 {
            return self.clone();
        }
        let ratio = self.sample_rate as f64 / sample_rate as f64;
        let frames = (self.frame_count() as f64 / ratio).ceil() as usize;
        let channels = (0..self.channel_count())
            .map(|c| (0..frames).map(|i| self.read_interpolated(c, i as f64 * ratio)).collect())
            .collect();
        SampleBuffer { channels, sample_rate }
    }

    /// Decode a WAV stream (integer or float PCM).
    #[cfg(feature = "wav-io")]
    pub fn from_wav_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = hound::WavReader::new(reader)?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<Vec<f32>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<f32>, _>>()?
            }
        };
        Self::from_interleaved(&samples, spec.channels as usize, spec.sample_rate)
    }
}

/// Reverse the loaded source, failing when nothing has been loaded yet.
pub fn reverse(buffer: Option<&SampleBuffer>) -> Result<SampleBuffer> {
    buffer.map(SampleBuffer::reversed).ok_or(RadioFryError::NoAudioLoaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: usize) -> SampleBuffer {
        let l = (0..frames).map(|i| i as f32 / frames.max(1) as f32).collect();
        let r = (0..frames).map(|i| -(i as f32) * 0.01).collect();
        SampleBuffer::new(vec![l, r], 44100).unwrap()
    }

    #[test]
    fn rejects_ragged_channels() {
        let err = SampleBuffer::new(vec![vec![0.0; 3], vec![0.0; 2]], 8000).unwrap_err();
        assert!(matches!(err, RadioFryError::InvalidBuffer(_)));
    }

    #[test]
    fn rejects_zero_channels_and_rate() {
        assert!(SampleBuffer::new(vec![], 8000).is_err());
        assert!(SampleBuffer::new(vec![vec![0.0]], 0).is_err());
    }

    #[test]
    fn interleaved_round_trip_preserves_layout() {
        let buf = SampleBuffer::from_interleaved(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 8000).unwrap();
        assert_eq!(buf.channel(0), &[0.1, 0.3, 0.5]);
        assert_eq!(buf.channel(1), &[0.2, 0.4, 0.6]);
        assert_eq!(buf.interleaved(), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
    }

    #[test]
    fn interleaved_length_must_divide() {
        assert!(SampleBuffer::from_interleaved(&[0.0; 5], 2, 8000).is_err());
    }

    #[test]
    fn reverse_mirrors_every_channel() {
        let buf = stereo(5);
        let rev = buf.reversed();
        assert_eq!(rev.frame_count(), 5);
        assert_eq!(rev.sample_rate(), buf.sample_rate());
        for c in 0..2 {
            for i in 0..5 {
                assert_eq!(rev.channel(c)[i], buf.channel(c)[4 - i]);
            }
        }
    }

    #[test]
    fn reverse_is_an_involution() {
        for channels in 1..=3 {
            for frames in [0, 1, 2, 7, 128] {
                let data = (0..channels)
                    .map(|c| (0..frames).map(|i| ((i * 7 + c) % 11) as f32 / 11.0 - 0.5).collect())
                    .collect();
                let buf = SampleBuffer::new(data, 22050).unwrap();
                assert_eq!(buf.reversed().reversed(), buf, "channels={channels} frames={frames}");
            }
        }
    }

    #[test]
    fn reverse_without_source_is_a_precondition_failure() {
        assert!(matches!(reverse(None), Err(RadioFryError::NoAudioLoaded)));
        let buf = stereo(4);
        assert_eq!(reverse(Some(&buf)).unwrap(), buf.reversed());
    }

    #[test]
    fn interpolation_reads_between_frames() {
        let buf = SampleBuffer::new(vec![vec![0.0, 1.0, 0.0]], 8000).unwrap();
        assert!((buf.read_interpolated(0, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(buf.read_interpolated(0, 1.0), 1.0);
        assert_eq!(buf.read_interpolated(0, 3.0), 0.0);
        assert_eq!(buf.read_interpolated(0, -1.0), 0.0);
    }

    #[test]
    fn resample_doubles_length() {
        let buf = SampleBuffer::new(vec![vec![0.0, 1.0, 0.0, -1.0]], 8000).unwrap();
        let up = buf.resampled(16000);
        assert_eq!(up.sample_rate(), 16000);
        assert_eq!(up.frame_count(), 8);
        assert!((up.channel(0)[1] - 0.5).abs() < 1e-6);
        assert_eq!(up.channel(0)[2], 1.0);
    }

    #[cfg(feature = "wav-io")]
    #[test]
    fn decodes_what_the_encoder_writes() {
        let buf = SampleBuffer::new(vec![vec![0.5, -1.0, 0.25], vec![0.0, 1.0, -0.5]], 22050).unwrap();
        let bytes = crate::wav::encode(&buf).unwrap();
        let decoded = SampleBuffer::from_wav_reader(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.sample_rate(), 22050);
        let expected: Vec<f32> = crate::wav::to_pcm_i16(&buf).iter().map(|&s| s as f32 / 32768.0).collect();
        assert_eq!(decoded.interleaved(), expected);
    }

    #[cfg(feature = "wav-io")]
    #[test]
    fn garbage_is_not_a_wav() {
        let err = SampleBuffer::from_wav_reader(std::io::Cursor::new(b"RIFF1234junk".to_vec())).unwrap_err();
        assert!(matches!(err, RadioFryError::Wav(_)));
    }
}
