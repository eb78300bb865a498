//! Offline renderer — runs the export stage graph over a whole buffer.

use std::sync::Arc;

use tracing::{debug, info};

use super::gate::{GLITCH_STEP, GateSchedule, GateSequence, GateSource};
use super::source::BufferPlayer;
use super::RENDER_QUANTUM;
use crate::buffer::SampleBuffer;
use crate::chain::ChainSnapshot;
use crate::error::{RadioFryError, Result};
use crate::graph::{RenderMode, StageGraph, StagePlan};

/// Floor applied to the playback rate before deriving the frame count.
pub const MIN_PLAYBACK_RATE: f64 = 0.0001;

/// Upper bound on rendered samples across all channels (1 GiB of `f32`).
pub const MAX_EXPORT_SAMPLES: usize = 1 << 28;

/// Number of output frames for a source played at `playback_rate`.
pub fn export_frame_count(source_frames: usize, playback_rate: f64) -> usize {
    (source_frames as f64 / playback_rate.max(MIN_PLAYBACK_RATE)).ceil() as usize
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Seed for the glitch schedule. A random seed is drawn when `None`.
    pub glitch_seed: Option<u64>,
}

/// Everything one export needs, captured at request time.
#[derive(Debug, Clone, Default)]
pub struct ExportRequest {
    pub source: Option<Arc<SampleBuffer>>,
    /// Render from the reversed source instead.
    pub reversed: bool,
    /// A recorded take; exported as-is when present.
    pub recorded: Option<Arc<SampleBuffer>>,
    pub chain: ChainSnapshot,
}

#[derive(Debug, Clone, Default)]
pub struct OfflineRenderer {
    options: RenderOptions,
}

impl OfflineRenderer {
    pub fn new(options: RenderOptions) -> Self {
        OfflineRenderer { options }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Render `request` to completion.
    pub fn render(&self, request: &ExportRequest) -> Result<Arc<SampleBuffer>> {
        if let Some(recorded) = &request.recorded {
            info!(frames = recorded.frame_count(), "exporting recorded buffer verbatim");
            return Ok(Arc::clone(recorded));
        }
        let source = request.source.as_ref().ok_or(RadioFryError::NoAudioAvailable)?;
        let source = if request.reversed {
            Arc::new(source.reversed())
        } else {
            Arc::clone(source)
        };

        let chain = &request.chain;
        let channels = source.channel_count();
        let sample_rate = source.sample_rate();
        let frames = export_frame_count(source.frame_count(), chain.playback_rate);
        frames
            .checked_mul(channels)
            .filter(|&n| n <= MAX_EXPORT_SAMPLES)
            .ok_or_else(|| RadioFryError::Render(format!("{frames} frames is too long to export")))?;

        let plan = StagePlan::build(chain, RenderMode::Offline);
        info!(
            frames,
            channels,
            sample_rate,
            reversed = request.reversed,
            stages = ?plan.stage_names(),
            "offline render started"
        );

        let gate = plan.has_glitch().then(|| {
            let seed = self.options.glitch_seed.unwrap_or_else(rand::random);
            let mut sequence = GateSequence::new(seed, GLITCH_STEP);
            let schedule = GateSchedule::generate(&mut sequence, frames as f64 / sample_rate as f64, sample_rate);
            debug!(seed, steps = schedule.len(), "glitch schedule drawn");
            GateSource::Scheduled(schedule)
        });

        let mut graph = StageGraph::materialize(plan, sample_rate, channels, gate);
        let mut player = BufferPlayer::new(source, chain.playback_rate);

        let mut output: Vec<Vec<f32>> = (0..channels).map(|_| Vec::with_capacity(frames)).collect();
        let mut block = vec![vec![0.0f32; RENDER_QUANTUM]; channels];
        let mut rendered = 0;
        while rendered < frames {
            player.fill(&mut block);
            graph.process(&mut block);
            let take = RENDER_QUANTUM.min(frames - rendered);
            for (out, samples) in output.iter_mut().zip(&block) {
                out.extend_from_slice(&samples[..take]);
            }
            rendered += take;
        }

        info!(frames, "offline render finished");
        Ok(Arc::new(SampleBuffer::new(output, sample_rate)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::EffectChain;

    fn seeded() -> OfflineRenderer {
        OfflineRenderer::new(RenderOptions { glitch_seed: Some(7) })
    }

    fn tone(frames: usize, channels: usize) -> Arc<SampleBuffer> {
        let samples: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        Arc::new(SampleBuffer::new(vec![samples; channels], 44100).unwrap())
    }

    fn request(source: Option<Arc<SampleBuffer>>, f: impl FnOnce(&mut EffectChain)) -> ExportRequest {
        let mut chain = EffectChain::default();
        f(&mut chain);
        ExportRequest { source, chain: chain.snapshot(), ..Default::default() }
    }

    #[test]
    fn frame_count_scales_with_rate() {
        assert_eq!(export_frame_count(1000, 2.0), 500);
        assert_eq!(export_frame_count(1000, 0.5), 2000);
        assert_eq!(export_frame_count(1000, 1.0), 1000);
        assert_eq!(export_frame_count(1001, 2.0), 501, "rounds up");
    }

    #[test]
    fn zero_or_negative_rate_stays_finite() {
        for rate in [0.0, -3.0, f64::NAN] {
            let frames = export_frame_count(1000, rate);
            assert!((10_000_000..=10_000_001).contains(&frames), "rate {rate} gave {frames}");
        }
        assert_eq!(export_frame_count(0, 0.0), 0);
    }

    #[test]
    fn near_zero_rate_is_rejected_before_allocating() {
        let req = request(Some(tone(200_000, 2)), |c| c.playback_rate = 0.0);
        let err = seeded().render(&req).unwrap_err();
        assert!(matches!(err, RadioFryError::Render(_)), "{err}");
    }

    #[test]
    fn one_hertz_source_renders_every_stage() {
        let source = Arc::new(SampleBuffer::new(vec![vec![0.5, -0.5, 0.25]], 1).unwrap());
        let ir = Arc::new(SampleBuffer::new(vec![vec![1.0, 0.5]], 44100).unwrap());
        let req = request(Some(source), |c| {
            c.distortion = true;
            c.echo = true;
            c.crush = true;
            c.glitch = true;
            c.reverb = true;
            c.impulse_response = Some(ir);
        });
        let out = seeded().render(&req).unwrap();
        assert_eq!(out.frame_count(), 3);
        assert!(out.channel(0).iter().all(|s| s.is_finite()));
    }

    #[test]
    fn output_matches_source_shape() {
        let req = request(Some(tone(1000, 2)), |c| c.playback_rate = 2.0);
        let out = seeded().render(&req).unwrap();
        assert_eq!(out.channel_count(), 2);
        assert_eq!(out.frame_count(), 500);
        assert_eq!(out.sample_rate(), 44100);
    }

    #[test]
    fn recorded_buffer_wins_over_every_toggle() {
        let recorded = tone(300, 1);
        let mut req = request(Some(tone(1000, 2)), |c| {
            c.distortion = true;
            c.echo = true;
            c.crush = true;
            c.glitch = true;
        });
        req.recorded = Some(Arc::clone(&recorded));
        let out = seeded().render(&req).unwrap();
        assert!(Arc::ptr_eq(&out, &recorded));
    }

    #[test]
    fn recording_alone_is_enough() {
        let recorded = tone(10, 1);
        let req = ExportRequest { recorded: Some(Arc::clone(&recorded)), ..Default::default() };
        assert!(Arc::ptr_eq(&seeded().render(&req).unwrap(), &recorded));
    }

    #[test]
    fn nothing_to_render_fails_up_front() {
        let err = seeded().render(&request(None, |_| {})).unwrap_err();
        assert!(matches!(err, RadioFryError::NoAudioAvailable));
    }

    #[test]
    fn glitch_render_is_reproducible_with_a_seed() {
        let req = request(Some(tone(4410, 1)), |c| c.glitch = true);
        let a = seeded().render(&req).unwrap();
        let b = seeded().render(&req).unwrap();
        assert_eq!(a.channels(), b.channels());
    }

    #[test]
    fn glitch_silences_some_steps() {
        // forty 30 ms steps
        let req = request(Some(tone(52920, 1)), |c| c.glitch = true);
        let out = seeded().render(&req).unwrap();
        let step = 1323;
        let silent_steps = out.channel(0).chunks(step).filter(|c| c.iter().all(|&s| s == 0.0)).count();
        assert!(silent_steps > 0, "expected at least one closed gate step");
        assert!(silent_steps < 40, "expected at least one open gate step");
    }

    #[test]
    fn reversed_request_renders_reversed_source() {
        let ramp: Vec<f32> = (0..256).map(|i| i as f32 / 256.0).collect();
        let source = Arc::new(SampleBuffer::new(vec![ramp], 44100).unwrap());
        let mut forward = request(Some(Arc::clone(&source)), |c| c.filter_frequency_hz = 1200.0);
        let fwd = seeded().render(&forward).unwrap();
        forward.reversed = true;
        let rev = seeded().render(&forward).unwrap();
        assert_eq!(fwd.frame_count(), rev.frame_count());
        assert_ne!(fwd.channels(), rev.channels());
    }

    #[test]
    fn silent_source_renders_silence() {
        let source = Arc::new(SampleBuffer::silent(1, 500, 8000).unwrap());
        let req = request(Some(source), |c| {
            c.distortion = true;
            c.echo = true;
        });
        let out = seeded().render(&req).unwrap();
        assert!(out.channel(0).iter().all(|&s| s.abs() < 1e-9));
    }
}
