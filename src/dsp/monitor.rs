//! Live monitor — the continuously running stage graph behind audio output.
//!
//! The host audio callback pulls interleaved frames with [`LiveMonitor::render`]
//! (or pushes microphone input through [`LiveMonitor::process_external`]).
//! Internally the graph always runs whole quanta; fixed-size FIFOs bridge
//! host buffer sizes that are not a multiple of [`RENDER_QUANTUM`].

use std::sync::Arc;

use ringbuf::HeapRb;
use ringbuf::traits::{Consumer, Observer, Producer};
use tracing::{debug, info};

use super::gate::{GLITCH_STEP, GateSequence, GateSource, GlitchTimer};
use super::source::BufferPlayer;
use super::RENDER_QUANTUM;
use crate::buffer::SampleBuffer;
use crate::chain::ChainSnapshot;
use crate::graph::{Node, RenderMode, StageGraph, StagePlan};

/// FIFO capacity in quanta. Older processed frames are dropped past this.
const FIFO_QUANTA: usize = 4;

pub struct LiveMonitor {
    sample_rate: u32,
    channels: usize,
    graph: StageGraph,
    player: Option<BufferPlayer>,
    playing: bool,
    playback_rate: f64,
    glitch: Option<GlitchTimer>,
    glitch_seed: Option<u64>,
    block: Vec<Vec<f32>>,
    /// One interleaved quantum, reused between the FIFOs and `block`.
    frame_scratch: Vec<f32>,
    pending: HeapRb<f32>,
    input: HeapRb<f32>,
}

impl LiveMonitor {
    /// A monitor with the default chain and no source.
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        let channels = channels.max(1);
        let plan = StagePlan::build(&ChainSnapshot::default(), RenderMode::Live);
        let quantum = RENDER_QUANTUM * channels;
        LiveMonitor {
            sample_rate,
            channels,
            graph: StageGraph::materialize(plan, sample_rate, channels, None),
            player: None,
            playing: false,
            playback_rate: 1.0,
            glitch: None,
            glitch_seed: None,
            block: vec![vec![0.0; RENDER_QUANTUM]; channels],
            frame_scratch: vec![0.0; quantum],
            pending: HeapRb::new(quantum * FIFO_QUANTA),
            input: HeapRb::new(quantum * FIFO_QUANTA),
        }
    }

    /// Draw the live glitch gate from a fixed seed instead of a random one.
    pub fn with_glitch_seed(mut self, seed: u64) -> Self {
        self.glitch_seed = Some(seed);
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Tear down the graph and wire a fresh one for `chain`.
    ///
    /// Delay lines, filter memory and buffered output are discarded. The
    /// glitch timer keeps running across rebuilds while glitch stays on.
    pub fn rebuild(&mut self, chain: &ChainSnapshot) {
        let plan = StagePlan::build(chain, RenderMode::Live);

        let gate = if plan.has_glitch() {
            let seed = self.glitch_seed;
            let timer = self.glitch.get_or_insert_with(|| {
                let sequence = match seed {
                    Some(seed) => GateSequence::new(seed, GLITCH_STEP),
                    None => GateSequence::random(),
                };
                GlitchTimer::start(sequence)
            });
            Some(GateSource::Shared(timer.gate()))
        } else {
            // dropping the timer joins its thread
            self.glitch = None;
            None
        };

        debug!(stages = ?plan.stage_names(), "live graph rebuilt");
        self.graph = StageGraph::materialize(plan, self.sample_rate, self.channels, gate);
        self.pending.clear();
        self.input.clear();
        self.set_playback_rate(chain.playback_rate);
    }

    /// Connections of the graph currently running.
    pub fn connections(&self) -> Vec<(Node, Node)> {
        self.graph.plan().connections()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.graph.plan().stage_names()
    }

    pub fn glitch_running(&self) -> bool {
        self.glitch.as_ref().is_some_and(GlitchTimer::is_running)
    }

    /// Replace the source. Playback stops and rewinds.
    pub fn set_source(&mut self, buffer: Arc<SampleBuffer>) {
        info!(
            frames = buffer.frame_count(),
            channels = buffer.channel_count(),
            "monitor source replaced"
        );
        self.player = Some(BufferPlayer::new(buffer, 0.0));
        self.playing = false;
        self.set_playback_rate(self.playback_rate);
    }

    pub fn clear_source(&mut self) {
        self.player = None;
        self.playing = false;
    }

    pub fn has_source(&self) -> bool {
        self.player.is_some()
    }

    pub fn play(&mut self) {
        if let Some(player) = &mut self.player {
            if player.is_finished() {
                player.seek(0.0);
            }
            self.playing = true;
        }
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Playback position in seconds of source time.
    pub fn position(&self) -> f64 {
        self.player.as_ref().map_or(0.0, BufferPlayer::position)
    }

    pub fn seek(&mut self, seconds: f64) {
        if let Some(player) = &mut self.player {
            player.seek(seconds);
        }
    }

    pub fn playback_rate(&self) -> f64 {
        self.playback_rate
    }

    /// Change speed and pitch. Takes effect on the next quantum, no rebuild.
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.playback_rate = rate.max(0.0);
        let output_rate = self.sample_rate as f64;
        if let Some(player) = &mut self.player {
            // a source at another sample rate plays at its own speed
            let ratio = player.buffer().sample_rate() as f64 / output_rate;
            player.set_playback_rate(self.playback_rate * ratio);
        }
    }

    /// Fill an interleaved host buffer. While paused the source contributes
    /// silence, so effect tails still decay.
    pub fn render(&mut self, out: &mut [f32]) {
        let mut filled = 0;
        while filled < out.len() {
            if self.pending.is_empty() {
                self.render_quantum();
            }
            filled += self.pending.pop_slice(&mut out[filled..]);
        }
    }

    fn render_quantum(&mut self) {
        match (&mut self.player, self.playing) {
            (Some(player), true) => {
                player.fill(&mut self.block);
                if player.is_finished() {
                    debug!("monitor source finished");
                    self.playing = false;
                }
            }
            _ => self.block.iter_mut().for_each(|samples| samples.fill(0.0)),
        }
        self.graph.process(&mut self.block);
        self.push_block();
    }

    /// Run interleaved external input (e.g. a microphone) through the graph.
    ///
    /// Output lags input by up to one quantum; frames not yet processed come
    /// out as silence. When the host reads less than it writes, the oldest
    /// processed frames are dropped so the backlog stays bounded.
    pub fn process_external(&mut self, input: &[f32], out: &mut [f32]) {
        let mut consumed = 0;
        while consumed < input.len() {
            consumed += self.input.push_slice(&input[consumed..]);
            while self.input.occupied_len() >= self.frame_scratch.len() {
                self.input.pop_slice(&mut self.frame_scratch);
                for (i, frame) in self.frame_scratch.chunks_exact(self.channels).enumerate() {
                    for (samples, &s) in self.block.iter_mut().zip(frame) {
                        samples[i] = s;
                    }
                }
                self.graph.process(&mut self.block);
                self.push_block();
            }
        }

        let ready = self.pending.occupied_len().min(out.len());
        let (silent, live) = out.split_at_mut(out.len() - ready);
        silent.fill(0.0);
        self.pending.pop_slice(live);
    }

    /// Frames processed but not yet handed to the host, per channel.
    pub fn buffered_frames(&self) -> usize {
        self.pending.occupied_len() / self.channels
    }

    fn push_block(&mut self) {
        let quantum = self.frame_scratch.len();
        let overflow = quantum.saturating_sub(self.pending.vacant_len());
        if overflow > 0 {
            debug!(dropped = overflow / self.channels, "monitor output backlog full");
            self.pending.skip(overflow);
        }
        for (i, frame) in self.frame_scratch.chunks_exact_mut(self.channels).enumerate() {
            for (dst, samples) in frame.iter_mut().zip(&self.block) {
                *dst = samples[i];
            }
        }
        self.pending.push_slice(&self.frame_scratch);
    }
}
