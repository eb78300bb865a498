//! Stage graph — which stages run, in what order, and how they connect.
//!
//! Building a graph is two steps. [`StagePlan::build`] is a pure function of
//! a chain snapshot and a render mode; it decides the ordered stage list and
//! can be inspected without any audio running. [`StageGraph::materialize`]
//! then turns a plan into live processors for a given rate and channel count.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer::SampleBuffer;
use crate::chain::ChainSnapshot;
use crate::dsp::convolver::Convolver;
use crate::dsp::delay::FeedbackDelay;
use crate::dsp::filter::{BiquadFilter, FilterType};
use crate::dsp::gate::{GateSource, GlitchGate};
use crate::dsp::mixer::{Gain, ReverbMix};
use crate::dsp::shaper::WaveShaper;
use crate::dsp::{Processor, RENDER_QUANTUM};

/// Soft-clip drive while monitoring.
pub const LIVE_DISTORTION_DRIVE: f64 = 75.0;
/// Soft-clip drive when exporting. Not the same as the live drive.
pub const EXPORT_DISTORTION_DRIVE: f64 = 76.0;

pub const BAND_PASS_Q: f64 = 1.0;
pub const DISTORTION_POST_FREQUENCY_HZ: f64 = 1000.0;
pub const DISTORTION_POST_Q: f64 = 1.5;
pub const DISTORTION_TRIM_GAIN: f64 = 0.4;
pub const ECHO_DELAY_SECONDS: f64 = 0.25;
pub const ECHO_FEEDBACK: f64 = 0.3;
pub const CRUSH_SHELF_FREQUENCY_HZ: f64 = 8000.0;
pub const CRUSH_GAIN_DB: f64 = -40.0;

/// Which context a graph is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Continuous monitoring output.
    Live,
    /// One-shot export render.
    Offline,
}

impl RenderMode {
    pub fn distortion_drive(self) -> f64 {
        match self {
            RenderMode::Live => LIVE_DISTORTION_DRIVE,
            RenderMode::Offline => EXPORT_DISTORTION_DRIVE,
        }
    }
}

/// One processing stage with its fixed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    BandPass { frequency: f64, q: f64 },
    Distortion { drive: f64 },
    DistortionPost { frequency: f64, q: f64 },
    DistortionTrim { gain: f64 },
    Echo { delay: f64, feedback: f64 },
    /// Always present; `gain_db` is 0 (a no-op) unless crush is on.
    Crush { frequency: f64, gain_db: f64 },
    Glitch,
    Reverb { wet_mix: f64, impulse_response: Arc<SampleBuffer> },
    Output { gain: f64 },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::BandPass { .. } => "band-pass",
            Stage::Distortion { .. } => "distortion",
            Stage::DistortionPost { .. } => "distortion-post",
            Stage::DistortionTrim { .. } => "distortion-trim",
            Stage::Echo { .. } => "echo",
            Stage::Crush { .. } => "crush",
            Stage::Glitch => "glitch",
            Stage::Reverb { .. } => "reverb",
            Stage::Output { .. } => "output",
        }
    }
}

/// Endpoints of a connection in the graph topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Source,
    BandPass,
    Shaper,
    PostFilter,
    DistortionTrim,
    Delay,
    Feedback,
    Shelf,
    Gate,
    Dry,
    Convolver,
    Wet,
    Output,
    Destination,
}

/// Ordered stage list for one chain snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    mode: RenderMode,
    stages: Vec<Stage>,
}

impl StagePlan {
    /// Decide the stage list. Stage order is fixed; toggles only include or
    /// leave out stages.
    pub fn build(chain: &ChainSnapshot, mode: RenderMode) -> Self {
        let mut stages = vec![Stage::BandPass {
            frequency: chain.filter_frequency_hz,
            q: BAND_PASS_Q,
        }];

        if chain.distortion {
            stages.push(Stage::Distortion { drive: mode.distortion_drive() });
            stages.push(Stage::DistortionPost {
                frequency: DISTORTION_POST_FREQUENCY_HZ,
                q: DISTORTION_POST_Q,
            });
            stages.push(Stage::DistortionTrim { gain: DISTORTION_TRIM_GAIN });
        }
        if chain.echo {
            stages.push(Stage::Echo {
                delay: ECHO_DELAY_SECONDS,
                feedback: ECHO_FEEDBACK,
            });
        }
        stages.push(Stage::Crush {
            frequency: CRUSH_SHELF_FREQUENCY_HZ,
            gain_db: if chain.crush { CRUSH_GAIN_DB } else { 0.0 },
        });
        if chain.glitch {
            stages.push(Stage::Glitch);
        }
        if chain.reverb {
            match &chain.impulse_response {
                Some(ir) => stages.push(Stage::Reverb {
                    wet_mix: chain.reverb_wet_mix.clamp(0.0, 1.0),
                    impulse_response: Arc::clone(ir),
                }),
                None => debug!("reverb enabled without an impulse response; running dry"),
            }
        }
        stages.push(Stage::Output { gain: chain.output_gain.max(0.0) });

        StagePlan { mode, stages }
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(Stage::name).collect()
    }

    pub fn has_glitch(&self) -> bool {
        self.stages.contains(&Stage::Glitch)
    }

    /// Every connection the plan wires, from source to destination.
    pub fn connections(&self) -> Vec<(Node, Node)> {
        fn chain_to(edges: &mut Vec<(Node, Node)>, heads: &mut Vec<Node>, node: Node) {
            edges.extend(heads.iter().map(|&h| (h, node)));
            *heads = vec![node];
        }

        let mut edges = Vec::new();
        let mut heads = vec![Node::Source];
        for stage in &self.stages {
            match stage {
                Stage::BandPass { .. } => chain_to(&mut edges, &mut heads, Node::BandPass),
                Stage::Distortion { .. } => chain_to(&mut edges, &mut heads, Node::Shaper),
                Stage::DistortionPost { .. } => chain_to(&mut edges, &mut heads, Node::PostFilter),
                Stage::DistortionTrim { .. } => chain_to(&mut edges, &mut heads, Node::DistortionTrim),
                Stage::Echo { .. } => {
                    chain_to(&mut edges, &mut heads, Node::Delay);
                    edges.push((Node::Delay, Node::Feedback));
                    edges.push((Node::Feedback, Node::Delay));
                }
                Stage::Crush { .. } => chain_to(&mut edges, &mut heads, Node::Shelf),
                Stage::Glitch => chain_to(&mut edges, &mut heads, Node::Gate),
                Stage::Reverb { .. } => {
                    edges.extend(heads.iter().map(|&h| (h, Node::Dry)));
                    edges.extend(heads.iter().map(|&h| (h, Node::Convolver)));
                    edges.push((Node::Convolver, Node::Wet));
                    heads = vec![Node::Dry, Node::Wet];
                }
                Stage::Output { .. } => chain_to(&mut edges, &mut heads, Node::Output),
            }
        }
        chain_to(&mut edges, &mut heads, Node::Destination);
        edges
    }
}

/// A plan wired into running processors.
pub struct StageGraph {
    plan: StagePlan,
    processors: Vec<Box<dyn Processor>>,
    sample_rate: u32,
    channels: usize,
}

impl StageGraph {
    /// Instantiate processors for every stage of `plan`.
    ///
    /// `gate` drives the glitch stage; a plan with a glitch stage but no gate
    /// source gets an always-open gate.
    pub fn materialize(plan: StagePlan, sample_rate: u32, channels: usize, gate: Option<GateSource>) -> Self {
        let sr = sample_rate as f64;
        let mut gate = gate;
        let processors = plan
            .stages
            .iter()
            .map(|stage| -> Box<dyn Processor> {
                match stage {
                    Stage::BandPass { frequency, q } | Stage::DistortionPost { frequency, q } => Box::new(
                        BiquadFilter::with_params(FilterType::Bandpass, sr, channels, *frequency, *q, 0.0),
                    ),
                    Stage::Distortion { drive } => Box::new(WaveShaper::soft_clip(*drive)),
                    Stage::DistortionTrim { gain } | Stage::Output { gain } => Box::new(Gain::new(*gain)),
                    Stage::Echo { delay, feedback } => Box::new(FeedbackDelay::new(sr, channels, *delay, *feedback)),
                    Stage::Crush { frequency, gain_db } => Box::new(BiquadFilter::with_params(
                        FilterType::Highshelf,
                        sr,
                        channels,
                        *frequency,
                        1.0,
                        *gain_db,
                    )),
                    Stage::Glitch => {
                        let source = gate.take().unwrap_or_else(|| {
                            warn!("glitch stage without a gate source; leaving it open");
                            GateSource::Shared(Arc::new(std::sync::atomic::AtomicBool::new(true)))
                        });
                        Box::new(GlitchGate::new(source))
                    }
                    Stage::Reverb { wet_mix, impulse_response } => Box::new(ReverbMix::new(
                        Convolver::new(impulse_response, sample_rate, channels, RENDER_QUANTUM),
                        *wet_mix,
                    )),
                }
            })
            .collect();

        StageGraph { plan, processors, sample_rate, channels }
    }

    pub fn plan(&self) -> &StagePlan {
        &self.plan
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Run one block through every stage in order.
    pub fn process(&mut self, block: &mut [Vec<f32>]) {
        for processor in self.processors.iter_mut() {
            processor.process(block);
        }
    }

    pub fn reset(&mut self) {
        for processor in self.processors.iter_mut() {
            processor.reset();
        }
    }
}
