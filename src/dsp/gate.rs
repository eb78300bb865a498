//! Glitch gate — a multiplicative on/off gate driven by a pseudo-random
//! sequence.
//!
//! Live monitoring flips the gate from a wall-clock timer thread, unrelated
//! to playback position. Offline export pre-schedules the gate on program
//! time. The two schedules are drawn independently and do not match.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::Processor;

/// Interval between gate draws.
pub const GLITCH_STEP: Duration = Duration::from_millis(30);

/// Seeded stream of open/closed draws at a fixed step interval.
#[derive(Debug, Clone)]
pub struct GateSequence {
    rng: StdRng,
    step: Duration,
}

impl GateSequence {
    pub fn new(seed: u64, step: Duration) -> Self {
        GateSequence { rng: StdRng::seed_from_u64(seed), step }
    }

    /// Sequence with a random seed and the standard 30 ms step.
    pub fn random() -> Self {
        Self::new(rand::random(), GLITCH_STEP)
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Draw the next state: `true` passes audio, `false` silences it.
    pub fn next_open(&mut self) -> bool {
        self.rng.gen_bool(0.5)
    }
}

impl Iterator for GateSequence {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        Some(self.next_open())
    }
}

/// Gate values laid out on program time, one per step from t = 0.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSchedule {
    step_frames: f64,
    values: Vec<bool>,
}

impl GateSchedule {
    /// Draw one value for every step start `t = k·step` with `t < duration`.
    pub fn generate(sequence: &mut GateSequence, duration: f64, sample_rate: u32) -> Self {
        let step = sequence.step().as_secs_f64();
        let steps = if step > 0.0 && duration > 0.0 {
            (duration / step - 1e-9).ceil() as usize
        } else {
            0
        };
        GateSchedule {
            step_frames: step * sample_rate as f64,
            values: sequence.by_ref().take(steps).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[bool] {
        &self.values
    }

    /// State at `frame`. Open before the first value; the last value holds
    /// past the end.
    pub fn is_open_at(&self, frame: usize) -> bool {
        if self.values.is_empty() || self.step_frames <= 0.0 {
            return true;
        }
        let k = ((frame as f64 + 1e-6) / self.step_frames).floor() as usize;
        self.values[k.min(self.values.len() - 1)]
    }
}

/// Background thread that redraws a shared gate flag every step.
///
/// Runs until stopped or dropped, whether or not audio is playing.
pub struct GlitchTimer {
    open: Arc<AtomicBool>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl GlitchTimer {
    pub fn start(mut sequence: GateSequence) -> Self {
        let open = Arc::new(AtomicBool::new(true));
        let (stop, stopped) = channel::bounded::<()>(1);
        let flag = Arc::clone(&open);
        let step = sequence.step();
        debug!(step_ms = step.as_millis() as u64, "glitch timer started");

        let handle = thread::spawn(move || {
            loop {
                match stopped.recv_timeout(step) {
                    Err(RecvTimeoutError::Timeout) => flag.store(sequence.next_open(), Ordering::Relaxed),
                    _ => break,
                }
            }
        });

        GlitchTimer { open, stop: Some(stop), handle: Some(handle) }
    }

    /// The flag the live gate stage reads.
    pub fn gate(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.open)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the thread and leave the gate open.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            debug!("glitch timer stopped");
        }
        self.open.store(true, Ordering::Relaxed);
    }
}

impl Drop for GlitchTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Where a gate stage reads its state from.
#[derive(Debug, Clone)]
pub enum GateSource {
    /// Offline: sample-accurate schedule on program time.
    Scheduled(GateSchedule),
    /// Live: flag published by a [`GlitchTimer`], read once per block.
    Shared(Arc<AtomicBool>),
}

/// Multiplies the signal by 1 (open) or 0 (closed).
#[derive(Debug, Clone)]
pub struct GlitchGate {
    source: GateSource,
    frame: usize,
}

impl GlitchGate {
    pub fn new(source: GateSource) -> Self {
        GlitchGate { source, frame: 0 }
    }
}

impl Processor for GlitchGate {
    fn process(&mut self, block: &mut [Vec<f32>]) {
        let frames = block.first().map_or(0, Vec::len);
        match &self.source {
            GateSource::Scheduled(schedule) => {
                for i in 0..frames {
                    if !schedule.is_open_at(self.frame + i) {
                        for samples in block.iter_mut() {
                            samples[i] = 0.0;
                        }
                    }
                }
            }
            GateSource::Shared(flag) => {
                if !flag.load(Ordering::Relaxed) {
                    for samples in block.iter_mut() {
                        samples.fill(0.0);
                    }
                }
            }
        }
        self.frame += frames;
    }

    fn reset(&mut self) {
        self.frame = 0;
    }
}
