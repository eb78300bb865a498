//! Session — owns the effect chain and the audio it applies to.
//!
//! A [`Session`] is the single place the chain is mutated. Every change
//! that alters the stage list rebuilds the attached [`LiveMonitor`]; exports
//! capture a [`ChainSnapshot`] at request time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::buffer::{self, SampleBuffer};
use crate::chain::{ChainSnapshot, Effect, EffectChain};
use crate::dsp::monitor::LiveMonitor;
use crate::dsp::renderer::{ExportRequest, OfflineRenderer, RenderOptions};
use crate::error::{RadioFryError, Result};
use crate::preset::{self, REVERB_OFF, ReverbPreset};
use crate::wav;

/// Comment stored in the `ICMT` chunk of every export.
pub const EXPORT_COMMENT: &str = "Generated with RADIOFRY // Iron Signal Works — https://ironsignalworks.com";

pub const EXPORT_FILE_PREFIX: &str = "radiofry_export_isw_";

/// `radiofry_export_isw_<UTC timestamp>.wav`, with `:` and `.` in the
/// timestamp replaced by `-`.
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("{EXPORT_FILE_PREFIX}{}.wav", at.format("%Y-%m-%dT%H-%M-%S-%3fZ"))
}

/// Fetches and decodes the impulse response named by a reverb preset.
pub trait ImpulseResponseLoader {
    fn load(&mut self, preset: &ReverbPreset) -> Result<SampleBuffer>;
}

/// Reads impulse responses from WAV files below a root directory.
#[cfg(feature = "wav-io")]
#[derive(Debug, Clone)]
pub struct WavDirLoader {
    root: std::path::PathBuf,
}

#[cfg(feature = "wav-io")]
impl WavDirLoader {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        WavDirLoader { root: root.into() }
    }
}

#[cfg(feature = "wav-io")]
impl ImpulseResponseLoader for WavDirLoader {
    fn load(&mut self, preset: &ReverbPreset) -> Result<SampleBuffer> {
        let path = self.root.join(preset.file);
        let file = std::fs::File::open(&path).map_err(|e| RadioFryError::ImpulseResponse {
            preset: preset.key.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;
        SampleBuffer::from_wav_reader(std::io::BufReader::new(file)).map_err(|e| RadioFryError::ImpulseResponse {
            preset: preset.key.to_string(),
            reason: format!("{}: {e}", path.display()),
        })
    }
}

#[derive(Default)]
pub struct Session {
    chain: EffectChain,
    source: Option<Arc<SampleBuffer>>,
    reversed_source: Option<Arc<SampleBuffer>>,
    recorded: Option<Arc<SampleBuffer>>,
    reversed: bool,
    render_options: RenderOptions,
    monitor: Option<LiveMonitor>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.render_options = options;
        self
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    /// Capture the current chain for a render or a rebuild.
    pub fn snapshot(&self) -> ChainSnapshot {
        self.chain.snapshot()
    }

    pub fn source(&self) -> Option<&Arc<SampleBuffer>> {
        self.source.as_ref()
    }

    pub fn recording(&self) -> Option<&Arc<SampleBuffer>> {
        self.recorded.as_ref()
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Attach a live monitor; it picks up the current source and chain.
    pub fn attach_monitor(&mut self, mut monitor: LiveMonitor) {
        if let Some(source) = self.monitored_source() {
            monitor.set_source(source);
        }
        monitor.rebuild(&self.chain.snapshot());
        self.monitor = Some(monitor);
    }

    pub fn detach_monitor(&mut self) -> Option<LiveMonitor> {
        self.monitor.take()
    }

    pub fn monitor(&self) -> Option<&LiveMonitor> {
        self.monitor.as_ref()
    }

    pub fn monitor_mut(&mut self) -> Option<&mut LiveMonitor> {
        self.monitor.as_mut()
    }

    /// Replace the source with a freshly decoded buffer. Any recording and
    /// the reversed state are dropped.
    pub fn load_source(&mut self, buffer: SampleBuffer) {
        info!(
            frames = buffer.frame_count(),
            channels = buffer.channel_count(),
            sample_rate = buffer.sample_rate(),
            "source loaded"
        );
        let buffer = Arc::new(buffer);
        self.source = Some(Arc::clone(&buffer));
        self.reversed_source = None;
        self.recorded = None;
        self.reversed = false;
        if let Some(monitor) = &mut self.monitor {
            monitor.set_source(buffer);
            monitor.rebuild(&self.chain.snapshot());
        }
    }

    /// Store a decoded recording. Exports return it verbatim until cleared.
    pub fn set_recording(&mut self, buffer: SampleBuffer) {
        info!(frames = buffer.frame_count(), "recording stored");
        self.recorded = Some(Arc::new(buffer));
    }

    pub fn clear_recording(&mut self) {
        self.recorded = None;
    }

    /// Flip one effect and return its new state.
    pub fn toggle_effect(&mut self, effect: Effect) -> bool {
        let on = self.chain.toggle(effect);
        debug!(effect = effect.name(), on, "effect toggled");
        self.rebuild();
        on
    }

    pub fn set_effect(&mut self, effect: Effect, on: bool) {
        self.chain.set_enabled(effect, on);
        debug!(effect = effect.name(), on, "effect set");
        self.rebuild();
    }

    pub fn set_filter_frequency(&mut self, hz: f64) {
        self.chain.filter_frequency_hz = hz;
        self.chain.sanitize();
        self.rebuild();
    }

    /// Speed/pitch only; the stage graph stays as it is.
    pub fn set_playback_rate(&mut self, rate: f64) {
        self.chain.playback_rate = rate;
        self.chain.sanitize();
        if let Some(monitor) = &mut self.monitor {
            monitor.set_playback_rate(self.chain.playback_rate);
        }
    }

    pub fn set_output_gain(&mut self, gain: f64) {
        self.chain.output_gain = gain;
        self.chain.sanitize();
        self.rebuild();
    }

    /// Apply a named tone preset (`CHARRED`, `BAKED`, `FRIED`).
    pub fn apply_preset(&mut self, name: &str) -> Result<()> {
        let preset = preset::tone_preset(name)?;
        preset.apply(&mut self.chain);
        self.chain.sanitize();
        info!(preset = preset.name, "tone preset applied");
        self.rebuild();
        Ok(())
    }

    /// Select a reverb preset by key, loading its impulse response.
    ///
    /// `off` disables reverb. Any failure leaves reverb off with no impulse
    /// response and is returned to the caller.
    pub fn select_reverb(&mut self, key: &str, loader: &mut dyn ImpulseResponseLoader) -> Result<()> {
        if key == REVERB_OFF {
            self.disable_reverb();
            self.rebuild();
            return Ok(());
        }

        let loaded = preset::reverb_preset(key)
            .ok_or_else(|| RadioFryError::UnknownPreset(key.to_string()))
            .and_then(|preset| loader.load(preset));

        match loaded {
            Ok(ir) => {
                info!(
                    preset = key,
                    frames = ir.frame_count(),
                    channels = ir.channel_count(),
                    "impulse response loaded"
                );
                self.chain.reverb = true;
                self.chain.reverb_preset = Some(key.to_string());
                self.chain.impulse_response = Some(Arc::new(ir));
                self.rebuild();
                Ok(())
            }
            Err(err) => {
                warn!(preset = key, error = %err, "impulse response unavailable; reverb turned off");
                self.disable_reverb();
                self.rebuild();
                Err(err)
            }
        }
    }

    fn disable_reverb(&mut self) {
        self.chain.reverb = false;
        self.chain.reverb_preset = None;
        self.chain.impulse_response = None;
    }

    /// Switch between the source and its reversed copy. Returns the new
    /// state. Playback keeps going if it was running.
    pub fn toggle_reverse(&mut self) -> Result<bool> {
        let reversed = self.reversed_source()?;
        self.reversed = !self.reversed;
        let next = if self.reversed {
            reversed
        } else {
            self.source.clone().ok_or(RadioFryError::NoAudioLoaded)?
        };
        if let Some(monitor) = &mut self.monitor {
            let was_playing = monitor.is_playing();
            monitor.set_source(next);
            if was_playing {
                monitor.play();
            }
        }
        info!(reversed = self.reversed, "reverse toggled");
        Ok(self.reversed)
    }

    /// The reversed source, built on first use and cached until the source
    /// changes.
    pub fn reversed_source(&mut self) -> Result<Arc<SampleBuffer>> {
        if let Some(reversed) = &self.reversed_source {
            return Ok(Arc::clone(reversed));
        }
        let reversed = Arc::new(buffer::reverse(self.source.as_deref())?);
        self.reversed_source = Some(Arc::clone(&reversed));
        Ok(reversed)
    }

    /// Plain WAV of the reversed source, for previewing in a media player.
    pub fn reversed_preview_wav(&mut self) -> Result<Vec<u8>> {
        let reversed = self.reversed_source()?;
        wav::encode(&reversed)
    }

    /// Everything an export needs, captured now.
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            source: self.source.clone(),
            reversed: self.reversed,
            recorded: self.recorded.clone(),
            chain: self.chain.snapshot(),
        }
    }

    /// Render the current configuration (or return the recording).
    pub fn export(&self) -> Result<Arc<SampleBuffer>> {
        if self.source.is_none() && self.recorded.is_none() {
            return Err(RadioFryError::NoAudioAvailable);
        }
        OfflineRenderer::new(self.render_options).render(&self.export_request())
    }

    /// Render and encode with the export comment.
    pub fn export_wav(&self) -> Result<Vec<u8>> {
        let rendered = self.export()?;
        wav::encode_with_comment(&rendered, EXPORT_COMMENT)
    }

    /// Back to defaults: every effect off, no reverb, no recording, not
    /// reversed. The loaded source stays.
    pub fn reset(&mut self) {
        self.chain = EffectChain::default();
        self.reversed = false;
        self.recorded = None;
        if let Some(monitor) = &mut self.monitor {
            if let Some(source) = &self.source {
                monitor.set_source(Arc::clone(source));
            }
            monitor.rebuild(&self.chain.snapshot());
        }
        info!("session reset");
    }

    fn monitored_source(&self) -> Option<Arc<SampleBuffer>> {
        if self.reversed {
            self.reversed_source.clone()
        } else {
            self.source.clone()
        }
    }

    fn rebuild(&mut self) {
        if let Some(monitor) = &mut self.monitor {
            monitor.rebuild(&self.chain.snapshot());
        }
    }
}
