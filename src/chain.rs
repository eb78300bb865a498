//! Effect chain configuration.
//!
//! [`EffectChain`] is the mutable, session-owned set of toggles and
//! continuous parameters. Renders never read it directly: they take a
//! [`ChainSnapshot`], an immutable copy captured at the moment of use.

use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffer::SampleBuffer;
use crate::error::Result;

pub const DEFAULT_FILTER_FREQUENCY_HZ: f64 = 1200.0;
pub const DEFAULT_REVERB_WET_MIX: f64 = 0.35;

/// A toggleable stage of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Distortion,
    Echo,
    Crush,
    Glitch,
    Reverb,
}

impl Effect {
    pub const ALL: [Effect; 5] = [
        Effect::Distortion,
        Effect::Echo,
        Effect::Crush,
        Effect::Glitch,
        Effect::Reverb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Effect::Distortion => "distortion",
            Effect::Echo => "echo",
            Effect::Crush => "crush",
            Effect::Glitch => "glitch",
            Effect::Reverb => "reverb",
        }
    }
}

/// Toggles and continuous parameters for the stage graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EffectChain {
    /// Center frequency of the always-on band-pass stage.
    pub filter_frequency_hz: f64,
    /// Monitoring speed and export length scale (1.0 = unchanged).
    pub playback_rate: f64,
    /// Final output gain (linear, >= 0).
    pub output_gain: f64,
    pub distortion: bool,
    pub echo: bool,
    pub crush: bool,
    pub glitch: bool,
    pub reverb: bool,
    /// Wet share of the reverb mix (0.0 = dry, 1.0 = wet).
    pub reverb_wet_mix: f64,
    /// Key of the selected reverb preset, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverb_preset: Option<String>,
    /// Decoded impulse response for the reverb stage. Never serialized.
    #[serde(skip)]
    pub impulse_response: Option<Arc<SampleBuffer>>,
}

impl Default for EffectChain {
    fn default() -> Self {
        Self {
            filter_frequency_hz: DEFAULT_FILTER_FREQUENCY_HZ,
            playback_rate: 1.0,
            output_gain: 1.0,
            distortion: false,
            echo: false,
            crush: false,
            glitch: false,
            reverb: false,
            reverb_wet_mix: DEFAULT_REVERB_WET_MIX,
            reverb_preset: None,
            impulse_response: None,
        }
    }
}

impl EffectChain {
    pub fn is_enabled(&self, effect: Effect) -> bool {
        match effect {
            Effect::Distortion => self.distortion,
            Effect::Echo => self.echo,
            Effect::Crush => self.crush,
            Effect::Glitch => self.glitch,
            Effect::Reverb => self.reverb,
        }
    }

    pub fn set_enabled(&mut self, effect: Effect, on: bool) {
        let flag = match effect {
            Effect::Distortion => &mut self.distortion,
            Effect::Echo => &mut self.echo,
            Effect::Crush => &mut self.crush,
            Effect::Glitch => &mut self.glitch,
            Effect::Reverb => &mut self.reverb,
        };
        *flag = on;
    }

    /// Flip a toggle and return its new state.
    pub fn toggle(&mut self, effect: Effect) -> bool {
        let on = !self.is_enabled(effect);
        self.set_enabled(effect, on);
        on
    }

    /// Reverb is audible only when toggled on *and* an impulse response is loaded.
    pub fn reverb_active(&self) -> bool {
        self.reverb && self.impulse_response.is_some()
    }

    /// Clamp continuous parameters into their valid ranges.
    pub fn sanitize(&mut self) {
        self.output_gain = self.output_gain.max(0.0);
        self.reverb_wet_mix = self.reverb_wet_mix.clamp(0.0, 1.0);
        if !self.filter_frequency_hz.is_finite() {
            self.filter_frequency_hz = DEFAULT_FILTER_FREQUENCY_HZ;
        }
    }

    /// Capture an immutable copy for a render or a graph rebuild.
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot(Arc::new(self.clone()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut chain: EffectChain = serde_json::from_str(json)?;
        chain.sanitize();
        Ok(chain)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Immutable view of an [`EffectChain`] at one point in time.
///
/// Cloning is cheap; the chain behind it never changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSnapshot(Arc<EffectChain>);

impl Deref for ChainSnapshot {
    type Target = EffectChain;

    fn deref(&self) -> &EffectChain {
        &self.0
    }
}

impl From<EffectChain> for ChainSnapshot {
    fn from(chain: EffectChain) -> Self {
        ChainSnapshot(Arc::new(chain))
    }
}

impl Default for ChainSnapshot {
    fn default() -> Self {
        EffectChain::default().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_session() {
        let chain = EffectChain::default();
        assert_eq!(chain.filter_frequency_hz, 1200.0);
        assert_eq!(chain.playback_rate, 1.0);
        assert_eq!(chain.output_gain, 1.0);
        assert_eq!(chain.reverb_wet_mix, 0.35);
        assert!(Effect::ALL.iter().all(|&e| !chain.is_enabled(e)));
    }

    #[test]
    fn toggle_flips_one_flag() {
        let mut chain = EffectChain::default();
        assert!(chain.toggle(Effect::Echo));
        assert!(chain.echo);
        assert!(!chain.distortion);
        assert!(!chain.toggle(Effect::Echo));
        assert!(!chain.echo);
    }

    #[test]
    fn reverb_without_impulse_response_is_inactive() {
        let mut chain = EffectChain::default();
        chain.reverb = true;
        assert!(!chain.reverb_active());
        chain.impulse_response = Some(Arc::new(SampleBuffer::new(vec![vec![1.0]], 44100).unwrap()));
        assert!(chain.reverb_active());
    }

    #[test]
    fn snapshot_is_isolated_from_later_edits() {
        let mut chain = EffectChain::default();
        let snap = chain.snapshot();
        chain.distortion = true;
        chain.filter_frequency_hz = 300.0;
        assert!(!snap.distortion);
        assert_eq!(snap.filter_frequency_hz, 1200.0);
    }

    #[test]
    fn json_uses_camel_case_and_fills_defaults() {
        let chain = EffectChain::from_json(r#"{"filterFrequencyHz": 900, "crush": true, "outputGain": -2}"#)
            .unwrap();
        assert_eq!(chain.filter_frequency_hz, 900.0);
        assert!(chain.crush);
        assert_eq!(chain.output_gain, 0.0, "negative gain is clamped");
        assert_eq!(chain.playback_rate, 1.0);

        let json = chain.to_json().unwrap();
        assert!(json.contains("\"reverbWetMix\":0.35"));
        assert!(!json.contains("impulse"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = EffectChain::from_json("{\"echo\": 3}").unwrap_err();
        assert!(matches!(err, crate::error::RadioFryError::Config(_)));
    }
}
