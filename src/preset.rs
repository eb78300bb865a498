//! Named presets: tone presets that set toggles and sliders, and the table
//! of reverb impulse responses an external fetcher can retrieve.

use crate::chain::EffectChain;
use crate::error::{RadioFryError, Result};

/// Reverb selector value meaning "no reverb".
pub const REVERB_OFF: &str = "off";

/// A one-click tone: four toggles and three continuous parameters.
///
/// Reverb and its impulse response are left alone when applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TonePreset {
    pub name: &'static str,
    pub distortion: bool,
    pub echo: bool,
    pub crush: bool,
    pub glitch: bool,
    pub filter_frequency_hz: f64,
    pub playback_rate: f64,
    pub output_gain: f64,
}

impl TonePreset {
    pub fn apply(&self, chain: &mut EffectChain) {
        chain.distortion = self.distortion;
        chain.echo = self.echo;
        chain.crush = self.crush;
        chain.glitch = self.glitch;
        chain.filter_frequency_hz = self.filter_frequency_hz;
        chain.playback_rate = self.playback_rate;
        chain.output_gain = self.output_gain;
    }
}

pub const TONE_PRESETS: [TonePreset; 3] = [
    TonePreset {
        name: "CHARRED",
        distortion: true,
        echo: false,
        crush: true,
        glitch: false,
        filter_frequency_hz: 900.0,
        playback_rate: 0.95,
        output_gain: 1.0,
    },
    TonePreset {
        name: "BAKED",
        distortion: true,
        echo: true,
        crush: false,
        glitch: false,
        filter_frequency_hz: 1400.0,
        playback_rate: 1.05,
        output_gain: 1.0,
    },
    TonePreset {
        name: "FRIED",
        distortion: false,
        echo: true,
        crush: true,
        glitch: true,
        filter_frequency_hz: 1100.0,
        playback_rate: 1.0,
        output_gain: 1.0,
    },
];

/// Look up a tone preset by name, ignoring case.
pub fn tone_preset(name: &str) -> Result<&'static TonePreset> {
    TONE_PRESETS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| RadioFryError::UnknownPreset(name.to_string()))
}

/// A reverb preset key and the impulse-response file it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReverbPreset {
    pub key: &'static str,
    pub file: &'static str,
}

macro_rules! reverb_presets {
    ($($key:literal => $file:literal),* $(,)?) => {
        &[$(ReverbPreset { key: $key, file: concat!("reverbs/", $file) }),*]
    };
}

pub const REVERB_PRESETS: &[ReverbPreset] = reverb_presets! {
    "small-room" => "small-room.wav",
    "batcave" => "Batcave.wav",
    "battery-benson" => "BatteryBenson.wav",
    "battery-brannan" => "BatteryBrannan.wav",
    "battery-powell" => "BatteryPowell.wav",
    "battery-quarles" => "BatteryQuarles.wav",
    "battery-randol" => "BatteryRandol.wav",
    "battery-tolles" => "BatteryTolles.wav",
    "cathedral" => "CathedralRoom.wav",
    "discovery" => "DiscoveryRoom.wav",
    "drainage" => "DrainageTunnel.wav",
    "fort-pillbox" => "FortWordenPillbox.wav",
    "fort-tunnel" => "FortWordenTunnel.wav",
    "harbor-entrance" => "HarborEntranceControlPost.wav",
    "lake-merritt" => "LakeMerrittBART.wav",
    "lawrence-welk" => "LawrenceWelkCave.wav",
    "nancy-lake" => "NancyLakeTunnel.wav",
    "portage-creek" => "PortageCreekTunnel.wav",
    "port-townsend" => "PortTownsendSkatepark.wav",
    "qasgiq" => "Qasgiq.wav",
    "salton-sea" => "SaltonSeaDrainagePipe.wav",
    "square-victoria" => "SquareVictoriaDome.wav",
    "tijuana" => "TijuanaAqueductTunnel.wav",
    "tony-knowles" => "TonyKnowlesCoastalTrailTunnel.wav",
    "tunnel-heaven" => "TunnelToHeaven.wav",
    "tunnel-hell" => "TunnelToHell.wav",
};

pub fn reverb_preset(key: &str) -> Option<&'static ReverbPreset> {
    REVERB_PRESETS.iter().find(|p| p.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_lookup_ignores_case() {
        assert_eq!(tone_preset("fried").unwrap().name, "FRIED");
        assert!(matches!(tone_preset("raw"), Err(RadioFryError::UnknownPreset(_))));
    }

    #[test]
    fn applying_a_tone_leaves_reverb_alone() {
        let mut chain = EffectChain::default();
        chain.reverb = true;
        chain.reverb_preset = Some("cathedral".into());
        tone_preset("CHARRED").unwrap().apply(&mut chain);
        assert!(chain.distortion && chain.crush && !chain.echo && !chain.glitch);
        assert_eq!(chain.filter_frequency_hz, 900.0);
        assert_eq!(chain.playback_rate, 0.95);
        assert!(chain.reverb);
        assert_eq!(chain.reverb_preset.as_deref(), Some("cathedral"));
    }

    #[test]
    fn reverb_table_is_complete_and_unique() {
        assert_eq!(REVERB_PRESETS.len(), 26);
        for (i, a) in REVERB_PRESETS.iter().enumerate() {
            assert!(a.file.starts_with("reverbs/") && a.file.ends_with(".wav"));
            assert!(REVERB_PRESETS[i + 1..].iter().all(|b| b.key != a.key), "duplicate key {}", a.key);
        }
        assert_eq!(reverb_preset("cathedral").unwrap().file, "reverbs/CathedralRoom.wav");
        assert!(reverb_preset(REVERB_OFF).is_none());
    }
}
