pub mod buffer;
pub mod chain;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod preset;
pub mod session;
pub mod wav;

pub use crate::buffer::SampleBuffer;
pub use crate::chain::{ChainSnapshot, Effect, EffectChain};
pub use crate::dsp::monitor::LiveMonitor;
pub use crate::dsp::renderer::{ExportRequest, OfflineRenderer, RenderOptions};
pub use crate::error::{RadioFryError, Result};
pub use crate::graph::{RenderMode, StageGraph, StagePlan};
pub use crate::session::{ImpulseResponseLoader, Session};

use std::sync::Arc;

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

fn chain_from_js(chain: JsValue) -> std::result::Result<EffectChain, JsValue> {
    if chain.is_undefined() || chain.is_null() {
        return Ok(EffectChain::default());
    }
    let mut chain: EffectChain = serde_wasm_bindgen::from_value(chain).map_err(js_error)?;
    chain.sanitize();
    Ok(chain)
}

/// WASM-exposed: return the radiofry-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: the default effect chain as a JS object.
#[wasm_bindgen]
pub fn default_chain() -> std::result::Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&EffectChain::default()).map_err(js_error)
}

/// WASM-exposed: apply a named tone preset to a chain object and return the
/// updated chain.
#[wasm_bindgen]
pub fn apply_tone_preset(chain: JsValue, name: &str) -> std::result::Result<JsValue, JsValue> {
    let mut chain = chain_from_js(chain)?;
    preset::tone_preset(name).map_err(js_error)?.apply(&mut chain);
    serde_wasm_bindgen::to_value(&chain).map_err(js_error)
}

/// WASM-exposed: render interleaved samples through `chain` offline and
/// return the WAV file bytes, comment chunk included.
///
/// `chain` is a camelCase chain object (or `undefined` for defaults). The
/// reverb stage needs a decoded impulse response and is skipped here.
#[wasm_bindgen]
pub fn export_wav(
    samples: &[f32],
    channels: usize,
    sample_rate: u32,
    chain: JsValue,
    seed: Option<u64>,
) -> std::result::Result<Vec<u8>, JsValue> {
    let source = SampleBuffer::from_interleaved(samples, channels, sample_rate).map_err(js_error)?;
    let request = ExportRequest {
        source: Some(Arc::new(source)),
        chain: chain_from_js(chain)?.snapshot(),
        ..Default::default()
    };
    let rendered = OfflineRenderer::new(RenderOptions { glitch_seed: seed })
        .render(&request)
        .map_err(js_error)?;
    wav::encode_with_comment(&rendered, session::EXPORT_COMMENT).map_err(js_error)
}

/// WASM-exposed: reverse interleaved samples and return a plain WAV file.
#[wasm_bindgen]
pub fn reverse_wav(samples: &[f32], channels: usize, sample_rate: u32) -> std::result::Result<Vec<u8>, JsValue> {
    let source = SampleBuffer::from_interleaved(samples, channels, sample_rate).map_err(js_error)?;
    wav::encode(&source.reversed()).map_err(js_error)
}

/// WASM-exposed: keys of every reverb preset, `off` first.
#[wasm_bindgen]
pub fn reverb_preset_names() -> Vec<String> {
    std::iter::once(preset::REVERB_OFF)
        .chain(preset::REVERB_PRESETS.iter().map(|p| p.key))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn reverb_names_start_with_off() {
        let names = reverb_preset_names();
        assert_eq!(names[0], "off");
        assert_eq!(names.len(), 1 + preset::REVERB_PRESETS.len());
        assert!(names.iter().any(|n| n == "cathedral"));
    }

    #[test]
    fn reverse_wav_reverses_interleaved_frames() {
        let wav = reverse_wav(&[0.5, -0.5, 0.0, 1.0], 2, 8000).unwrap();
        let pcm: Vec<i16> = wav[44..].chunks(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
        assert_eq!(pcm, vec![0, 32767, 16383, -16384]);
    }
}
