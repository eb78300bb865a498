//! DSP primitives for the effect chain.
//!
//! Every stage processes planar blocks (one `Vec<f32>` per channel) of at
//! most [`RENDER_QUANTUM`] frames. The same processors power both the live
//! monitor and the offline export renderer.

pub mod convolver;
pub mod delay;
pub mod filter;
pub mod gate;
pub mod mixer;
pub mod monitor;
pub mod renderer;
pub mod shaper;
pub mod source;

/// Frames per processing block.
pub const RENDER_QUANTUM: usize = 128;

/// A block-processing stage.
///
/// `process` must not allocate on the hot path once warmed up. All channel
/// vectors in `block` have the same length.
pub trait Processor: Send {
    fn process(&mut self, block: &mut [Vec<f32>]);

    /// Drop any internal state (delay lines, filter memory).
    fn reset(&mut self) {}
}
