pub mod lut;
pub mod renderer;
pub mod shaders;

pub use renderer::{FrameParams, OverlayGeometry, Renderer};
