//! Reflective water material built on the planar reflection core.
//!
//! [`Water`] pairs a [`ReflectionSurface`](waterglass_reflect::ReflectionSurface)
//! with a [`WaterMaterial`]. Each frame the host calls
//! [`Water::before_render`], then draws the water mesh with
//! [`WATER_SHADER`] using [`Water::uniforms`] and the mirror target.
//!
//! # Invariants
//! - The texture matrix and eye uniforms only change after a rendered
//!   mirror pass; skipped passes keep the previous frame's values.
//! - `shade_fragment` and `fs_water` compute the same color.

mod material;
mod normals;
mod options;
mod shaders;
mod shading;
mod water;

pub use material::{Fog, WaterMaterial, WaterUniforms};
pub use normals::NormalMap;
pub use options::{OptionsError, Side, WaterOptions};
pub use shaders::WATER_SHADER;
pub use shading::{
    FragmentInput, SolidTexture, TextureSampler, animated_noise, distortion, shade_fragment,
};
pub use water::{Water, WaterError, WaterSurfacePreset};
