//! wgpu host renderer for the waterglass scene.
//!
//! Draws lit and unlit scene meshes plus the water program, into either the
//! swapchain view of the current frame or an offscreen mirror target.
//!
//! # Invariants
//! - Rendering never mutates the scene.
//! - Matrices arrive in the OpenGL clip convention and are remapped to the
//!   wgpu depth range at upload, nowhere else.
//! - Each `render` call is submitted on its own, in call order.

mod camera;
mod gpu;
mod shaders;

pub use camera::FlyCamera;
pub use gpu::{HostError, OPENGL_TO_WGPU, TargetHandle, WgpuHost};
pub use shaders::SCENE_SHADER;
