//! Planar reflection core: renderer-agnostic mirror camera and mirror pass.
//!
//! # Invariants
//! - The mirror camera is a pure function of the viewer and the surface pose
//!   for the current frame. Nothing carries over between frames except the
//!   offscreen target's pixels.
//! - Matrices use the OpenGL clip convention (clip z in [-w, w]); backends
//!   with a [0, 1] depth range remap at upload time.
//! - Renderer target, feature flags and surface visibility are restored on
//!   every exit path of a mirror pass. The back-facing early exit never
//!   touches them.

mod mirror;
mod pass;
mod plane;
mod projection;
mod recording;
mod surface;

#[cfg(test)]
mod testing;

pub use mirror::{Derivation, MirrorCamera, ViewerState, derive_mirror_camera};
pub use pass::{
    HostRenderer, MirrorPass, OffscreenTargetDesc, RenderCamera, RendererFlags, SceneGraph,
    TargetFormat,
};
pub use plane::{MirrorPlane, SurfaceFrame, reflect};
pub use projection::{BIAS_SCALE, ObliqueClip, frustum_corner, oblique_projection, texture_matrix};
pub use recording::{DrawCall, RecordingError, RecordingRenderer, TargetId};
pub use surface::{MirrorFrame, PassOutcome, ReflectionError, ReflectionSurface, ReflectorConfig};

pub fn crate_info() -> &'static str {
    "waterglass-reflect v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("reflect"));
    }
}
