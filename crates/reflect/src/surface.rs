use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use waterglass_common::NodeId;

use crate::mirror::{Derivation, MirrorCamera, ViewerState, derive_mirror_camera};
use crate::pass::{HostRenderer, MirrorPass, OffscreenTargetDesc, RenderCamera, SceneGraph, TargetFormat};
use crate::plane::SurfaceFrame;

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError<E: std::error::Error + 'static> {
    #[error("offscreen target must be at least 1x1, got {width}x{height}")]
    TargetSize { width: u32, height: u32 },
    #[error("failed to create offscreen target: {0}")]
    CreateTarget(#[source] E),
    #[error("mirror pass render failed: {0}")]
    Render(#[source] E),
}

/// Construction-time settings of a reflective surface.
///
/// The target size is fixed for the surface's lifetime; it does not follow
/// the viewport or device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReflectorConfig {
    pub texture_width: u32,
    pub texture_height: u32,
    /// Pulled off the oblique near plane to avoid z-fighting at the surface.
    pub clip_bias: f32,
    pub format: TargetFormat,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            texture_width: 512,
            texture_height: 512,
            clip_bias: 0.0,
            format: TargetFormat::Rgba16Float,
        }
    }
}

/// What a call to [`ReflectionSurface::before_render`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The mirror pass ran and the target holds this frame's reflection.
    Rendered,
    /// Viewer behind the surface; target keeps the previous frame.
    BackFacing,
    /// The surface node is hidden or missing from the scene.
    Hidden,
    /// Collapsed surface transform or unusable clip plane; nothing drawn.
    Degenerate,
}

/// Per-frame outputs the water shader consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorFrame {
    pub camera: MirrorCamera,
    pub texture_matrix: Mat4,
    /// Viewer world position for view-dependent distortion falloff.
    pub eye: Vec3,
}

/// A scene node that reflects the scene into an offscreen target it owns.
#[derive(Debug)]
pub struct ReflectionSurface<T> {
    node: NodeId,
    config: ReflectorConfig,
    target: T,
    last_frame: Option<MirrorFrame>,
    passes: u64,
}

impl<T: Clone + PartialEq + std::fmt::Debug> ReflectionSurface<T> {
    /// Allocate the offscreen target for the surface drawn by `node`.
    pub fn new<R>(
        renderer: &mut R,
        node: NodeId,
        config: ReflectorConfig,
    ) -> Result<Self, ReflectionError<R::Error>>
    where
        R: HostRenderer<Target = T>,
    {
        if config.texture_width == 0 || config.texture_height == 0 {
            return Err(ReflectionError::TargetSize {
                width: config.texture_width,
                height: config.texture_height,
            });
        }
        let target = renderer
            .create_target(&OffscreenTargetDesc {
                label: "mirror_target",
                width: config.texture_width,
                height: config.texture_height,
                format: config.format,
            })
            .map_err(ReflectionError::CreateTarget)?;

        tracing::info!(
            node = %node.short(),
            width = config.texture_width,
            height = config.texture_height,
            format = ?config.format,
            "reflection surface created"
        );

        Ok(Self {
            node,
            config,
            target,
            last_frame: None,
            passes: 0,
        })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &ReflectorConfig {
        &self.config
    }

    /// Handle to the texture the shader samples.
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Outputs of the most recent rendered pass.
    pub fn last_frame(&self) -> Option<&MirrorFrame> {
        self.last_frame.as_ref()
    }

    /// Number of mirror passes rendered so far.
    pub fn pass_count(&self) -> u64 {
        self.passes
    }

    pub fn set_clip_bias(&mut self, clip_bias: f32) {
        self.config.clip_bias = clip_bias;
    }

    /// Render the scene from the mirror's point of view into the target.
    ///
    /// Call once per frame, before the main pass that draws this surface.
    pub fn before_render<R>(
        &mut self,
        renderer: &mut R,
        scene: &mut R::Scene,
        viewer: &ViewerState,
    ) -> Result<PassOutcome, ReflectionError<R::Error>>
    where
        R: HostRenderer<Target = T>,
    {
        if !scene.is_rendered(self.node) {
            return Ok(PassOutcome::Hidden);
        }
        let Some(world) = scene.world_matrix(self.node) else {
            return Ok(PassOutcome::Hidden);
        };
        let Some(frame) = SurfaceFrame::from_world_matrix(&world) else {
            tracing::warn!(node = %self.node.short(), "surface transform is degenerate");
            return Ok(PassOutcome::Degenerate);
        };

        let camera = match derive_mirror_camera(viewer, &frame, self.config.clip_bias) {
            Derivation::Visible(camera) => camera,
            Derivation::BackFacing => {
                tracing::trace!(node = %self.node.short(), "mirror faces away, pass skipped");
                return Ok(PassOutcome::BackFacing);
            }
            Derivation::Degenerate => {
                tracing::warn!(node = %self.node.short(), "mirror camera is degenerate");
                return Ok(PassOutcome::Degenerate);
            }
        };

        let mirror_frame = MirrorFrame {
            camera,
            texture_matrix: camera.texture_matrix(),
            eye: viewer.position(),
        };

        let _span = tracing::debug_span!("mirror_pass", node = %self.node.short()).entered();
        {
            let mut pass = MirrorPass::begin(
                renderer,
                scene,
                self.node,
                self.target.clone(),
                viewer.viewport,
            );
            pass.render(&RenderCamera::from(&camera))
                .map_err(ReflectionError::Render)?;
        }

        self.passes += 1;
        self.last_frame = Some(mirror_frame);
        tracing::debug!(
            pass = self.passes,
            mirror = ?camera.position,
            "mirror pass rendered"
        );
        Ok(PassOutcome::Rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::RendererFlags;
    use crate::recording::{RecordingError, RecordingRenderer, TargetId};
    use crate::testing::TestScene;
    use glam::{Quat, Vec4, Vec4Swizzles};

    type Renderer = RecordingRenderer<TestScene>;

    fn water_world() -> Mat4 {
        // Local +Z turned to world +Y: a horizontal surface at y = 0.
        Mat4::from_quat(Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2))
    }

    fn viewer(eye: Vec3) -> ViewerState {
        ViewerState::perspective(eye, Vec3::ZERO, 32_f32.to_radians(), 1.0, 1.0, 10_000.0)
    }

    fn setup(config: ReflectorConfig) -> (Renderer, TestScene, ReflectionSurface<TargetId>) {
        let mut scene = TestScene::new();
        let node = scene.add_surface(water_world());
        scene.add_surface(Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)));
        let mut renderer = Renderer::new();
        let surface = ReflectionSurface::new(&mut renderer, node, config).unwrap();
        (renderer, scene, surface)
    }

    #[test]
    fn default_config_matches_documented_defaults() {
        let c = ReflectorConfig::default();
        assert_eq!((c.texture_width, c.texture_height), (512, 512));
        assert_eq!(c.clip_bias, 0.0);
        assert_eq!(c.format, TargetFormat::Rgba16Float);
    }

    #[test]
    fn zero_sized_target_is_rejected() {
        let mut renderer = Renderer::new();
        let err = ReflectionSurface::new(
            &mut renderer,
            NodeId::new(),
            ReflectorConfig {
                texture_width: 0,
                ..ReflectorConfig::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, ReflectionError::TargetSize { width: 0, height: 512 }));
    }

    #[test]
    fn end_to_end_water_plane() {
        let (mut renderer, mut scene, mut surface) = setup(ReflectorConfig {
            texture_width: 256,
            texture_height: 256,
            ..ReflectorConfig::default()
        });
        let v = viewer(Vec3::new(0.0, 10.0, 10.0));

        let outcome = surface.before_render(&mut renderer, &mut scene, &v).unwrap();
        assert_eq!(outcome, PassOutcome::Rendered);

        let desc = renderer.target_desc(*surface.target()).unwrap();
        assert_eq!((desc.width, desc.height), (256, 256));

        let frame = surface.last_frame().unwrap();
        assert_eq!(frame.camera.far, v.far);
        assert_eq!(frame.eye, v.position());

        let uv = frame.texture_matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let uv = uv.xy() / uv.w;
        assert!((uv - glam::Vec2::splat(0.5)).abs().max_element() < 1e-5);

        let draw = &renderer.draws()[0];
        assert_eq!(draw.target, Some(*surface.target()));
        assert!(!draw.visible.contains(&surface.node()));
        assert_eq!(draw.camera.far, v.far);
        assert!(scene.is_visible(surface.node()));
        assert_eq!(renderer.render_target(), None);
    }

    #[test]
    fn back_facing_viewer_draws_nothing_and_touches_nothing() {
        let (mut renderer, mut scene, mut surface) = setup(ReflectorConfig::default());
        let flags = RendererFlags {
            xr_enabled: true,
            shadow_auto_update: true,
        };
        renderer.set_flags(flags);

        let below = viewer(Vec3::new(0.0, -10.0, 10.0));
        let outcome = surface.before_render(&mut renderer, &mut scene, &below).unwrap();

        assert_eq!(outcome, PassOutcome::BackFacing);
        assert!(renderer.draws().is_empty());
        assert!(!renderer.depth_write());
        assert_eq!(renderer.flags(), flags);
        assert!(surface.last_frame().is_none());
        assert_eq!(surface.pass_count(), 0);
    }

    #[test]
    fn failed_render_restores_state_and_reports() {
        let (mut renderer, mut scene, mut surface) = setup(ReflectorConfig::default());
        renderer.fail_next_render();

        let err = surface
            .before_render(&mut renderer, &mut scene, &viewer(Vec3::new(0.0, 10.0, 10.0)))
            .unwrap_err();

        assert!(matches!(err, ReflectionError::Render(RecordingError::Injected)));
        assert!(scene.is_visible(surface.node()));
        assert_eq!(renderer.render_target(), None);
        assert_eq!(renderer.flags(), RendererFlags::default());
        assert!(surface.last_frame().is_none());
    }

    #[test]
    fn moving_surface_is_rederived_every_frame() {
        let (mut renderer, mut scene, mut surface) = setup(ReflectorConfig::default());
        let v = viewer(Vec3::new(0.0, 10.0, 10.0));

        surface.before_render(&mut renderer, &mut scene, &v).unwrap();
        let first = surface.last_frame().unwrap().camera.position;

        scene.set_world(
            surface.node(),
            Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)) * water_world(),
        );
        surface.before_render(&mut renderer, &mut scene, &v).unwrap();
        let second = surface.last_frame().unwrap().camera.position;

        assert!((first - Vec3::new(0.0, -10.0, 10.0)).length() < 1e-4);
        assert!((second - Vec3::new(0.0, -6.0, 10.0)).length() < 1e-4);
        assert_eq!(surface.pass_count(), 2);
    }

    #[test]
    fn hidden_and_collapsed_surfaces_are_skipped() {
        let (mut renderer, mut scene, mut surface) = setup(ReflectorConfig::default());
        let v = viewer(Vec3::new(0.0, 10.0, 10.0));

        scene.set_visible(surface.node(), false);
        assert_eq!(
            surface.before_render(&mut renderer, &mut scene, &v).unwrap(),
            PassOutcome::Hidden
        );
        scene.set_visible(surface.node(), true);

        scene.set_world(surface.node(), Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0)));
        assert_eq!(
            surface.before_render(&mut renderer, &mut scene, &v).unwrap(),
            PassOutcome::Degenerate
        );
        assert!(renderer.draws().is_empty());
    }

    #[test]
    fn viewer_viewport_is_restored() {
        let (mut renderer, mut scene, mut surface) = setup(ReflectorConfig::default());
        let viewport = waterglass_common::Viewport::new(1280, 720);
        let v = viewer(Vec3::new(0.0, 10.0, 10.0)).with_viewport(viewport);

        surface.before_render(&mut renderer, &mut scene, &v).unwrap();
        assert_eq!(renderer.viewport(), Some(viewport));
    }

    #[test]
    fn config_deserializes_with_defaults() {
        // Round-trip through the serde data model without a format crate.
        let c: ReflectorConfig = serde::Deserialize::deserialize(
            serde::de::value::MapDeserializer::<_, serde::de::value::Error>::new(
                [("clip_bias", 0.25_f32)].into_iter(),
            ),
        )
        .unwrap();
        assert_eq!(c.clip_bias, 0.25);
        assert_eq!(c.texture_width, 512);
    }
}
