use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use waterglass_common::{Color, NodeId, Transform};
use waterglass_reflect::{
    HostRenderer, PassOutcome, ReflectionError, ReflectionSurface, ViewerState,
};

use crate::material::{WaterMaterial, WaterUniforms};
use crate::options::{OptionsError, WaterOptions};

#[derive(Debug, thiserror::Error)]
pub enum WaterError<E: std::error::Error + 'static> {
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Reflection(#[from] ReflectionError<E>),
}

/// A reflective water surface: the mirror pass plus the material that
/// samples its result.
#[derive(Debug)]
pub struct Water<T> {
    surface: ReflectionSurface<T>,
    material: WaterMaterial,
}

impl<T: Clone + PartialEq + std::fmt::Debug> Water<T> {
    pub fn new<R>(
        renderer: &mut R,
        node: NodeId,
        options: &WaterOptions,
    ) -> Result<Self, WaterError<R::Error>>
    where
        R: HostRenderer<Target = T>,
    {
        options.validate()?;
        let surface = ReflectionSurface::new(renderer, node, options.reflector())?;
        Ok(Self {
            surface,
            material: WaterMaterial::from_options(options),
        })
    }

    /// Run the mirror pass for this frame and feed its outputs to the
    /// material. Call before the main pass draws the water.
    pub fn before_render<R>(
        &mut self,
        renderer: &mut R,
        scene: &mut R::Scene,
        viewer: &ViewerState,
    ) -> Result<PassOutcome, ReflectionError<R::Error>>
    where
        R: HostRenderer<Target = T>,
    {
        let outcome = self.surface.before_render(renderer, scene, viewer)?;
        if outcome == PassOutcome::Rendered {
            if let Some(frame) = self.surface.last_frame() {
                self.material.apply_mirror_frame(frame);
            }
        }
        Ok(outcome)
    }

    /// Advance the material clock.
    pub fn advance(&mut self, dt: f32) {
        self.material.advance(dt);
    }

    pub fn node(&self) -> NodeId {
        self.surface.node()
    }

    pub fn surface(&self) -> &ReflectionSurface<T> {
        &self.surface
    }

    /// The offscreen target the material samples.
    pub fn mirror_target(&self) -> &T {
        self.surface.target()
    }

    pub fn material(&self) -> &WaterMaterial {
        &self.material
    }

    pub fn material_mut(&mut self) -> &mut WaterMaterial {
        &mut self.material
    }

    pub fn set_clip_bias(&mut self, clip_bias: f32) {
        self.surface.set_clip_bias(clip_bias);
    }

    pub fn uniforms(&self) -> WaterUniforms {
        self.material.uniforms()
    }
}

/// The turbine scene's water: a squashed disc tilted just past horizontal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaterSurfacePreset {
    pub radius: f32,
    pub segments: u32,
    /// Mirror target edge length in pixels.
    pub dimensions: u32,
    pub water_color: Color,
    pub distortion_scale: f32,
    pub fx_distortion_factor: f32,
    pub fx_display_color_alpha: f32,
    pub fx_mix_color: Color,
    pub position: Vec3,
    /// Rotation about X in radians.
    pub tilt: f32,
    pub scale: Vec3,
    /// Fraction of frame delta added to the time uniform.
    pub time_scale: f32,
}

impl Default for WaterSurfacePreset {
    fn default() -> Self {
        Self {
            radius: 60.0,
            segments: 64,
            dimensions: 256,
            water_color: Color::BLACK,
            distortion_scale: 4.0,
            fx_distortion_factor: 0.3,
            fx_display_color_alpha: 0.0,
            fx_mix_color: Color::BLACK,
            position: Vec3::ZERO,
            tilt: -std::f32::consts::PI / 1.875,
            scale: Vec3::new(0.27, 1.0, 1.0),
            time_scale: 0.5,
        }
    }
}

impl WaterSurfacePreset {
    /// The preset as placed in the turbine scene.
    pub fn turbine_scene() -> Self {
        Self {
            position: Vec3::new(0.0, -8.32, -4.0),
            ..Self::default()
        }
    }

    pub fn options(&self) -> WaterOptions {
        WaterOptions {
            texture_width: self.dimensions,
            texture_height: self.dimensions,
            water_color: self.water_color,
            distortion_scale: self.distortion_scale,
            fx_distortion_factor: self.fx_distortion_factor,
            fx_display_color_alpha: self.fx_display_color_alpha,
            fx_mix_color: self.fx_mix_color,
            ..WaterOptions::default()
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: Quat::from_rotation_x(self.tilt),
            scale: self.scale,
        }
    }

    /// Time uniform increment for a frame of `delta` seconds.
    pub fn time_step(&self, delta: f32) -> f32 {
        delta * self.time_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use waterglass_reflect::{RecordingRenderer, SceneGraph, SurfaceFrame, TargetId};

    #[derive(Default)]
    struct Pond {
        nodes: Vec<(NodeId, Mat4, bool)>,
    }

    impl Pond {
        fn add(&mut self, world: Mat4) -> NodeId {
            let id = NodeId::new();
            self.nodes.push((id, world, true));
            id
        }
    }

    impl SceneGraph for Pond {
        fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
            self.nodes.iter().find(|n| n.0 == node).map(|n| n.1)
        }
        fn is_visible(&self, node: NodeId) -> bool {
            self.nodes.iter().any(|n| n.0 == node && n.2)
        }
        fn set_visible(&mut self, node: NodeId, visible: bool) {
            if let Some(n) = self.nodes.iter_mut().find(|n| n.0 == node) {
                n.2 = visible;
            }
        }
        fn visible_nodes(&self) -> Vec<NodeId> {
            self.nodes.iter().filter(|n| n.2).map(|n| n.0).collect()
        }
    }

    fn viewer(eye: Vec3) -> ViewerState {
        ViewerState::perspective(eye, Vec3::ZERO, 32_f32.to_radians(), 1.6, 1.0, 10_000.0)
    }

    fn pond_with_water(transform: Transform) -> (Pond, NodeId) {
        let mut pond = Pond::default();
        let node = pond.add(transform.matrix());
        pond.add(Mat4::from_translation(Vec3::new(0.0, 20.0, -30.0)));
        (pond, node)
    }

    #[test]
    fn preset_matches_the_turbine_scene() {
        let p = WaterSurfacePreset::turbine_scene();
        let o = p.options();
        assert_eq!((o.texture_width, o.texture_height), (256, 256));
        assert_eq!(o.distortion_scale, 4.0);
        assert_eq!(o.fx_distortion_factor, 0.3);
        assert_eq!(o.water_color, Color::BLACK);
        assert_eq!(p.time_step(0.016), 0.008);
        assert_eq!(p.position, Vec3::new(0.0, -8.32, -4.0));
    }

    #[test]
    fn preset_surface_faces_up_tilted_away_from_the_viewer() {
        let world = WaterSurfacePreset::turbine_scene().transform().matrix();
        let frame = SurfaceFrame::from_world_matrix(&world).unwrap();
        assert!(frame.normal.y > 0.99);
        assert!(frame.normal.z < 0.0);
        assert!((frame.normal.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn rendered_pass_feeds_the_material() {
        let preset = WaterSurfacePreset::turbine_scene();
        let (mut pond, node) = pond_with_water(preset.transform());
        let mut renderer: RecordingRenderer<Pond> = RecordingRenderer::new();
        let mut water = Water::new(&mut renderer, node, &preset.options()).unwrap();
        let v = viewer(Vec3::new(0.0, 10.0, 47.0));

        let outcome = water.before_render(&mut renderer, &mut pond, &v).unwrap();
        assert_eq!(outcome, PassOutcome::Rendered);

        let frame = *water.surface().last_frame().unwrap();
        assert_eq!(water.material().texture_matrix, frame.texture_matrix);
        assert_eq!(water.uniforms().eye, v.position().to_array());
        assert_eq!(renderer.draws_into(*water.mirror_target()), 1);
        assert_eq!(*water.mirror_target(), TargetId(0));

        water.advance(preset.time_step(0.5));
        assert_eq!(water.material().time, 0.25);
    }

    #[test]
    fn back_facing_keeps_previous_uniforms() {
        let (mut pond, node) = pond_with_water(Transform::default());
        let mut renderer: RecordingRenderer<Pond> = RecordingRenderer::new();
        let mut water = Water::new(&mut renderer, node, &WaterOptions::default()).unwrap();

        // The default surface faces +Z; a viewer at -Z sees its back.
        let behind = viewer(Vec3::new(0.0, 0.0, -5.0));
        let outcome = water.before_render(&mut renderer, &mut pond, &behind).unwrap();
        assert_eq!(outcome, PassOutcome::BackFacing);
        assert_eq!(water.material().texture_matrix, Mat4::IDENTITY);
        assert_eq!(water.material().eye, Vec3::ZERO);
        assert!(renderer.draws().is_empty());
    }

    #[test]
    fn invalid_options_are_rejected_before_allocating() {
        let mut renderer: RecordingRenderer<Pond> = RecordingRenderer::new();
        let options = WaterOptions {
            alpha: 2.0,
            ..WaterOptions::default()
        };
        let err = Water::new(&mut renderer, NodeId::new(), &options).unwrap_err();
        assert!(matches!(err, WaterError::Options(OptionsError::Invalid { field: "alpha", .. })));
        assert!(renderer.target_desc(TargetId(0)).is_none());
    }
}
