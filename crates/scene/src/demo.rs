use glam::Vec3;
use waterglass_common::{Color, NodeId, Viewport};
use waterglass_reflect::ViewerState;
use waterglass_water::WaterSurfacePreset;

use crate::background::ScrollingBackground;
use crate::geometry::MeshKind;
use crate::scene::{Node, Scene, SceneError, Shading};
use crate::turbine::Turbine;

pub const VIEWER_FOV_DEGREES: f32 = 32.0;
pub const VIEWER_NEAR: f32 = 1.0;
pub const VIEWER_FAR: f32 = 10_000.0;
pub const VIEWER_EYE: Vec3 = Vec3::new(0.0, 6.0, 47.0);
pub const VIEWER_TARGET: Vec3 = Vec3::new(0.0, 6.0, -20.0);
const BACKGROUND_SPEED: f32 = 0.025;

/// The turbine-over-water scene the apps render.
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub scene: Scene,
    pub water: NodeId,
    pub water_preset: WaterSurfacePreset,
    pub turbine: Turbine,
    pub background: ScrollingBackground,
}

impl DemoScene {
    pub fn build(preset: WaterSurfacePreset) -> Result<Self, SceneError> {
        let mut scene = Scene::new();
        let background =
            ScrollingBackground::spawn(&mut scene, BACKGROUND_SPEED, Color::from_hex(0x8fa9c4))?;
        let turbine = Turbine::spawn(&mut scene, Vec3::new(0.0, -8.32, -40.0), -35_f32.to_radians())?;
        let segments = u16::try_from(preset.segments).unwrap_or(u16::MAX);
        let water = scene.spawn(
            Node::mesh(
                "water",
                MeshKind::Circle {
                    radius: preset.radius,
                    segments,
                },
                preset.transform(),
                preset.water_color,
            )
            .with_shading(Shading::Water),
        )?;
        tracing::info!(nodes = scene.len(), "demo scene built");
        Ok(Self {
            scene,
            water,
            water_preset: preset,
            turbine,
            background,
        })
    }

    /// Advance the animated parts by `delta_ms` of wall time.
    pub fn update(&mut self, delta_ms: f32) {
        self.background.update(&mut self.scene, delta_ms);
        self.turbine.update(&mut self.scene, delta_ms);
    }

    /// Default viewer for a viewport of this size.
    pub fn default_viewer(viewport: Viewport) -> ViewerState {
        ViewerState::perspective(
            VIEWER_EYE,
            VIEWER_TARGET,
            VIEWER_FOV_DEGREES.to_radians(),
            viewport.aspect(),
            VIEWER_NEAR,
            VIEWER_FAR,
        )
        .with_viewport(viewport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waterglass_common::Transform;
    use waterglass_reflect::{PassOutcome, RecordingRenderer, SceneGraph};
    use waterglass_water::Water;

    #[test]
    fn water_node_is_the_preset_disc() {
        let demo = DemoScene::build(WaterSurfacePreset::turbine_scene()).unwrap();
        let node = demo.scene.get(demo.water).unwrap();
        assert_eq!(node.shading, Shading::Water);
        assert_eq!(
            node.mesh,
            Some(MeshKind::Circle {
                radius: 60.0,
                segments: 64
            })
        );
        assert!(demo.scene.visible_nodes().contains(&demo.water));
    }

    #[test]
    fn default_viewer_uses_documented_lens() {
        let v = DemoScene::default_viewer(Viewport::new(1600, 900));
        assert_eq!(v.far, VIEWER_FAR);
        assert_eq!(v.viewport, Some(Viewport::new(1600, 900)));
        assert!((v.position() - VIEWER_EYE).length() < 1e-4);
    }

    #[test]
    fn frames_render_the_mirror_without_the_water() {
        let mut demo = DemoScene::build(WaterSurfacePreset::turbine_scene()).unwrap();
        let mut renderer: RecordingRenderer<Scene> = RecordingRenderer::new();
        let mut water = Water::new(&mut renderer, demo.water, &demo.water_preset.options()).unwrap();
        let viewer = DemoScene::default_viewer(Viewport::new(1280, 720));

        for _ in 0..3 {
            demo.update(16.67);
            let outcome = water
                .before_render(&mut renderer, &mut demo.scene, &viewer)
                .unwrap();
            assert_eq!(outcome, PassOutcome::Rendered);
        }

        assert_eq!(renderer.draws().len(), 3);
        for draw in renderer.draws() {
            assert!(!draw.visible.contains(&demo.water));
            assert_eq!(draw.visible.len(), demo.scene.drawable_count() - 1);
        }
        assert!(demo.scene.is_visible(demo.water));
        assert_eq!(renderer.viewport(), Some(Viewport::new(1280, 720)));
    }

    #[test]
    fn hidden_parent_group_skips_the_mirror_pass() {
        let mut demo = DemoScene::build(WaterSurfacePreset::turbine_scene()).unwrap();
        let mut renderer: RecordingRenderer<Scene> = RecordingRenderer::new();
        let mut water = Water::new(&mut renderer, demo.water, &demo.water_preset.options()).unwrap();
        let viewer = DemoScene::default_viewer(Viewport::new(1280, 720));

        let pond = demo
            .scene
            .spawn(Node::group("pond", Transform::default()))
            .unwrap();
        demo.scene.set_parent(demo.water, Some(pond)).unwrap();
        demo.scene.set_visible(pond, false);

        let outcome = water
            .before_render(&mut renderer, &mut demo.scene, &viewer)
            .unwrap();
        assert_eq!(outcome, PassOutcome::Hidden);
        assert!(renderer.draws().is_empty());
        assert!(demo.scene.is_visible(demo.water));

        demo.scene.set_visible(pond, true);
        let outcome = water
            .before_render(&mut renderer, &mut demo.scene, &viewer)
            .unwrap();
        assert_eq!(outcome, PassOutcome::Rendered);
    }
}
