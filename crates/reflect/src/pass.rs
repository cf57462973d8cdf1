use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use waterglass_common::{NodeId, Viewport};

use crate::mirror::{MirrorCamera, ViewerState};

/// Renderer features that must be off while the mirror pass runs.
///
/// XR would swap in its own cameras (and recurse into this pass); shadow
/// maps would be recomputed for a camera that is not the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererFlags {
    pub xr_enabled: bool,
    pub shadow_auto_update: bool,
}

impl RendererFlags {
    pub const MIRROR_PASS: Self = Self {
        xr_enabled: false,
        shadow_auto_update: false,
    };
}

impl Default for RendererFlags {
    fn default() -> Self {
        Self {
            xr_enabled: false,
            shadow_auto_update: true,
        }
    }
}

/// Pixel format of an offscreen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetFormat {
    /// Half-float color; avoids banding in dark reflections.
    #[default]
    Rgba16Float,
    Rgba8Unorm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffscreenTargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
}

/// Camera matrices a host renderer draws a scene with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub far: f32,
}

impl RenderCamera {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl From<&ViewerState> for RenderCamera {
    fn from(viewer: &ViewerState) -> Self {
        Self {
            view: viewer.view(),
            projection: viewer.projection,
            position: viewer.position(),
            far: viewer.far,
        }
    }
}

impl From<&MirrorCamera> for RenderCamera {
    fn from(mirror: &MirrorCamera) -> Self {
        Self {
            view: mirror.view,
            projection: mirror.projection,
            position: mirror.position,
            far: mirror.far,
        }
    }
}

/// The slice of a scene graph the mirror pass needs.
pub trait SceneGraph {
    /// Current local-to-world matrix of `node`, if it exists.
    fn world_matrix(&self, node: NodeId) -> Option<Mat4>;
    /// The node's own visibility flag.
    fn is_visible(&self, node: NodeId) -> bool;
    /// Whether a render would draw `node`, taking hidden ancestors into
    /// account. Flat graphs can rely on the default.
    fn is_rendered(&self, node: NodeId) -> bool {
        self.is_visible(node)
    }
    fn set_visible(&mut self, node: NodeId, visible: bool);
    /// Nodes a render of this scene would draw, in draw order.
    fn visible_nodes(&self) -> Vec<NodeId>;
}

/// The host renderer as seen by the reflection core.
pub trait HostRenderer {
    type Scene: SceneGraph;
    /// Handle to an offscreen target owned by whoever created it.
    type Target: Clone + PartialEq + std::fmt::Debug;
    type Error: std::error::Error + 'static;

    fn create_target(&mut self, desc: &OffscreenTargetDesc) -> Result<Self::Target, Self::Error>;

    /// `None` means the default back buffer.
    fn render_target(&self) -> Option<Self::Target>;
    fn set_render_target(&mut self, target: Option<Self::Target>);

    fn flags(&self) -> RendererFlags;
    fn set_flags(&mut self, flags: RendererFlags);

    /// Whether `render` clears the bound target on its own.
    fn auto_clear(&self) -> bool;
    fn clear(&mut self);

    /// Depth must be writable for a clear to reach the depth buffer.
    fn set_depth_write(&mut self, _enabled: bool) {}

    fn set_viewport(&mut self, _viewport: Viewport) {}

    /// Draw every visible node of `scene` into the bound target.
    fn render(&mut self, scene: &Self::Scene, camera: &RenderCamera) -> Result<(), Self::Error>;
}

/// Scoped mirror-pass context.
///
/// `begin` records the renderer's target and flags plus the surface's
/// visibility, then switches everything into mirror mode. `Drop` puts the
/// recorded values back, so an early `?` or a panic inside the scene render
/// cannot leave the renderer pointed at the offscreen target.
pub struct MirrorPass<'a, R: HostRenderer> {
    renderer: &'a mut R,
    scene: &'a mut R::Scene,
    surface: NodeId,
    saved_target: Option<R::Target>,
    saved_flags: RendererFlags,
    saved_visible: bool,
    restore_viewport: Option<Viewport>,
}

impl<'a, R: HostRenderer> MirrorPass<'a, R> {
    pub fn begin(
        renderer: &'a mut R,
        scene: &'a mut R::Scene,
        surface: NodeId,
        target: R::Target,
        restore_viewport: Option<Viewport>,
    ) -> Self {
        let saved_target = renderer.render_target();
        let saved_flags = renderer.flags();
        let saved_visible = scene.is_visible(surface);

        scene.set_visible(surface, false);
        renderer.set_flags(RendererFlags::MIRROR_PASS);
        renderer.set_render_target(Some(target));
        renderer.set_depth_write(true);
        if !renderer.auto_clear() {
            renderer.clear();
        }

        Self {
            renderer,
            scene,
            surface,
            saved_target,
            saved_flags,
            saved_visible,
            restore_viewport,
        }
    }

    pub fn render(&mut self, camera: &RenderCamera) -> Result<(), R::Error> {
        self.renderer.render(&*self.scene, camera)
    }
}

impl<R: HostRenderer> Drop for MirrorPass<'_, R> {
    fn drop(&mut self) {
        self.scene.set_visible(self.surface, self.saved_visible);
        self.renderer.set_flags(self.saved_flags);
        self.renderer.set_render_target(self.saved_target.take());
        if let Some(viewport) = self.restore_viewport {
            self.renderer.set_viewport(viewport);
        }
    }
}
