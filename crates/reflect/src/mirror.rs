use glam::{Mat4, Vec3};
use waterglass_common::Viewport;

use crate::plane::{SurfaceFrame, reflect};
use crate::projection::{ObliqueClip, oblique_projection, texture_matrix};

/// The viewer camera as the host hands it over for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerState {
    /// Camera-to-world matrix.
    pub world: Mat4,
    /// Base perspective projection (OpenGL clip convention).
    pub projection: Mat4,
    pub far: f32,
    /// Viewport to restore on the renderer after a mirror pass, if any.
    pub viewport: Option<Viewport>,
}

impl ViewerState {
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, projection: Mat4, far: f32) -> Self {
        Self {
            world: Mat4::look_at_rh(eye, target, up).inverse(),
            projection,
            far,
            viewport: None,
        }
    }

    /// Y-up perspective viewer looking from `eye` at `target`.
    pub fn perspective(
        eye: Vec3,
        target: Vec3,
        fov_y_radians: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let projection = Mat4::perspective_rh_gl(fov_y_radians, aspect, near, far);
        Self::look_at(eye, target, Vec3::Y, projection, far)
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    /// Local -Z through the rotation part of the world matrix.
    pub fn forward(&self) -> Vec3 {
        -self.world.z_axis.truncate().normalize_or_zero()
    }

    /// Local +Y through the rotation part of the world matrix.
    pub fn up(&self) -> Vec3 {
        self.world.y_axis.truncate().normalize_or_zero()
    }

    pub fn view(&self) -> Mat4 {
        self.world.inverse()
    }
}

/// The viewer reflected across the surface for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Camera-to-world.
    pub world: Mat4,
    /// World-to-camera (inverse of `world`).
    pub view: Mat4,
    /// The viewer's projection, unclipped.
    pub base_projection: Mat4,
    /// `base_projection` with its near plane moved onto the surface.
    pub projection: Mat4,
    /// Copied from the viewer, never derived.
    pub far: f32,
    pub clip: ObliqueClip,
}

impl MirrorCamera {
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// World-to-UV matrix for sampling what this camera rendered.
    ///
    /// Built from the unclipped projection: the oblique near plane only
    /// changes depth, never the x/y mapping the sampler cares about.
    pub fn texture_matrix(&self) -> Mat4 {
        texture_matrix(&self.base_projection, &self.view)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Derivation {
    Visible(MirrorCamera),
    /// The viewer is behind the surface (or in its plane).
    BackFacing,
    /// Non-finite inputs or a clip plane the projection cannot absorb.
    Degenerate,
}

/// Reflect `viewer` across `surface` and clip its projection to the surface.
pub fn derive_mirror_camera(
    viewer: &ViewerState,
    surface: &SurfaceFrame,
    clip_bias: f32,
) -> Derivation {
    let n = surface.normal;
    let camera_position = viewer.position();

    let view = surface.position - camera_position;
    if view.dot(n) >= 0.0 {
        return Derivation::BackFacing;
    }

    let position = -reflect(view, n) + surface.position;

    let look_at = camera_position + viewer.forward();
    let target = -reflect(surface.position - look_at, n) + surface.position;

    let up = reflect(viewer.up(), n);

    let direction = target - position;
    if !position.is_finite()
        || !target.is_finite()
        || direction.cross(up).length_squared() <= f32::EPSILON
    {
        return Derivation::Degenerate;
    }

    let view = Mat4::look_at_rh(position, target, up);
    let world = view.inverse();

    let clip_plane = surface.plane().transformed(&view).to_vec4();
    let Some((projection, clip)) = oblique_projection(&viewer.projection, clip_plane, clip_bias)
    else {
        return Derivation::Degenerate;
    };

    Derivation::Visible(MirrorCamera {
        position,
        target,
        up,
        world,
        view,
        base_projection: viewer.projection,
        projection,
        far: viewer.far,
        clip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec4, Vec4Swizzles};

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-4
    }

    fn viewer(eye: Vec3, target: Vec3) -> ViewerState {
        ViewerState::perspective(eye, target, 32_f32.to_radians(), 1.0, 1.0, 10_000.0)
    }

    fn unwrap(d: Derivation) -> MirrorCamera {
        match d {
            Derivation::Visible(c) => c,
            other => panic!("expected a visible mirror, got {other:?}"),
        }
    }

    #[test]
    fn viewer_axes_follow_look_at() {
        let v = viewer(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);
        assert!(approx(v.position(), Vec3::new(0.0, 0.0, 5.0)));
        assert!(approx(v.forward(), Vec3::NEG_Z));
        assert!(approx(v.up(), Vec3::Y));
    }

    #[test]
    fn mirror_facing_the_viewer_along_z() {
        let surface = SurfaceFrame {
            position: Vec3::ZERO,
            normal: Vec3::Z,
        };
        let v = viewer(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO);

        // Camera-to-mirror offset (0,0,-5) reflects to (0,0,5).
        let offset = surface.position - v.position();
        assert!(approx(reflect(offset, surface.normal), Vec3::new(0.0, 0.0, 5.0)));

        // Negated and re-anchored, that is the viewer's mirror image.
        let mirror = unwrap(derive_mirror_camera(&v, &surface, 0.0));
        assert!(approx(mirror.position, Vec3::new(0.0, 0.0, -5.0)));
        assert!(approx(mirror.position, surface.plane().reflect_point(v.position())));
        assert!(approx(mirror.up, Vec3::Y));
    }

    #[test]
    fn back_facing_viewer_is_skipped() {
        let surface = SurfaceFrame {
            position: Vec3::ZERO,
            normal: Vec3::Y,
        };
        let below = viewer(Vec3::new(0.0, -4.0, 3.0), Vec3::ZERO);
        assert_eq!(derive_mirror_camera(&below, &surface, 0.0), Derivation::BackFacing);

        let in_plane = viewer(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(derive_mirror_camera(&in_plane, &surface, 0.0), Derivation::BackFacing);
    }

    #[test]
    fn water_plane_scenario_copies_far_and_reflects_pose() {
        let surface = SurfaceFrame {
            position: Vec3::ZERO,
            normal: Vec3::Y,
        };
        let v = viewer(Vec3::new(0.0, 10.0, 10.0), Vec3::ZERO);
        let mirror = unwrap(derive_mirror_camera(&v, &surface, 0.0));

        assert_eq!(mirror.far, v.far);
        assert_eq!(mirror.base_projection, v.projection);
        assert!(approx(mirror.position, Vec3::new(0.0, -10.0, 10.0)));
        // The mirror looks back up at the same point on the water.
        let dir = (mirror.target - mirror.position).normalize();
        assert!(approx(dir, (Vec3::ZERO - mirror.position).normalize()));
        assert!(approx(mirror.world.w_axis.truncate(), mirror.position));
    }

    #[test]
    fn texture_matrix_maps_centred_surface_point_to_uv_centre() {
        let surface = SurfaceFrame {
            position: Vec3::ZERO,
            normal: Vec3::Y,
        };
        let v = viewer(Vec3::new(0.0, 10.0, 10.0), Vec3::ZERO);
        let mirror = unwrap(derive_mirror_camera(&v, &surface, 0.0));

        let uv = mirror.texture_matrix() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let uv = uv.xy() / uv.w;
        assert!((uv.x - 0.5).abs() < 1e-5, "{uv}");
        assert!((uv.y - 0.5).abs() < 1e-5, "{uv}");
    }

    #[test]
    fn oblique_near_plane_sits_on_the_water() {
        let surface = SurfaceFrame {
            position: Vec3::new(0.0, -8.32, -4.0),
            normal: Vec3::Y,
        };
        let v = viewer(Vec3::new(0.0, 10.0, 40.0), Vec3::new(0.0, -8.0, 0.0));
        let mirror = unwrap(derive_mirror_camera(&v, &surface, 0.0));

        let on_water = Vec3::new(2.0, -8.32, -1.0);
        let clip = mirror.view_projection() * on_water.extend(1.0);
        assert!((clip.z / clip.w + 1.0).abs() < 1e-3);

        // Above the water stays inside the depth range, below gets clipped.
        let above = mirror.view_projection() * Vec3::new(2.0, -2.0, -1.0).extend(1.0);
        let below = mirror.view_projection() * Vec3::new(2.0, -14.0, -1.0).extend(1.0);
        assert!(above.z / above.w > -1.0);
        assert!(below.z / below.w < -1.0);
        assert!((mirror.clip.plane.dot(mirror.clip.corner) - 2.0).abs() < 1e-4);
    }

    #[test]
    fn each_frame_starts_from_the_viewer_projection() {
        let surface = SurfaceFrame {
            position: Vec3::ZERO,
            normal: Vec3::Y,
        };
        let v = viewer(Vec3::new(0.0, 10.0, 10.0), Vec3::ZERO);
        let first = unwrap(derive_mirror_camera(&v, &surface, 0.0));
        let second = unwrap(derive_mirror_camera(&v, &surface, 0.0));
        assert_eq!(first.projection, second.projection);
        assert_ne!(first.projection, v.projection);
    }
}
