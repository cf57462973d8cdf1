//! Texture-projection and oblique near-plane math.
//!
//! Indices in the comments refer to the column-major element array of a
//! `Mat4` (`m[8]` is column 2, row 0).

use glam::{Mat4, Vec4};

/// Remaps clip-space [-1, 1] to texture space [0, 1] on every axis.
#[rustfmt::skip]
pub const BIAS_SCALE: Mat4 = Mat4::from_cols_array(&[
    0.5, 0.0, 0.0, 0.0,
    0.0, 0.5, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.5, 0.5, 0.5, 1.0,
]);

/// Below this magnitude `plane . q` is treated as zero.
const MIN_CLIP_DENOMINATOR: f32 = 1e-8;

/// World-to-mirror-texture matrix: `BIAS_SCALE * projection * view`.
pub fn texture_matrix(projection: &Mat4, view: &Mat4) -> Mat4 {
    BIAS_SCALE * *projection * *view
}

/// Result of clipping a projection against a view-space plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObliqueClip {
    /// The view-space clip plane after scaling by `2 / (plane . corner)`.
    pub plane: Vec4,
    /// Frustum corner opposite the plane, in clip space.
    pub corner: Vec4,
}

/// `0` for zero, otherwise `±1`. `f32::signum` maps `0.0` to `1.0`.
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Homogeneous frustum corner whose signs match `clip_plane`.
///
/// Returns `None` when the projection has no perspective divide term or
/// zero focal scale, where the corner is undefined.
pub fn frustum_corner(projection: &Mat4, clip_plane: Vec4) -> Option<Vec4> {
    let m = projection.to_cols_array();
    if m[0] == 0.0 || m[5] == 0.0 || m[14] == 0.0 {
        return None;
    }
    Some(Vec4::new(
        (sign(clip_plane.x) + m[8]) / m[0],
        (sign(clip_plane.y) + m[9]) / m[5],
        -1.0,
        (1.0 + m[10]) / m[14],
    ))
}

/// Derive a projection whose near plane coincides with `clip_plane`.
///
/// `clip_plane` is `(a, b, c, d)` in the camera's view space. The third row
/// of `projection` (m[2], m[6], m[10], m[14]) is replaced by the scaled
/// plane, with `clip_bias` pulled off the z term to keep geometry lying on
/// the plane from z-fighting. The input is left untouched. Far-plane
/// behavior is unchanged.
///
/// Returns `None` when the plane is degenerate for this projection.
pub fn oblique_projection(
    projection: &Mat4,
    clip_plane: Vec4,
    clip_bias: f32,
) -> Option<(Mat4, ObliqueClip)> {
    let corner = frustum_corner(projection, clip_plane)?;
    let denominator = clip_plane.dot(corner);
    if !denominator.is_finite() || denominator.abs() < MIN_CLIP_DENOMINATOR {
        return None;
    }
    let plane = clip_plane * (2.0 / denominator);

    let mut oblique = *projection;
    oblique.x_axis.z = plane.x;
    oblique.y_axis.z = plane.y;
    oblique.z_axis.z = plane.z + 1.0 - clip_bias;
    oblique.w_axis.z = plane.w;

    Some((oblique, ObliqueClip { plane, corner }))
}
