use glam::{Mat3, Mat4, Vec3, Vec4};

/// Below this squared length a surface's +Z axis is treated as degenerate.
const MIN_AXIS_LENGTH_SQUARED: f32 = 1e-12;

/// Reflect `v` off a plane with unit normal `n`: `v - 2(v.n)n`.
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Infinite plane `normal . p + constant = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorPlane {
    pub normal: Vec3,
    pub constant: f32,
}

impl MirrorPlane {
    pub fn from_normal_and_coplanar_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            constant: -point.dot(normal),
        }
    }

    /// Signed distance; positive on the side the normal points to.
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.constant
    }

    pub fn coplanar_point(&self) -> Vec3 {
        self.normal * -self.constant
    }

    /// Mirror image of `point` across the plane.
    pub fn reflect_point(&self, point: Vec3) -> Vec3 {
        point - 2.0 * self.distance_to_point(point) * self.normal
    }

    /// The same plane expressed in the space `matrix` maps into.
    ///
    /// Normals go through the inverse-transpose so non-uniform scale keeps
    /// them perpendicular to the plane.
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let normal_matrix = Mat3::from_mat4(*matrix).inverse().transpose();
        let point = matrix.transform_point3(self.coplanar_point());
        let normal = (normal_matrix * self.normal).normalize();
        Self::from_normal_and_coplanar_point(normal, point)
    }

    /// `(a, b, c, d)` form used by the clip-plane math.
    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(self.constant)
    }
}

/// World-space pose of a reflective surface for a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceFrame {
    pub position: Vec3,
    /// Unit normal: the surface's local +Z axis in world space.
    pub normal: Vec3,
}

impl SurfaceFrame {
    /// Extract position and normal from a surface's current world matrix.
    ///
    /// Returns `None` when the +Z axis has collapsed (zero scale) or the
    /// matrix is not finite.
    pub fn from_world_matrix(world: &Mat4) -> Option<Self> {
        if !world.is_finite() {
            return None;
        }
        let z_axis = world.z_axis.truncate();
        if z_axis.length_squared() <= MIN_AXIS_LENGTH_SQUARED {
            return None;
        }
        Some(Self {
            position: world.w_axis.truncate(),
            normal: z_axis.normalize(),
        })
    }

    pub fn plane(&self) -> MirrorPlane {
        MirrorPlane::from_normal_and_coplanar_point(self.normal, self.position)
    }
}
