use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Indexed triangle list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Shape of a node's mesh. Flat shapes lie in the local XY plane facing +Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeshKind {
    Cube,
    Plane { width: f32, height: f32 },
    Circle { radius: f32, segments: u16 },
}

impl MeshKind {
    pub fn build(&self) -> MeshData {
        match *self {
            Self::Cube => cube(),
            Self::Plane { width, height } => plane(width, height),
            Self::Circle { radius, segments } => circle(radius, segments),
        }
    }
}

/// Unit cube centred on the origin.
pub fn cube() -> MeshData {
    let p = 0.5_f32;
    let v = |position: [f32; 3], normal: [f32; 3], uv: [f32; 2]| Vertex {
        position,
        normal,
        uv,
    };
    #[rustfmt::skip]
    let vertices = vec![
        // +Z face
        v([-p, -p,  p], [0.0, 0.0, 1.0], [0.0, 1.0]),
        v([ p, -p,  p], [0.0, 0.0, 1.0], [1.0, 1.0]),
        v([ p,  p,  p], [0.0, 0.0, 1.0], [1.0, 0.0]),
        v([-p,  p,  p], [0.0, 0.0, 1.0], [0.0, 0.0]),
        // -Z face
        v([ p, -p, -p], [0.0, 0.0, -1.0], [0.0, 1.0]),
        v([-p, -p, -p], [0.0, 0.0, -1.0], [1.0, 1.0]),
        v([-p,  p, -p], [0.0, 0.0, -1.0], [1.0, 0.0]),
        v([ p,  p, -p], [0.0, 0.0, -1.0], [0.0, 0.0]),
        // +X face
        v([ p, -p,  p], [1.0, 0.0, 0.0], [0.0, 1.0]),
        v([ p, -p, -p], [1.0, 0.0, 0.0], [1.0, 1.0]),
        v([ p,  p, -p], [1.0, 0.0, 0.0], [1.0, 0.0]),
        v([ p,  p,  p], [1.0, 0.0, 0.0], [0.0, 0.0]),
        // -X face
        v([-p, -p, -p], [-1.0, 0.0, 0.0], [0.0, 1.0]),
        v([-p, -p,  p], [-1.0, 0.0, 0.0], [1.0, 1.0]),
        v([-p,  p,  p], [-1.0, 0.0, 0.0], [1.0, 0.0]),
        v([-p,  p, -p], [-1.0, 0.0, 0.0], [0.0, 0.0]),
        // +Y face
        v([-p,  p,  p], [0.0, 1.0, 0.0], [0.0, 1.0]),
        v([ p,  p,  p], [0.0, 1.0, 0.0], [1.0, 1.0]),
        v([ p,  p, -p], [0.0, 1.0, 0.0], [1.0, 0.0]),
        v([-p,  p, -p], [0.0, 1.0, 0.0], [0.0, 0.0]),
        // -Y face
        v([-p, -p, -p], [0.0, -1.0, 0.0], [0.0, 1.0]),
        v([ p, -p, -p], [0.0, -1.0, 0.0], [1.0, 1.0]),
        v([ p, -p,  p], [0.0, -1.0, 0.0], [1.0, 0.0]),
        v([-p, -p,  p], [0.0, -1.0, 0.0], [0.0, 0.0]),
    ];
    #[rustfmt::skip]
    let indices: Vec<u16> = vec![
        0,1,2, 2,3,0,       // +Z
        4,5,6, 6,7,4,       // -Z
        8,9,10, 10,11,8,    // +X
        12,13,14, 14,15,12, // -X
        16,17,18, 18,19,16, // +Y
        20,21,22, 22,23,20, // -Y
    ];
    MeshData { vertices, indices }
}

/// `width` x `height` quad in the XY plane.
pub fn plane(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width * 0.5, height * 0.5);
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex { position: [-hw, hh, 0.0], normal: n, uv: [0.0, 1.0] },
        Vertex { position: [hw, hh, 0.0], normal: n, uv: [1.0, 1.0] },
        Vertex { position: [-hw, -hh, 0.0], normal: n, uv: [0.0, 0.0] },
        Vertex { position: [hw, -hh, 0.0], normal: n, uv: [1.0, 0.0] },
    ];
    MeshData {
        vertices,
        indices: vec![0, 2, 1, 2, 3, 1],
    }
}

/// Disc in the XY plane: a centre vertex and a fan of `segments` triangles.
pub fn circle(radius: f32, segments: u16) -> MeshData {
    let segments = segments.max(3);
    let n = [0.0, 0.0, 1.0];
    let mut vertices = Vec::with_capacity(segments as usize + 2);
    vertices.push(Vertex {
        position: [0.0, 0.0, 0.0],
        normal: n,
        uv: [0.5, 0.5],
    });
    for s in 0..=segments {
        let theta = s as f32 / segments as f32 * std::f32::consts::TAU;
        let (sin, cos) = theta.sin_cos();
        vertices.push(Vertex {
            position: [radius * cos, radius * sin, 0.0],
            normal: n,
            uv: [(cos + 1.0) * 0.5, (sin + 1.0) * 0.5],
        });
    }
    let mut indices = Vec::with_capacity(segments as usize * 3);
    for i in 1..=segments {
        indices.extend_from_slice(&[i, i + 1, 0]);
    }
    MeshData { vertices, indices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn face_normal(mesh: &MeshData, tri: usize) -> Vec3 {
        let idx = &mesh.indices[tri * 3..tri * 3 + 3];
        let p = |i: u16| Vec3::from_array(mesh.vertices[i as usize].position);
        (p(idx[1]) - p(idx[0])).cross(p(idx[2]) - p(idx[0])).normalize()
    }

    #[test]
    fn cube_has_twelve_outward_triangles() {
        let mesh = cube();
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        for tri in 0..12 {
            let declared = Vec3::from_array(mesh.vertices[mesh.indices[tri * 3] as usize].normal);
            assert!((face_normal(&mesh, tri) - declared).length() < 1e-5);
        }
    }

    #[test]
    fn flat_shapes_wind_toward_plus_z() {
        for mesh in [plane(4.0, 2.0), circle(60.0, 64)] {
            for tri in 0..mesh.triangle_count() {
                assert!((face_normal(&mesh, tri) - Vec3::Z).length() < 1e-4);
            }
        }
    }

    #[test]
    fn circle_matches_segment_count_and_radius() {
        let mesh = circle(60.0, 64);
        assert_eq!(mesh.vertices.len(), 66);
        assert_eq!(mesh.triangle_count(), 64);
        for v in &mesh.vertices[1..] {
            let r = Vec3::from_array(v.position).length();
            assert!((r - 60.0).abs() < 1e-3);
            assert!(v.uv.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }

    #[test]
    fn mesh_kind_round_trips_through_json() {
        let kind = MeshKind::Circle {
            radius: 60.0,
            segments: 64,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"circle\""));
        assert_eq!(serde_json::from_str::<MeshKind>(&json).unwrap(), kind);
        assert_eq!(kind.build().triangle_count(), 64);
    }
}
