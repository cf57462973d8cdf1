//! Procedural tileable normal map for the water noise lookups.

use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use glam::{Vec2, Vec3, Vec4};

use crate::shading::TextureSampler;

/// Square RGBA8 normal map; rgb is the tangent-space normal (z up) mapped
/// from [-1, 1] to [0, 255].
#[derive(Debug, Clone, PartialEq)]
pub struct NormalMap {
    size: u32,
    texels: Vec<[u8; 4]>,
}

impl NormalMap {
    /// Generate a `size`x`size` map that tiles seamlessly under repeat
    /// wrapping. `strength` scales the height field before differentiation.
    pub fn generate(size: u32, seed: i32, strength: f32) -> Self {
        let size = size.max(2);
        let mut noise = FastNoiseLite::with_seed(seed);
        noise.set_noise_type(Some(NoiseType::OpenSimplex2));
        noise.set_fractal_type(Some(FractalType::FBm));
        noise.set_fractal_octaves(Some(4));
        noise.set_frequency(Some(4.0 / size as f32));

        let n = size as usize;
        let s = size as f32;
        let mut heights = vec![0.0_f32; n * n];
        for y in 0..n {
            for x in 0..n {
                let (fx, fy) = (x as f32, y as f32);
                // Bilinear blend of four offset copies makes the edges meet.
                let h = noise.get_noise_2d(fx, fy) * (s - fx) * (s - fy)
                    + noise.get_noise_2d(fx - s, fy) * fx * (s - fy)
                    + noise.get_noise_2d(fx, fy - s) * (s - fx) * fy
                    + noise.get_noise_2d(fx - s, fy - s) * fx * fy;
                heights[y * n + x] = h / (s * s);
            }
        }

        let height = |x: usize, y: usize| heights[(y % n) * n + (x % n)];
        let mut texels = Vec::with_capacity(n * n);
        for y in 0..n {
            for x in 0..n {
                let dx = height(x + 1, y) - height(x + n - 1, y);
                let dy = height(x, y + 1) - height(x, y + n - 1);
                let normal = Vec3::new(-dx * strength, -dy * strength, 1.0).normalize();
                texels.push(encode(normal));
            }
        }

        tracing::debug!(size, seed, "normal map generated");
        Self { size, texels }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn texels(&self) -> &[[u8; 4]] {
        &self.texels
    }

    /// Raw RGBA8 bytes, row-major, ready for a texture upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }

    fn texel(&self, x: i64, y: i64) -> Vec4 {
        let n = self.size as i64;
        let [r, g, b, a] = self.texels[(y.rem_euclid(n) * n + x.rem_euclid(n)) as usize];
        Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0
    }
}

fn encode(normal: Vec3) -> [u8; 4] {
    let to_byte = |c: f32| ((c * 0.5 + 0.5).clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_byte(normal.x), to_byte(normal.y), to_byte(normal.z), 255]
}

impl TextureSampler for NormalMap {
    /// Bilinear lookup with repeat wrapping.
    fn sample(&self, uv: Vec2) -> Vec4 {
        let p = uv * self.size as f32 - Vec2::splat(0.5);
        let base = p.floor();
        let t = p - base;
        let (x, y) = (base.x as i64, base.y as i64);
        let top = self.texel(x, y).lerp(self.texel(x + 1, y), t.x);
        let bottom = self.texel(x, y + 1).lerp(self.texel(x + 1, y + 1), t.x);
        top.lerp(bottom, t.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normals_point_up_and_are_deterministic() {
        let a = NormalMap::generate(32, 7, 4.0);
        let b = NormalMap::generate(32, 7, 4.0);
        assert_eq!(a, b);
        assert_eq!(a.as_bytes().len(), 32 * 32 * 4);
        assert!(a.texels().iter().all(|t| t[2] >= 128 && t[3] == 255));
    }

    #[test]
    fn sampling_wraps_across_the_edge() {
        let map = NormalMap::generate(16, 3, 4.0);
        let inside = map.sample(Vec2::new(0.3, 0.6));
        let wrapped = map.sample(Vec2::new(2.3, -0.4));
        assert!((inside - wrapped).abs().max_element() < 1e-4);
    }

    #[test]
    fn texel_centres_return_exact_values() {
        let map = NormalMap::generate(8, 1, 2.0);
        let [r, g, b, a] = map.texels()[8 + 2];
        let expected = Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0;
        let got = map.sample(Vec2::new(2.5 / 8.0, 1.5 / 8.0));
        assert!((got - expected).abs().max_element() < 1e-5);
    }

    #[test]
    fn flat_height_field_encodes_straight_up() {
        assert_eq!(encode(Vec3::Z), [128, 128, 255, 255]);
    }
}
