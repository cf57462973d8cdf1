//! CPU reference of the water fragment program.
//!
//! Mirrors `fs_main` in [`WATER_SHADER`](crate::WATER_SHADER) line for line
//! so the math can be checked without a GPU. Texture coordinates here use
//! the bias-scale convention (v grows upward); the WGSL flips v when it
//! samples the mirror target.

use glam::{Vec2, Vec3, Vec3Swizzles, Vec4, Vec4Swizzles};

use crate::material::WaterMaterial;

const LUMA: Vec3 = Vec3::new(0.299, 0.587, 0.114);

pub trait TextureSampler {
    /// RGBA in [0, 1] at `uv`. Wrapping is up to the sampler.
    fn sample(&self, uv: Vec2) -> Vec4;
}

impl<F: Fn(Vec2) -> Vec4> TextureSampler for F {
    fn sample(&self, uv: Vec2) -> Vec4 {
        self(uv)
    }
}

/// Single color everywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolidTexture(pub Vec4);

impl TextureSampler for SolidTexture {
    fn sample(&self, _uv: Vec2) -> Vec4 {
        self.0
    }
}

/// Interpolated vertex outputs for one fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentInput {
    pub world_position: Vec3,
    /// `texture_matrix * world_position`, before the perspective divide.
    pub mirror_coord: Vec4,
    /// Mesh UV, used for the effects texture.
    pub uv: Vec2,
}

impl FragmentInput {
    pub fn new(material: &WaterMaterial, world_position: Vec3, uv: Vec2) -> Self {
        Self {
            world_position,
            mirror_coord: material.texture_matrix * world_position.extend(1.0),
            uv,
        }
    }
}

/// Four scrolling lookups of the normal map, remapped to roughly [-1, 1].
pub fn animated_noise(normals: &impl TextureSampler, uv: Vec2, time: f32) -> Vec4 {
    let t = time;
    let uv0 = uv / 103.0 + Vec2::new(t / 57.0, t / 19.0);
    let uv1 = uv / 107.0 - Vec2::new(t / 49.0, t / 51.0);
    let uv2 = uv / Vec2::new(8907.0, 9803.0) + Vec2::new(t / 101.0, t / 97.0);
    let uv3 = uv / Vec2::new(1091.0, 1027.0) - Vec2::new(t / 109.0, t / -113.0);
    let sum = normals.sample(uv0) + normals.sample(uv1) + normals.sample(uv2) + normals.sample(uv3);
    sum * 0.5 - Vec4::ONE
}

/// Screen-space offset applied to the mirror lookup.
pub fn distortion(
    material: &WaterMaterial,
    world_position: Vec3,
    normals: &impl TextureSampler,
    fx: Vec4,
) -> Vec2 {
    let noise = animated_noise(normals, world_position.xz() * material.size, material.time);
    let surface_normal = (noise.xzy() * Vec3::new(1.5, 1.0, 1.5)).normalize_or_zero();
    let distance = (material.eye - world_position).length();
    let avg = (fx.x + fx.y + fx.z) / 3.0 * material.fx_distortion_factor;
    surface_normal.xz() * (0.001 + 1.0 / distance) * material.distortion_scale + Vec2::splat(avg)
}

/// Final RGBA of one water fragment.
pub fn shade_fragment(
    material: &WaterMaterial,
    input: &FragmentInput,
    normals: &impl TextureSampler,
    mirror: &impl TextureSampler,
    effects: &impl TextureSampler,
) -> Vec4 {
    let fx = effects.sample(input.uv);
    let offset = distortion(material, input.world_position, normals, fx);
    let projected = input.mirror_coord.xy() / input.mirror_coord.w;
    let reflection = mirror.sample(projected + offset).xyz();

    let fx_rgb = fx.xyz();
    let tint = fx_rgb * material.fx_display_color_alpha;
    let luminance = tint.dot(LUMA);
    let mut color = reflection.lerp(tint, luminance * material.fx_display_color_alpha);
    color += fx_rgb * material.fx_mix_color.to_vec3();

    if let Some(fog) = material.active_fog() {
        let distance = (material.eye - input.world_position).length();
        color = color.lerp(fog.color.to_vec3(), fog.factor(distance));
    }

    color.extend(material.alpha)
}
