use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use waterglass_common::Color;
use waterglass_reflect::MirrorFrame;

use crate::options::{Side, WaterOptions};

/// Scene fog the material blends toward when `fog` is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub color: Color,
    pub near: f32,
    pub far: f32,
}

impl Fog {
    /// Linear blend factor at `distance`, 0 before `near` and 1 past `far`.
    pub fn factor(&self, distance: f32) -> f32 {
        if self.far <= self.near {
            return if distance >= self.far { 1.0 } else { 0.0 };
        }
        ((distance - self.near) / (self.far - self.near)).clamp(0.0, 1.0)
    }
}

/// GPU layout of the water uniform block. Matches `WaterUniforms` in
/// [`WATER_SHADER`](crate::WATER_SHADER).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct WaterUniforms {
    pub texture_matrix: [[f32; 4]; 4],
    pub eye: [f32; 3],
    pub time: f32,
    pub water_color: [f32; 3],
    pub alpha: f32,
    pub fx_mix_color: [f32; 3],
    pub size: f32,
    pub fog_color: [f32; 3],
    pub fog_near: f32,
    pub distortion_scale: f32,
    pub fx_distortion_factor: f32,
    pub fx_display_color_alpha: f32,
    pub fog_far: f32,
    /// 1.0 when fog applies, 0.0 otherwise.
    pub fog_enabled: f32,
    pub _pad: [f32; 3],
}

/// CPU-side state of the water shading program.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterMaterial {
    pub texture_matrix: Mat4,
    pub eye: Vec3,
    pub time: f32,
    pub size: f32,
    pub alpha: f32,
    pub water_color: Color,
    pub distortion_scale: f32,
    pub side: Side,
    pub fog: bool,
    pub scene_fog: Option<Fog>,
    pub fx_distortion_factor: f32,
    pub fx_display_color_alpha: f32,
    pub fx_mix_color: Color,
}

impl WaterMaterial {
    pub fn from_options(options: &WaterOptions) -> Self {
        Self {
            texture_matrix: Mat4::IDENTITY,
            eye: options.eye,
            time: options.time,
            size: options.size,
            alpha: options.alpha,
            water_color: options.water_color,
            distortion_scale: options.distortion_scale,
            side: options.side,
            fog: options.fog,
            scene_fog: None,
            fx_distortion_factor: options.fx_distortion_factor,
            fx_display_color_alpha: options.fx_display_color_alpha,
            fx_mix_color: options.fx_mix_color,
        }
    }

    /// Advance the time uniform. The consumer owns the clock.
    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
    }

    /// Take the texture matrix and eye of a freshly rendered mirror pass.
    pub fn apply_mirror_frame(&mut self, frame: &MirrorFrame) {
        self.texture_matrix = frame.texture_matrix;
        self.eye = frame.eye;
    }

    /// Fog in effect for this material, if any.
    pub fn active_fog(&self) -> Option<Fog> {
        self.scene_fog.filter(|_| self.fog)
    }

    pub fn uniforms(&self) -> WaterUniforms {
        let fog = self.active_fog();
        let (fog_color, fog_near, fog_far) = fog
            .map(|f| (f.color.to_array(), f.near, f.far))
            .unwrap_or(([0.0; 3], 0.0, 0.0));
        WaterUniforms {
            texture_matrix: self.texture_matrix.to_cols_array_2d(),
            eye: self.eye.to_array(),
            time: self.time,
            water_color: self.water_color.to_array(),
            alpha: self.alpha,
            fx_mix_color: self.fx_mix_color.to_array(),
            size: self.size,
            fog_color,
            fog_near,
            distortion_scale: self.distortion_scale,
            fx_distortion_factor: self.fx_distortion_factor,
            fx_display_color_alpha: self.fx_display_color_alpha,
            fog_far,
            fog_enabled: if fog.is_some() { 1.0 } else { 0.0 },
            _pad: [0.0; 3],
        }
    }
}

impl Default for WaterMaterial {
    fn default() -> Self {
        Self::from_options(&WaterOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waterglass_reflect::{
        Derivation, SurfaceFrame, ViewerState, derive_mirror_camera,
    };

    #[test]
    fn uniform_block_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<WaterUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<WaterUniforms>(), 160);
    }

    #[test]
    fn options_flow_into_uniforms() {
        let material = WaterMaterial::from_options(&WaterOptions {
            distortion_scale: 4.0,
            fx_distortion_factor: 0.3,
            water_color: Color::BLACK,
            ..WaterOptions::default()
        });
        let u = material.uniforms();
        assert_eq!(u.distortion_scale, 4.0);
        assert_eq!(u.fx_distortion_factor, 0.3);
        assert_eq!(u.water_color, [0.0; 3]);
        assert_eq!(u.alpha, 1.0);
        assert_eq!(u.texture_matrix, Mat4::IDENTITY.to_cols_array_2d());
        assert_eq!(u.fog_enabled, 0.0);
    }

    #[test]
    fn fog_needs_both_the_flag_and_a_scene_fog() {
        let fog = Fog {
            color: Color::WHITE,
            near: 10.0,
            far: 110.0,
        };
        let mut material = WaterMaterial {
            scene_fog: Some(fog),
            ..WaterMaterial::default()
        };
        assert_eq!(material.uniforms().fog_enabled, 1.0);
        assert_eq!(material.uniforms().fog_far, 110.0);

        material.fog = false;
        assert_eq!(material.active_fog(), None);
        assert_eq!(material.uniforms().fog_enabled, 0.0);

        assert_eq!(fog.factor(5.0), 0.0);
        assert_eq!(fog.factor(60.0), 0.5);
        assert_eq!(fog.factor(500.0), 1.0);
    }

    #[test]
    fn mirror_frame_updates_texture_matrix_and_eye() {
        let viewer = ViewerState::perspective(
            Vec3::new(0.0, 10.0, 10.0),
            Vec3::ZERO,
            32_f32.to_radians(),
            1.0,
            1.0,
            10_000.0,
        );
        let surface = SurfaceFrame {
            position: Vec3::ZERO,
            normal: Vec3::Y,
        };
        let Derivation::Visible(camera) = derive_mirror_camera(&viewer, &surface, 0.0) else {
            panic!("viewer above the water must see it");
        };
        let frame = MirrorFrame {
            camera,
            texture_matrix: camera.texture_matrix(),
            eye: viewer.position(),
        };

        let mut material = WaterMaterial::default();
        material.apply_mirror_frame(&frame);
        material.advance(0.5);

        assert_eq!(material.texture_matrix, frame.texture_matrix);
        let eye = Vec3::from_array(material.uniforms().eye);
        assert!((eye - Vec3::new(0.0, 10.0, 10.0)).length() < 1e-4);
        assert_eq!(material.time, 0.5);
    }
}
