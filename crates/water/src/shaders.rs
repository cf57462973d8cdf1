/// WGSL program for the reflective water surface.
///
/// Group 0 is the viewer camera, group 1 the water uniforms and textures.
/// Per-instance model matrices use the same locations as the scene shader.
pub const WATER_SHADER: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
};

struct WaterUniforms {
    texture_matrix: mat4x4<f32>,
    eye: vec3<f32>,
    time: f32,
    water_color: vec3<f32>,
    alpha: f32,
    fx_mix_color: vec3<f32>,
    size: f32,
    fog_color: vec3<f32>,
    fog_near: f32,
    distortion_scale: f32,
    fx_distortion_factor: f32,
    fx_display_color_alpha: f32,
    fog_far: f32,
    fog_enabled: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0)
var<uniform> camera: Camera;

@group(1) @binding(0)
var<uniform> water: WaterUniforms;
@group(1) @binding(1)
var mirror_texture: texture_2d<f32>;
@group(1) @binding(2)
var mirror_sampler: sampler;
@group(1) @binding(3)
var normal_texture: texture_2d<f32>;
@group(1) @binding(4)
var normal_sampler: sampler;
@group(1) @binding(5)
var fx_texture: texture_2d<f32>;
@group(1) @binding(6)
var fx_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec4<f32>,
    @location(1) mirror_coord: vec4<f32>,
    @location(2) uv: vec2<f32>,
};

@vertex
fn vs_water(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = camera.view_proj * world_pos;
    out.world_position = world_pos;
    out.mirror_coord = water.texture_matrix * world_pos;
    out.uv = vertex.uv;
    return out;
}

fn get_noise(uv: vec2<f32>) -> vec4<f32> {
    let t = water.time;
    let uv0 = uv / 103.0 + vec2<f32>(t / 57.0, t / 19.0);
    let uv1 = uv / 107.0 - vec2<f32>(t / 49.0, t / 51.0);
    let uv2 = uv / vec2<f32>(8907.0, 9803.0) + vec2<f32>(t / 101.0, t / 97.0);
    let uv3 = uv / vec2<f32>(1091.0, 1027.0) - vec2<f32>(t / 109.0, t / -113.0);
    let noise = textureSample(normal_texture, normal_sampler, uv0)
        + textureSample(normal_texture, normal_sampler, uv1)
        + textureSample(normal_texture, normal_sampler, uv2)
        + textureSample(normal_texture, normal_sampler, uv3);
    return noise * 0.5 - 1.0;
}

@fragment
fn fs_water(in: VertexOutput) -> @location(0) vec4<f32> {
    let noise = get_noise(in.world_position.xz * water.size);
    let surface_normal = normalize(noise.xzy * vec3<f32>(1.5, 1.0, 1.5));

    let distance = length(water.eye - in.world_position.xyz);
    let fx = textureSample(fx_texture, fx_sampler, in.uv);
    let avg_distortion = ((fx.r + fx.g + fx.b) / 3.0) * water.fx_distortion_factor;
    let distortion = surface_normal.xz * (0.001 + 1.0 / distance) * water.distortion_scale
        + avg_distortion;

    // Texture rows run top-down in wgpu; the texture matrix is bottom-up.
    var mirror_uv = in.mirror_coord.xy / in.mirror_coord.w + distortion;
    mirror_uv.y = 1.0 - mirror_uv.y;
    let reflection = textureSample(mirror_texture, mirror_sampler, mirror_uv).rgb;

    let tint = fx.rgb * water.fx_display_color_alpha;
    let luminance = dot(tint, vec3<f32>(0.299, 0.587, 0.114));
    var color = mix(reflection, tint, luminance * water.fx_display_color_alpha);
    color += fx.rgb * water.fx_mix_color;

    if (water.fog_enabled > 0.5) {
        var fog_factor = select(0.0, 1.0, distance >= water.fog_far);
        if (water.fog_far > water.fog_near) {
            fog_factor = clamp((distance - water.fog_near) / (water.fog_far - water.fog_near), 0.0, 1.0);
        }
        color = mix(color, water.fog_color, fog_factor);
    }

    return vec4<f32>(color, water.alpha);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_points_and_bindings_are_present() {
        for needle in [
            "fn vs_water",
            "fn fs_water",
            "@group(1) @binding(6)",
            "mirror_uv.y = 1.0 - mirror_uv.y",
            "fog_enabled: f32",
        ] {
            assert!(WATER_SHADER.contains(needle), "missing {needle}");
        }
    }
}
