use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;
use waterglass_common::{Color, NodeId, Viewport};
use waterglass_reflect::{
    HostRenderer, OffscreenTargetDesc, RenderCamera, RendererFlags, SceneGraph, TargetFormat,
};
use waterglass_scene::{MeshKind, Scene, Shading, Vertex};
use waterglass_water::{NormalMap, Side, WaterUniforms};

use crate::shaders;

/// Remaps OpenGL clip depth [-w, w] to the [0, w] range wgpu expects.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const NORMAL_MAP_SIZE: u32 = 256;
const NORMAL_STRENGTH: f32 = 6.0;
const INITIAL_INSTANCES: u32 = 256;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HostError {
    #[error("unknown render target {0:?}")]
    UnknownTarget(TargetHandle),
    #[error("render target size {width}x{height} is outside 1..={max}")]
    TargetSize { width: u32, height: u32, max: u32 },
    #[error("no frame bound for the back buffer")]
    NoFrame,
}

/// Index of an offscreen target owned by [`WgpuHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle(u32);

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct InstanceData {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
}

impl InstanceData {
    fn new(model: Mat4, color: Color) -> Self {
        let cols = model.to_cols_array_2d();
        Self {
            model_0: cols[0],
            model_1: cols[1],
            model_2: cols[2],
            model_3: cols[3],
            color: [color.r, color.g, color.b, 1.0],
        }
    }
}

fn texture_format(format: TargetFormat) -> wgpu::TextureFormat {
    match format {
        TargetFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TargetFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
    }
}

fn cull_mode(side: Side) -> Option<wgpu::Face> {
    match side {
        Side::Front => Some(wgpu::Face::Back),
        Side::Back => Some(wgpu::Face::Front),
        Side::Double => None,
    }
}

fn check_target_size(desc: &OffscreenTargetDesc, max: u32) -> Result<(), HostError> {
    let in_range = |v: u32| (1..=max).contains(&v);
    if in_range(desc.width) && in_range(desc.height) {
        Ok(())
    } else {
        Err(HostError::TargetSize {
            width: desc.width,
            height: desc.height,
            max,
        })
    }
}

const VERTEX_LAYOUTS: [wgpu::VertexBufferLayout<'static>; 2] = [
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32x3,
            2 => Float32x2,
        ],
    },
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<InstanceData>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &wgpu::vertex_attr_array![
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4,
            6 => Float32x4,
            7 => Float32x4,
        ],
    },
];

struct Offscreen {
    format: wgpu::TextureFormat,
    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

struct ScenePipelines {
    lit: wgpu::RenderPipeline,
    unlit: wgpu::RenderPipeline,
}

struct GpuMesh {
    kind: MeshKind,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

struct WaterBinding {
    side: Side,
    bind_group: wgpu::BindGroup,
}

/// wgpu implementation of [`HostRenderer`] for [`Scene`].
///
/// Owns the device, every offscreen target and the pipelines for each color
/// format it has drawn into. Every `render` call writes its uniforms and
/// submits its own command buffer, so a mirror pass lands on the GPU before
/// the main pass that samples it.
pub struct WgpuHost {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    scene_shader: wgpu::ShaderModule,
    water_shader: wgpu::ShaderModule,
    scene_layout: wgpu::PipelineLayout,
    water_layout: wgpu::PipelineLayout,
    water_group_layout: wgpu::BindGroupLayout,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    scene_pipelines: HashMap<wgpu::TextureFormat, ScenePipelines>,
    water_pipelines: HashMap<(wgpu::TextureFormat, Side), wgpu::RenderPipeline>,
    water_uniform_buffer: wgpu::Buffer,
    normal_view: wgpu::TextureView,
    fx_view: wgpu::TextureView,
    repeat_sampler: wgpu::Sampler,
    clamp_sampler: wgpu::Sampler,
    water: Option<WaterBinding>,
    meshes: HashMap<NodeId, GpuMesh>,
    instance_buffer: wgpu::Buffer,
    instance_capacity: u32,
    targets: Vec<Offscreen>,
    frame: Option<wgpu::TextureView>,
    frame_depth: wgpu::TextureView,
    frame_size: (u32, u32),
    bound: Option<TargetHandle>,
    flags: RendererFlags,
    auto_clear: bool,
    pending_clear: bool,
    depth_write: bool,
    viewport: Option<Viewport>,
    pub clear_color: wgpu::Color,
}

impl WgpuHost {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        normal_seed: i32,
    ) -> Self {
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("camera_buffer"),
            contents: bytemuck::bytes_of(&CameraUniform {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let camera_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("camera_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };
        let water_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("water_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(1),
                sampler_entry(2),
                texture_entry(3),
                sampler_entry(4),
                texture_entry(5),
                sampler_entry(6),
            ],
        });

        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&camera_group_layout],
            push_constant_ranges: &[],
        });
        let water_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("water_pipeline_layout"),
            bind_group_layouts: &[&camera_group_layout, &water_group_layout],
            push_constant_ranges: &[],
        });

        let scene_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::SCENE_SHADER.into()),
        });
        let water_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("water_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::WATER_SHADER.into()),
        });

        let water_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("water_uniform_buffer"),
            contents: bytemuck::bytes_of(&WaterUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let normals = NormalMap::generate(NORMAL_MAP_SIZE, normal_seed, NORMAL_STRENGTH);
        let normal_view = upload_rgba8(&device, &queue, "water_normals", normals.size(), normals.as_bytes());
        // No effect layer is composited yet; black leaves the reflection untouched.
        let fx_view = upload_rgba8(&device, &queue, "water_fx", 1, &[0, 0, 0, 255]);

        let repeat_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("repeat_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let clamp_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("clamp_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let instance_buffer = create_instance_buffer(&device, INITIAL_INSTANCES);
        let frame_depth = create_depth_texture(&device, "frame_depth", width, height);

        Self {
            device,
            queue,
            surface_format,
            scene_shader,
            water_shader,
            scene_layout,
            water_layout,
            water_group_layout,
            camera_buffer,
            camera_bind_group,
            scene_pipelines: HashMap::new(),
            water_pipelines: HashMap::new(),
            water_uniform_buffer,
            normal_view,
            fx_view,
            repeat_sampler,
            clamp_sampler,
            water: None,
            meshes: HashMap::new(),
            instance_buffer,
            instance_capacity: INITIAL_INSTANCES,
            targets: Vec::new(),
            frame: None,
            frame_depth,
            frame_size: (width.max(1), height.max(1)),
            bound: None,
            flags: RendererFlags::default(),
            auto_clear: true,
            pending_clear: false,
            depth_write: true,
            viewport: None,
            clear_color: wgpu::Color {
                r: 0.56,
                g: 0.66,
                b: 0.77,
                a: 1.0,
            },
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_format
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame_depth = create_depth_texture(&self.device, "frame_depth", width, height);
        self.frame_size = (width.max(1), height.max(1));
    }

    /// Bind the swapchain view that `None` targets draw into until `end_frame`.
    pub fn begin_frame(&mut self, view: wgpu::TextureView) {
        self.frame = Some(view);
    }

    pub fn end_frame(&mut self) {
        self.frame = None;
    }

    pub fn set_auto_clear(&mut self, auto_clear: bool) {
        self.auto_clear = auto_clear;
    }

    /// Make `target` the mirror texture the water program samples.
    pub fn bind_water(&mut self, target: &TargetHandle, side: Side) -> Result<(), HostError> {
        let mirror = self
            .targets
            .get(target.0 as usize)
            .ok_or(HostError::UnknownTarget(*target))?;
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("water_bind_group"),
            layout: &self.water_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.water_uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&mirror.color_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.clamp_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&self.normal_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.repeat_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&self.fx_view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&self.clamp_sampler),
                },
            ],
        });
        self.water = Some(WaterBinding { side, bind_group });
        tracing::debug!(mirror = target.0, ?side, "water bound to mirror target");
        Ok(())
    }

    pub fn set_water_uniforms(&self, uniforms: &WaterUniforms) {
        self.queue
            .write_buffer(&self.water_uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    fn ensure_pipelines(&mut self, format: wgpu::TextureFormat) {
        if !self.scene_pipelines.contains_key(&format) {
            let lit = self.scene_pipeline(format, "fs_lit");
            let unlit = self.scene_pipeline(format, "fs_unlit");
            self.scene_pipelines.insert(format, ScenePipelines { lit, unlit });
            tracing::debug!(?format, "scene pipelines created");
        }
        if let Some(side) = self.water.as_ref().map(|w| w.side) {
            if !self.water_pipelines.contains_key(&(format, side)) {
                let pipeline = self.water_pipeline(format, side);
                self.water_pipelines.insert((format, side), pipeline);
            }
        }
    }

    fn scene_pipeline(&self, format: wgpu::TextureFormat, fragment: &str) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(fragment),
            layout: Some(&self.scene_layout),
            vertex: wgpu::VertexState {
                module: &self.scene_shader,
                entry_point: Some("vs_scene"),
                compilation_options: Default::default(),
                buffers: &VERTEX_LAYOUTS,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.scene_shader,
                entry_point: Some(fragment),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(depth_state()),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }

    fn water_pipeline(&self, format: wgpu::TextureFormat, side: Side) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("water_pipeline"),
            layout: Some(&self.water_layout),
            vertex: wgpu::VertexState {
                module: &self.water_shader,
                entry_point: Some("vs_water"),
                compilation_options: Default::default(),
                buffers: &VERTEX_LAYOUTS,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.water_shader,
                entry_point: Some("fs_water"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: cull_mode(side),
                ..Default::default()
            },
            depth_stencil: Some(depth_state()),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    }

    fn upload_mesh(&mut self, id: NodeId, kind: MeshKind) {
        if self.meshes.get(&id).is_some_and(|m| m.kind == kind) {
            return;
        }
        let data = kind.build();
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertex_buffer"),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_index_buffer"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.meshes.insert(
            id,
            GpuMesh {
                kind,
                vertex_buffer,
                index_buffer,
                index_count: data.indices.len() as u32,
            },
        );
    }

    fn ensure_instance_capacity(&mut self, count: usize) {
        let count = count as u32;
        if count > self.instance_capacity {
            let capacity = count.next_power_of_two();
            self.instance_buffer = create_instance_buffer(&self.device, capacity);
            self.instance_capacity = capacity;
        }
    }

    fn color_format(&self) -> Result<wgpu::TextureFormat, HostError> {
        match self.bound {
            Some(handle) => self
                .targets
                .get(handle.0 as usize)
                .map(|t| t.format)
                .ok_or(HostError::UnknownTarget(handle)),
            None if self.frame.is_some() => Ok(self.surface_format),
            None => Err(HostError::NoFrame),
        }
    }

    fn attachments(&self) -> Result<(&wgpu::TextureView, &wgpu::TextureView), HostError> {
        match self.bound {
            Some(handle) => self
                .targets
                .get(handle.0 as usize)
                .map(|t| (&t.color_view, &t.depth_view))
                .ok_or(HostError::UnknownTarget(handle)),
            None => self
                .frame
                .as_ref()
                .map(|view| (view, &self.frame_depth))
                .ok_or(HostError::NoFrame),
        }
    }
}

impl HostRenderer for WgpuHost {
    type Scene = Scene;
    type Target = TargetHandle;
    type Error = HostError;

    fn create_target(&mut self, desc: &OffscreenTargetDesc) -> Result<TargetHandle, HostError> {
        check_target_size(desc, self.device.limits().max_texture_dimension_2d)?;
        let format = texture_format(desc.format);
        let color = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let handle = TargetHandle(self.targets.len() as u32);
        self.targets.push(Offscreen {
            format,
            color_view: color.create_view(&Default::default()),
            depth_view: create_depth_texture(&self.device, desc.label, desc.width, desc.height),
        });
        tracing::info!(
            label = desc.label,
            width = desc.width,
            height = desc.height,
            ?format,
            "offscreen target created"
        );
        Ok(handle)
    }

    fn render_target(&self) -> Option<TargetHandle> {
        self.bound
    }

    fn set_render_target(&mut self, target: Option<TargetHandle>) {
        self.bound = target;
    }

    fn flags(&self) -> RendererFlags {
        self.flags
    }

    fn set_flags(&mut self, flags: RendererFlags) {
        self.flags = flags;
    }

    fn auto_clear(&self) -> bool {
        self.auto_clear
    }

    fn clear(&mut self) {
        self.pending_clear = true;
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn render(&mut self, scene: &Scene, camera: &RenderCamera) -> Result<(), HostError> {
        let format = self.color_format()?;
        self.ensure_pipelines(format);
        self.meshes.retain(|id, _| scene.get(*id).is_some());

        let mut draws = Vec::new();
        let mut instances = Vec::new();
        for id in scene.visible_nodes() {
            let Some(node) = scene.get(id) else { continue };
            let Some(kind) = node.mesh else { continue };
            if node.shading == Shading::Water && self.water.is_none() {
                continue;
            }
            let Some(world) = scene.world_matrix(id) else {
                continue;
            };
            self.upload_mesh(id, kind);
            draws.push((id, node.shading));
            instances.push(InstanceData::new(world, node.color));
        }
        self.ensure_instance_capacity(instances.len());

        self.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::bytes_of(&CameraUniform {
                view_proj: (OPENGL_TO_WGPU * camera.view_projection()).to_cols_array_2d(),
            }),
        );
        if !instances.is_empty() {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&instances));
        }

        let clear = self.auto_clear || std::mem::take(&mut self.pending_clear);
        let (color_view, depth_view) = self.attachments()?;
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(if self.bound.is_some() { "offscreen_pass" } else { "main_pass" }),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: if clear {
                            wgpu::LoadOp::Clear(self.clear_color)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: if clear && self.depth_write {
                            wgpu::LoadOp::Clear(1.0)
                        } else {
                            wgpu::LoadOp::Load
                        },
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            if let (None, Some(vp)) = (self.bound, self.viewport) {
                let (fw, fh) = self.frame_size;
                let x = vp.x.min(fw - 1);
                let y = vp.y.min(fh - 1);
                pass.set_viewport(
                    x as f32,
                    y as f32,
                    vp.width.clamp(1, fw - x) as f32,
                    vp.height.clamp(1, fh - y) as f32,
                    0.0,
                    1.0,
                );
            }

            pass.set_bind_group(0, &self.camera_bind_group, &[]);
            pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
            for (i, (id, shading)) in draws.iter().enumerate() {
                let Some(mesh) = self.meshes.get(id) else { continue };
                let pipeline = match shading {
                    Shading::Water => {
                        let Some(water) = &self.water else { continue };
                        let Some(p) = self.water_pipelines.get(&(format, water.side)) else {
                            continue;
                        };
                        pass.set_bind_group(1, &water.bind_group, &[]);
                        p
                    }
                    Shading::Lit | Shading::Unlit => {
                        let Some(p) = self.scene_pipelines.get(&format) else { continue };
                        if *shading == Shading::Lit { &p.lit } else { &p.unlit }
                    }
                };
                pass.set_pipeline(pipeline);
                pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                let instance = i as u32;
                pass.draw_indexed(0..mesh.index_count, 0, instance..instance + 1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(
            draws = draws.len(),
            offscreen = self.bound.is_some(),
            "scene rendered"
        );
        Ok(())
    }
}

fn depth_state() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: true,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: Default::default(),
        bias: Default::default(),
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("instance_buffer"),
        size: capacity as u64 * std::mem::size_of::<InstanceData>() as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_depth_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

fn upload_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    size: u32,
    texels: &[u8],
) -> wgpu::TextureView {
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        texels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size),
            rows_per_image: Some(size),
        },
        extent,
    );
    texture.create_view(&Default::default())
}
