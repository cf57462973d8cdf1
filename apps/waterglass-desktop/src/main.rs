use anyhow::Result;
use clap::Parser;
use egui::Context as EguiContext;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use waterglass_common::Viewport;
use waterglass_reflect::{HostRenderer, PassOutcome, RenderCamera};
use waterglass_render_wgpu::{FlyCamera, TargetHandle, WgpuHost};
use waterglass_scene::DemoScene;
use waterglass_water::{Water, WaterOptions, WaterSurfacePreset};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser)]
#[command(name = "waterglass-desktop", about = "Wind turbine over reflective water")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Water options file (.yaml, .yml or .json); the turbine preset otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the procedural water normal map
    #[arg(long, default_value = "7")]
    seed: i32,
}

/// Application state.
struct AppState {
    demo: DemoScene,
    options: WaterOptions,
    water: Option<Water<TargetHandle>>,
    camera: FlyCamera,
    show_panel: bool,
    last_outcome: Option<PassOutcome>,
    // Input state
    keys_held: std::collections::HashSet<KeyCode>,
    mouse_captured: bool,
    last_frame: Instant,
}

impl AppState {
    fn new(options: WaterOptions) -> Result<Self> {
        let demo = DemoScene::build(WaterSurfacePreset::turbine_scene())?;
        Ok(Self {
            demo,
            options,
            water: None,
            camera: FlyCamera::default(),
            show_panel: true,
            last_outcome: None,
            keys_held: std::collections::HashSet::new(),
            mouse_captured: false,
            last_frame: Instant::now(),
        })
    }

    fn update(&mut self, dt: f32) {
        if self.keys_held.contains(&KeyCode::KeyW) {
            self.camera.move_forward(dt);
        }
        if self.keys_held.contains(&KeyCode::KeyS) {
            self.camera.move_backward(dt);
        }
        if self.keys_held.contains(&KeyCode::KeyA) {
            self.camera.move_left(dt);
        }
        if self.keys_held.contains(&KeyCode::KeyD) {
            self.camera.move_right(dt);
        }
        if self.keys_held.contains(&KeyCode::Space) {
            self.camera.move_up(dt);
        }
        if self.keys_held.contains(&KeyCode::ControlLeft) {
            self.camera.move_down(dt);
        }

        self.demo.update(dt * 1000.0);
        if let Some(water) = &mut self.water {
            water.advance(self.demo.water_preset.time_step(dt));
        }
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
        }

        if !pressed {
            return;
        }

        match key {
            KeyCode::KeyB => self.demo.turbine.spin.boost(),
            KeyCode::KeyP => {
                let spin = &mut self.demo.turbine.spin;
                spin.set_spinning(!spin.is_spinning());
            }
            KeyCode::KeyR => self.camera = FlyCamera {
                aspect: self.camera.aspect,
                ..FlyCamera::default()
            },
            KeyCode::F1 => self.show_panel = !self.show_panel,
            _ => {}
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_panel {
            return;
        }

        egui::SidePanel::left("water_panel")
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.heading("Waterglass");
                ui.separator();
                ui.label(format!(
                    "Camera: ({:.1}, {:.1}, {:.1})",
                    self.camera.position.x, self.camera.position.y, self.camera.position.z
                ));
                match self.last_outcome {
                    Some(outcome) => ui.label(format!("Mirror pass: {outcome:?}")),
                    None => ui.label("Mirror pass: pending"),
                };

                if let Some(water) = &mut self.water {
                    ui.label(format!("Passes rendered: {}", water.surface().pass_count()));
                    ui.separator();
                    ui.heading("Water");
                    let mut clip_bias = water.surface().config().clip_bias;
                    if ui
                        .add(egui::Slider::new(&mut clip_bias, 0.0..=1.0).text("clip bias"))
                        .changed()
                    {
                        water.set_clip_bias(clip_bias);
                    }
                    let material = water.material_mut();
                    ui.add(
                        egui::Slider::new(&mut material.distortion_scale, 0.0..=50.0)
                            .text("distortion"),
                    );
                    ui.add(egui::Slider::new(&mut material.alpha, 0.0..=1.0).text("alpha"));
                    ui.add(egui::Slider::new(&mut material.size, 0.1..=10.0).text("noise size"));
                    ui.add(
                        egui::Slider::new(&mut material.fx_distortion_factor, 0.0..=1.0)
                            .text("fx distortion"),
                    );
                    ui.add(
                        egui::Slider::new(&mut material.fx_display_color_alpha, 0.0..=1.0)
                            .text("fx color alpha"),
                    );
                    ui.checkbox(&mut material.fog, "fog");
                    ui.label(format!("time: {:.2}", material.time));
                }

                ui.separator();
                ui.heading("Turbine");
                let spin = &mut self.demo.turbine.spin;
                let mut speed = spin.speed();
                if ui
                    .add(
                        egui::Slider::new(
                            &mut speed,
                            waterglass_scene::turbine::MIN_SPEED
                                ..=waterglass_scene::turbine::MAX_SPEED,
                        )
                        .text("speed"),
                    )
                    .changed()
                {
                    spin.set_speed(speed);
                }
                ui.horizontal(|ui| {
                    if ui.button("Boost (B)").clicked() {
                        spin.boost();
                    }
                    let label = if spin.is_spinning() { "Park (P)" } else { "Spin (P)" };
                    if ui.button(label).clicked() {
                        spin.set_spinning(!spin.is_spinning());
                    }
                });

                ui.separator();
                ui.heading("Background");
                ui.add(
                    egui::Slider::new(&mut self.demo.background.speed, 0.0..=1.0).text("drift"),
                );

                ui.separator();
                ui.small("F1: Panel | RMB: Look | WASD: Move | R: Reset view");
            });
    }
}

struct GpuApp {
    state: AppState,
    seed: i32,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    config: Option<wgpu::SurfaceConfiguration>,
    host: Option<WgpuHost>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
}

impl GpuApp {
    fn new(state: AppState, seed: i32) -> Self {
        Self {
            state,
            seed,
            window: None,
            surface: None,
            config: None,
            host: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
        }
    }

    fn render_frame(&mut self) {
        let (Some(surface), Some(host), Some(config), Some(window)) =
            (&self.surface, &mut self.host, &self.config, &self.window)
        else {
            return;
        };

        let output = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(host.device(), config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };

        let viewport = Viewport::new(config.width, config.height);
        let viewer = self.state.camera.to_viewer(viewport);

        host.begin_frame(
            output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default()),
        );
        if let Some(water) = &mut self.state.water {
            match water.before_render(host, &mut self.state.demo.scene, &viewer) {
                Ok(outcome) => self.state.last_outcome = Some(outcome),
                Err(e) => tracing::error!("mirror pass failed: {e}"),
            }
            host.set_water_uniforms(&water.uniforms());
        }
        if let Err(e) = host.render(&self.state.demo.scene, &RenderCamera::from(&viewer)) {
            tracing::error!("main pass failed: {e}");
        }
        host.end_frame();

        let (Some(egui_winit), Some(egui_renderer)) =
            (&mut self.egui_winit, &mut self.egui_renderer)
        else {
            return;
        };
        let raw_input = egui_winit.take_egui_input(window);
        let state = &mut self.state;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            state.draw_ui(ctx);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [config.width, config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let (device, queue) = (host.device(), host.queue());
        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let view = output
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }

        output.present();
        window.request_redraw();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Waterglass")
            .with_inner_size(PhysicalSize::new(1280u32, 720));
        let window = match event_loop.create_window(attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                tracing::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = match instance.create_surface(window.clone()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("failed to create surface: {e}");
                event_loop.exit();
                return;
            }
        };

        let Some(adapter) =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            }))
        else {
            tracing::error!("no suitable GPU adapter");
            event_loop.exit();
            return;
        };

        let (device, queue) = match pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("waterglass_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        )) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!("failed to create device: {e}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            tracing::error!("surface reports no formats");
            event_loop.exit();
            return;
        };
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(first_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.state.camera.aspect = config.width as f32 / config.height as f32;

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);
        let mut host = WgpuHost::new(
            device,
            queue,
            surface_format,
            config.width,
            config.height,
            self.seed,
        );

        match Water::new(&mut host, self.state.demo.water, &self.state.options) {
            Ok(water) => {
                if let Err(e) = host.bind_water(water.mirror_target(), self.state.options.side) {
                    tracing::error!("failed to bind water: {e}");
                }
                self.state.water = Some(water);
            }
            Err(e) => tracing::error!("water surface disabled: {e}"),
        }

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        self.window = Some(window);
        self.surface = Some(surface);
        self.config = Some(config);
        self.host = Some(host);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            let response = egui_winit.on_window_event(window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(host), Some(config)) =
                    (&self.surface, &mut self.host, &mut self.config)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(host.device(), config);
                    self.state.camera.aspect = config.width as f32 / config.height as f32;
                    host.resize(config.width, config.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                self.state
                    .handle_key(key, key_state == ElementState::Pressed);
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                self.state.mouse_captured = btn_state == ElementState::Pressed;
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!self.state.mouse_captured);
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Left,
                state: ElementState::Pressed,
                ..
            } => {
                self.state.demo.turbine.spin.boost();
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let dt = (now - self.state.last_frame).as_secs_f32().min(0.1);
                self.state.last_frame = now;
                self.state.update(dt);
                self.render_frame();
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.state.mouse_captured {
                self.state.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("waterglass-desktop starting");

    let options = match &cli.config {
        Some(path) => WaterOptions::load(path)?,
        None => WaterSurfacePreset::turbine_scene().options(),
    };

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(AppState::new(options)?, cli.seed);
    event_loop.run_app(&mut app)?;

    Ok(())
}
