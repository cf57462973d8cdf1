use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use glam::Vec3;
use tracing_subscriber::EnvFilter;
use waterglass_common::Viewport;
use waterglass_reflect::{
    Derivation, PassOutcome, RecordingRenderer, SurfaceFrame, ViewerState, derive_mirror_camera,
};
use waterglass_scene::{DemoScene, Scene};
use waterglass_water::{Water, WaterOptions, WaterSurfacePreset};

#[derive(Parser)]
#[command(name = "waterglass-cli", about = "CLI tool for waterglass operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Derive the mirror camera for one viewer and surface
    Mirror {
        /// Viewer position as x,y,z
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,5")]
        eye: Vec3,
        /// Point the viewer looks at
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,0")]
        target: Vec3,
        /// Surface position
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,0")]
        surface: Vec3,
        /// Surface normal, normalised before use
        #[arg(long, value_parser = parse_vec3, default_value = "0,0,1")]
        normal: Vec3,
        #[arg(long, default_value = "0")]
        clip_bias: f32,
    },
    /// Run the demo scene headless against a recording renderer
    Simulate {
        #[arg(short, long, default_value = "120")]
        frames: u32,
        /// Frame length in milliseconds
        #[arg(long, default_value = "16.67")]
        delta_ms: f32,
        /// Water options file (.yaml, .yml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print the final summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load and validate a water options file
    Validate { path: PathBuf },
    /// Print water options as YAML: defaults, or the turbine-scene preset
    Options {
        #[arg(long)]
        preset: bool,
    },
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z, got {s:?}")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("waterglass-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("reflect: {}", waterglass_reflect::crate_info());
            let defaults = WaterOptions::default();
            println!(
                "water: target {}x{} {:?}, distortion {}",
                defaults.texture_width,
                defaults.texture_height,
                defaults.format,
                defaults.distortion_scale
            );
            let demo = DemoScene::build(WaterSurfacePreset::turbine_scene())?;
            println!(
                "scene: {} nodes, {} drawable",
                demo.scene.len(),
                demo.scene.drawable_count()
            );
        }
        Commands::Mirror {
            eye,
            target,
            surface,
            normal,
            clip_bias,
        } => {
            let viewer = ViewerState::perspective(
                eye,
                target,
                32_f32.to_radians(),
                1.0,
                1.0,
                10_000.0,
            );
            let frame = SurfaceFrame {
                position: surface,
                normal: normal.normalize_or_zero(),
            };
            match derive_mirror_camera(&viewer, &frame, clip_bias) {
                Derivation::Visible(mirror) => {
                    println!("mirror position: {:?}", mirror.position);
                    println!("mirror target:   {:?}", mirror.target);
                    println!("mirror up:       {:?}", mirror.up);
                    println!("clip plane:      {:?}", mirror.clip.plane);
                    println!("texture matrix:");
                    let m = mirror.texture_matrix();
                    for row in 0..4 {
                        println!("  {:?}", m.row(row));
                    }
                }
                Derivation::BackFacing => println!("viewer is behind the surface; pass skipped"),
                Derivation::Degenerate => println!("degenerate configuration; pass skipped"),
            }
        }
        Commands::Simulate {
            frames,
            delta_ms,
            config,
            json,
        } => simulate(frames, delta_ms, config, json)?,
        Commands::Validate { path } => {
            let options = WaterOptions::load(&path)
                .with_context(|| format!("validating {}", path.display()))?;
            println!("{}: OK", path.display());
            print!("{}", options.to_yaml_string()?);
        }
        Commands::Options { preset } => {
            let options = if preset {
                WaterSurfacePreset::turbine_scene().options()
            } else {
                WaterOptions::default()
            };
            print!("{}", options.to_yaml_string()?);
        }
    }

    Ok(())
}

fn simulate(
    frames: u32,
    delta_ms: f32,
    config: Option<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let preset = WaterSurfacePreset::turbine_scene();
    let options = match &config {
        Some(path) => WaterOptions::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => preset.options(),
    };

    let mut demo = DemoScene::build(preset.clone())?;
    // Only short runs print the draw log.
    let mut renderer: RecordingRenderer<Scene> = RecordingRenderer::new().with_log_limit(8);
    let mut water = Water::new(&mut renderer, demo.water, &options)?;
    let viewer = DemoScene::default_viewer(Viewport::new(1280, 720));

    let mut outcomes: BTreeMap<String, u32> = BTreeMap::new();
    for _ in 0..frames {
        demo.update(delta_ms);
        water.advance(preset.time_step(delta_ms / 1000.0));
        let outcome = water.before_render(&mut renderer, &mut demo.scene, &viewer)?;
        *outcomes.entry(format!("{outcome:?}")).or_default() += 1;
    }
    let rendered = outcomes
        .get(&format!("{:?}", PassOutcome::Rendered))
        .copied()
        .unwrap_or(0);
    tracing::info!(frames, rendered, "simulation finished");

    let spin = &demo.turbine.spin;
    let material = water.material();
    if json {
        let summary = serde_json::json!({
            "frames": frames,
            "outcomes": outcomes,
            "mirror_passes": water.surface().pass_count(),
            "draws": renderer.draw_count(),
            "water_time": material.time,
            "eye": material.eye.to_array(),
            "turbine_angle": spin.angle(),
            "turbine_speed": spin.speed(),
            "background_x": demo.background.plate_positions(&demo.scene),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("frames: {frames}");
        for (outcome, count) in &outcomes {
            println!("  {outcome}: {count}");
        }
        println!("mirror passes: {}", water.surface().pass_count());
        println!("water time:    {:.3}", material.time);
        println!("eye uniform:   {:?}", material.eye);
        println!(
            "turbine:       angle {:.3} rad, speed {:.3}",
            spin.angle(),
            spin.speed()
        );
        println!(
            "background:    {:?}",
            demo.background.plate_positions(&demo.scene)
        );
        if frames <= 4 {
            print!("{}", renderer.describe());
        }
    }
    Ok(())
}
