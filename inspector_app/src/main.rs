//! Headless model inspector
//!
//! Loads a glTF or OBJ model, prepares its per-frame GPU resources on the
//! host allocator and plays its first animation through the full frame
//! pipeline, logging what each stage produced.
//!
//! ```text
//! inspector <model.gltf|model.obj> [frames] [dt] [--config path]
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use scene_engine::assets::{load_model, AssetError};
use scene_engine::config::ConfigError;
use scene_engine::core::config::ApplicationConfig;
use scene_engine::foundation::logging;
use scene_engine::render::vulkan::VulkanError;
use scene_engine::render::{record_draws, DrawCommand, RenderContext};
use scene_engine::{EngineError, Model};

const DEFAULT_FRAMES: usize = 120;
const DEFAULT_DT: f32 = 1.0 / 60.0;

/// Inspector failures
#[derive(thiserror::Error, Debug)]
enum InspectorError {
    #[error("{0}\nusage: inspector <model.gltf|model.obj> [frames] [dt] [--config path]")]
    Usage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Parsed command line
#[derive(Debug)]
struct Args {
    model: PathBuf,
    frames: usize,
    dt: f32,
    config: Option<PathBuf>,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, InspectorError> {
        let mut positional = Vec::new();
        let mut config = None;

        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args
                    .next()
                    .ok_or_else(|| InspectorError::Usage("--config needs a path".to_string()))?;
                config = Some(PathBuf::from(path));
            } else {
                positional.push(arg);
            }
        }

        let mut positional = positional.into_iter();
        let model = positional
            .next()
            .map(PathBuf::from)
            .ok_or_else(|| InspectorError::Usage("missing model path".to_string()))?;
        let frames = match positional.next() {
            Some(frames) => frames
                .parse()
                .map_err(|_| InspectorError::Usage(format!("invalid frame count '{}'", frames)))?,
            None => DEFAULT_FRAMES,
        };
        let dt = match positional.next() {
            Some(dt) => dt
                .parse()
                .map_err(|_| InspectorError::Usage(format!("invalid time step '{}'", dt)))?,
            None => DEFAULT_DT,
        };
        if let Some(extra) = positional.next() {
            return Err(InspectorError::Usage(format!("unexpected argument '{}'", extra)));
        }

        Ok(Self { model, frames, dt, config })
    }
}

/// Resolve a relative model path against the configured assets directory
fn resolve_model_path(model: &Path, config: &ApplicationConfig) -> PathBuf {
    if model.is_relative() && !model.exists() {
        let candidate = Path::new(&config.assets.assets_dir).join(model);
        if candidate.exists() {
            return candidate;
        }
    }
    model.to_path_buf()
}

fn log_model(model: &Model) {
    log::info!(
        "'{}': {} nodes ({} roots), {} meshes, {} primitives, {} skins, {} animations",
        model.name,
        model.graph().len(),
        model.graph().roots().len(),
        model.meshes().len(),
        model.primitives().len(),
        model.skins().len(),
        model.animations().len()
    );
    for (index, animation) in model.animations().iter().enumerate() {
        log::info!(
            "  animation {} '{}': {} channels, {} samplers, {:.3}s..{:.3}s",
            index,
            animation.name,
            animation.channels().len(),
            animation.samplers().len(),
            animation.start_time(),
            animation.end_time()
        );
    }
}

fn load_config(args: &Args) -> Result<ApplicationConfig, InspectorError> {
    Ok(match &args.config {
        Some(path) => ApplicationConfig::load_validated(&path.to_string_lossy())?,
        None => ApplicationConfig::default(),
    })
}

fn run(args: &Args, config: &ApplicationConfig) -> Result<(), InspectorError> {
    let path = resolve_model_path(&args.model, config);
    let mut model = load_model(&path, &config.assets)?;
    log_model(&model);

    let (ctx, host) = RenderContext::headless(config.renderer.frames_in_flight)?;
    let textures = (0..model.texture_count()).map(|_| host.create_texture()).collect();
    model.set_texture_bindings(textures);
    model.prepare_gpu_resources(&ctx)?;

    let animation = if model.animations().is_empty() { None } else { Some(0) };
    model.set_active_animation(animation).map_err(EngineError::from)?;

    let mut draws = 0;
    let mut binds = 0;
    for frame in 0..args.frames {
        let slot = frame % ctx.frames_in_flight();
        model.update(&ctx, slot, args.dt)?;

        for command in record_draws(&model, slot)? {
            match command {
                DrawCommand::DrawIndexed(_) => draws += 1,
                DrawCommand::BindDescriptorSet { .. } => binds += 1,
                DrawCommand::BindGeometry { .. } => {}
            }
        }
    }

    log::info!(
        "Played {} frames over {} frames in flight: {} descriptor binds, {} indexed draws",
        args.frames,
        ctx.frames_in_flight(),
        binds,
        draws
    );
    if let Some(active) = animation {
        let animation = model.animation(active).map_err(EngineError::from)?;
        log::info!(
            "Animation '{}' playhead at {:.3}s of {:.3}s",
            animation.name,
            animation.current_time(),
            animation.end_time()
        );
    }
    if !model.skins().is_empty() {
        let palette = model.joint_matrices(0).map_err(EngineError::from)?;
        log::info!("First joint matrix of skin 0: {:?}", &palette[..palette.len().min(16)]);
    }
    log::info!(
        "Host allocator: {} buffers, {} descriptor sets, {} bytes live",
        host.live_buffer_count(),
        host.live_descriptor_set_count(),
        host.allocated_bytes()
    );

    model.release_gpu_resources();
    if host.live_buffer_count() != 0 {
        log::warn!("{} buffers still alive after release", host.live_buffer_count());
    }
    Ok(())
}

fn main() -> ExitCode {
    let result = Args::parse(std::env::args().skip(1)).and_then(|args| {
        let config = load_config(&args)?;
        logging::init_with_level(&config.engine.log_level);
        log::debug!("{:?}", args);
        run(&args, &config)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("inspector: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, InspectorError> {
        Args::parse(list.iter().map(|s| (*s).to_string()))
    }

    #[test]
    fn test_defaults() {
        let parsed = args(&["model.gltf"]).unwrap();
        assert_eq!(parsed.model, PathBuf::from("model.gltf"));
        assert_eq!(parsed.frames, DEFAULT_FRAMES);
        assert!((parsed.dt - DEFAULT_DT).abs() < f32::EPSILON);
        assert!(parsed.config.is_none());
    }

    #[test]
    fn test_config_flag_anywhere() {
        let parsed = args(&["--config", "app.toml", "model.gltf", "10", "0.5"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("app.toml")));
        assert_eq!(parsed.frames, 10);
        assert!((parsed.dt - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_usage_errors() {
        assert!(matches!(args(&[]), Err(InspectorError::Usage(_))));
        assert!(matches!(args(&["m.gltf", "many"]), Err(InspectorError::Usage(_))));
        assert!(matches!(args(&["m.gltf", "--config"]), Err(InspectorError::Usage(_))));
        assert!(matches!(args(&["m.gltf", "1", "0.1", "extra"]), Err(InspectorError::Usage(_))));
    }

    #[test]
    fn test_runs_skinned_fixture() {
        let model = format!(
            "{}/../crates/scene_engine/resources/test_models/skinned.gltf",
            env!("CARGO_MANIFEST_DIR")
        );
        let parsed = args(&[model.as_str(), "8", "0.1"]).unwrap();
        let config = load_config(&parsed).unwrap();
        run(&parsed, &config).unwrap();
    }

    #[test]
    fn test_config_file_sets_log_level() {
        let path = std::env::temp_dir().join(format!("inspector_log_level_{}.toml", std::process::id()));
        std::fs::write(&path, "[engine]\nlog_level = \"warn\"\n").unwrap();

        let parsed = args(&["--config", path.to_str().unwrap(), "model.gltf"]).unwrap();
        let config = load_config(&parsed).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.engine.log_level, "warn");
        assert_eq!(load_config(&args(&["model.gltf"]).unwrap()).unwrap().engine.log_level, "info");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let path = std::env::temp_dir().join(format!("inspector_bad_{}.toml", std::process::id()));
        std::fs::write(&path, "[renderer]\nframes_in_flight = 0\n").unwrap();

        let parsed = args(&["--config", path.to_str().unwrap(), "model.gltf"]).unwrap();
        let result = load_config(&parsed);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(InspectorError::Config(_))));
    }
}
