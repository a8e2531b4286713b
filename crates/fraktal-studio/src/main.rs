//! `fraktal-studio`: renders a model file to a PNG.
//!
//! ```text
//! fraktal-studio --model kernels/spheres.f --samples 128 --output spheres.png
//! fraktal-studio --model kernels/spheres.f --mode normals
//! ```

mod render;
mod view;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use fraktal_engine::logging::{LoggingConfig, init_logging};
use fraktal_engine::{create_context, to_cpu};
use fraktal_scene::{SceneParams, preprocess};

use render::{MEAN_AND_GAMMA, Mode, Scene, Source};

const DEFAULT_RESOLUTION: i32 = 200;
const MAX_RESOLUTION: i32 = 2048;

#[derive(Parser)]
#[command(name = "fraktal-studio")]
#[command(version, about = "Render a fraktal model to a PNG")]
struct Args {
    /// Model fragment defining `fn model(p: vec3<f32>) -> f32`, with optional
    /// scene directives
    #[arg(long)]
    model: PathBuf,

    /// Render fragment (defaults to the built-in renderer for --mode)
    #[arg(long)]
    render: Option<PathBuf>,

    /// Compose fragment (defaults to mean and gamma correction)
    #[arg(long)]
    compose: Option<PathBuf>,

    /// Output size as WIDTHxHEIGHT; overrides #resolution
    #[arg(long, value_parser = parse_resolution)]
    resolution: Option<(i32, i32)>,

    /// Accumulation passes in color mode
    #[arg(long, default_value_t = 64)]
    samples: u32,

    #[arg(long, value_enum, default_value_t = Mode::Color)]
    mode: Mode,

    #[arg(long, default_value = "fraktal.png")]
    output: PathBuf,

    /// Log filter, e.g. "debug" or "fraktal_engine=trace"
    #[arg(long)]
    log: Option<String>,
}

fn parse_resolution(s: &str) -> Result<(i32, i32), String> {
    let (w, h) = s.split_once(['x', 'X']).ok_or("expected WIDTHxHEIGHT")?;
    let w = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    Ok((w, h))
}

/// Non-positive sizes fall back to the default; large ones are capped.
fn clamp_resolution((w, h): (i32, i32)) -> (i32, i32) {
    let clamp = |v: i32| if v <= 0 { DEFAULT_RESOLUTION } else { v.min(MAX_RESOLUTION) };
    (clamp(w), clamp(h))
}

fn read_source(path: &Path) -> Result<Source> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(Source { name: path.display().to_string(), text })
}

fn save_png(scene: &Scene, path: &Path) -> Result<()> {
    let (width, height) = scene.size();
    let mut pixels = vec![0; scene.output.byte_size()];
    to_cpu(&mut pixels, &scene.output)?;
    let image = image::RgbaImage::from_raw(width as u32, height as u32, pixels)
        .context("output buffer does not match the image size")?;
    image.save(path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut model = read_source(&args.model)?;
    let mut params = SceneParams::default();
    if let Err(e) = preprocess(&mut model.text, &mut params) {
        bail!("{}: {e}", model.name);
    }

    let size = clamp_resolution(args.resolution.unwrap_or((params.resolution.x, params.resolution.y)));
    log::info!("rendering {} at {}x{} ({:?})", model.name, size.0, size.1, args.mode);

    let render = match &args.render {
        Some(path) => read_source(path)?,
        None => {
            let (name, text) = args.mode.default_render();
            Source { name: name.to_owned(), text: text.to_owned() }
        }
    };
    let compose = match &args.compose {
        Some(path) => read_source(path)?,
        None => Source { name: "mean_and_gamma.f".to_owned(), text: MEAN_AND_GAMMA.to_owned() },
    };

    let ctx = create_context()?;
    if let Some(info) = ctx.adapter_info() {
        log::debug!("adapter: {} ({:?})", info.name, info.backend);
    }

    let mut scene = Scene::new(params, args.mode, &model, &render, &compose, size)?;
    scene.render(args.samples)?;
    save_png(&scene, &args.output)?;
    log::info!("wrote {}", args.output.display());
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.log.clone().map(LoggingConfig::with_filter).unwrap_or_default());

    if let Err(e) = run(args) {
        log::error!("{e:#}");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_argument() {
        assert_eq!(parse_resolution("640x480"), Ok((640, 480)));
        assert_eq!(parse_resolution("32 X 16"), Ok((32, 16)));
        assert!(parse_resolution("640").is_err());
        assert!(parse_resolution("ax1").is_err());
    }

    #[test]
    fn resolution_is_clamped() {
        assert_eq!(clamp_resolution((0, -5)), (200, 200));
        assert_eq!(clamp_resolution((4096, 300)), (2048, 300));
        assert_eq!(clamp_resolution((1, 1)), (1, 1));
    }

    #[test]
    fn cli_parses() {
        let args = Args::try_parse_from([
            "fraktal-studio",
            "--model",
            "m.f",
            "--mode",
            "normals",
            "--resolution",
            "64x32",
        ])
        .unwrap();
        assert_eq!(args.mode, Mode::Normals);
        assert_eq!(args.resolution, Some((64, 32)));
        assert_eq!(args.samples, 64);
    }
}
