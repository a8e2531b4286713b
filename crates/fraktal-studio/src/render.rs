//! Linking the scene kernels and running the passes.

use anyhow::{Context as _, Result};
use fraktal_engine::{
    AccessMode, Array, ArrayFormat, Kernel, LinkState, add_link_data, create_array, create_link, link_kernel,
    param_1f, param_1i, param_2f, param_3f, param_array, param_matrix4f, run_kernel, use_kernel, zero_array,
};
use fraktal_scene::SceneParams;

use crate::view::{Camera, direction};

pub const COMMON: &str = include_str!("../kernels/common.f");
pub const RENDER_COLOR: &str = include_str!("../kernels/render_color.f");
pub const RENDER_GEOMETRY: &str = include_str!("../kernels/render_geometry.f");
pub const MEAN_AND_GAMMA: &str = include_str!("../kernels/mean_and_gamma.f");

/// Preview mode; geometry modes run a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    Color,
    Thickness,
    Normals,
    Depth,
    Gbuffer,
}

impl Mode {
    /// `iDrawMode` of the geometry renderer.
    fn draw_mode(self) -> Option<i32> {
        match self {
            Mode::Color => None,
            Mode::Normals => Some(0),
            Mode::Depth => Some(1),
            Mode::Thickness => Some(2),
            Mode::Gbuffer => Some(3),
        }
    }

    pub fn default_render(self) -> (&'static str, &'static str) {
        match self {
            Mode::Color => ("render_color.f", RENDER_COLOR),
            _ => ("render_geometry.f", RENDER_GEOMETRY),
        }
    }
}

/// A named kernel source.
pub struct Source {
    pub name: String,
    pub text: String,
}

fn link(sources: &[&Source]) -> Result<Kernel> {
    let mut link: LinkState = create_link();
    for s in sources {
        add_link_data(&mut link, &s.text, Some(&s.name)).with_context(|| format!("compiling {}", s.name))?;
    }
    Ok(link_kernel(&mut link)?)
}

/// Linked kernels and buffers for one scene.
pub struct Scene {
    pub params: SceneParams,
    pub mode: Mode,
    render: Kernel,
    compose: Kernel,
    accumulation: Array,
    /// RGBA8 image shown to the user.
    pub output: Array,
    samples: i32,
}

impl Scene {
    pub fn new(
        params: SceneParams,
        mode: Mode,
        model: &Source,
        render: &Source,
        compose: &Source,
        (width, height): (i32, i32),
    ) -> Result<Self> {
        let common = Source { name: "common.f".to_owned(), text: COMMON.to_owned() };
        let render = link(&[model, &common, render]).context("linking render kernel")?;
        let compose = link(&[compose]).context("linking compose kernel")?;
        let accumulation = create_array(None, width, height, 4, ArrayFormat::Float, AccessMode::ReadWrite)?;
        let output = create_array(None, width, height, 4, ArrayFormat::Uint8, AccessMode::ReadWrite)?;
        Ok(Self { params, mode, render, compose, accumulation, output, samples: 0 })
    }

    pub fn size(&self) -> (i32, i32) {
        (self.output.width(), self.output.height())
    }

    fn set_scene_params(&self) {
        let k = &self.render;
        let (width, height) = self.size();
        let camera = Camera::from_scene(&self.params, width, height);
        param_2f(k.param_offset("iResolution"), width as f32, height as f32);
        param_1f(k.param_offset("iCameraF"), camera.focal);
        param_2f(k.param_offset("iCameraCenter"), camera.center[0], camera.center[1]);
        param_matrix4f(k.param_offset("iView"), &camera.view);

        let sun = &self.params.sun;
        let [x, y, z] = direction(sun.dir);
        param_3f(k.param_offset("iSunDir"), x, y, z);
        param_1f(k.param_offset("iSunSize"), sun.size.to_radians());
        let c = sun.color;
        param_3f(k.param_offset("iSunStrength"), c.x * sun.intensity, c.y * sun.intensity, c.z * sun.intensity);
    }

    /// Adds one sample per pixel to the accumulation buffer. `clear` starts
    /// over.
    pub fn accumulate(&mut self, clear: bool) -> Result<()> {
        if clear {
            zero_array(&self.accumulation)?;
            self.samples = 0;
        }
        use_kernel(Some(&self.render));
        self.set_scene_params();
        param_1i(self.render.param_offset("iSamples"), self.samples);
        run_kernel(&self.accumulation)?;
        self.samples += 1;
        Ok(())
    }

    /// Averages the accumulated samples into [`Scene::output`].
    pub fn compose(&self) -> Result<()> {
        let k = &self.compose;
        use_kernel(Some(k));
        let (width, height) = self.size();
        param_2f(k.param_offset("iResolution"), width as f32, height as f32);
        param_1i(k.param_offset("iSamples"), self.samples);
        param_array(k.param_offset("iChannel0"), &self.accumulation);
        zero_array(&self.output)?;
        run_kernel(&self.output)?;
        use_kernel(None);
        Ok(())
    }

    /// Renders a geometry preview straight into [`Scene::output`].
    pub fn preview(&mut self, draw_mode: i32) -> Result<()> {
        use_kernel(Some(&self.render));
        self.set_scene_params();
        param_1i(self.render.param_offset("iDrawMode"), draw_mode);
        zero_array(&self.output)?;
        run_kernel(&self.output)?;
        use_kernel(None);
        self.samples = 0;
        Ok(())
    }

    /// Runs the full pipeline for the scene's mode.
    pub fn render(&mut self, samples: u32) -> Result<()> {
        match self.mode.draw_mode() {
            Some(draw_mode) => self.preview(draw_mode),
            None => {
                for i in 0..samples.max(1) {
                    self.accumulate(i == 0)?;
                }
                log::info!("accumulated {} sample(s)", self.samples);
                self.compose()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraktal_kernel::LinkState;
    use fraktal_scene::preprocess;

    const SPHERES: &str = include_str!("../kernels/spheres.f");

    fn model() -> (String, SceneParams) {
        let mut text = SPHERES.to_owned();
        let mut params = SceneParams::default();
        preprocess(&mut text, &mut params).unwrap();
        (text, params)
    }

    fn link_sources(sources: &[(&str, &str)]) -> fraktal_kernel::Program {
        let mut link = LinkState::new();
        for (name, text) in sources {
            link.add_source(text, Some(name)).unwrap_or_else(|e| panic!("{e}"));
        }
        link.link().unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn sample_scene_directives() {
        let (_, params) = model();
        assert_eq!((params.resolution.x, params.resolution.y), (400, 300));
        assert_eq!(params.sun.intensity, 3.0);
        assert_eq!(params.widgets.len(), 1);
    }

    #[test]
    fn color_renderer_links() {
        let (text, _) = model();
        let p = link_sources(&[("spheres.f", &text), ("common.f", COMMON), ("render_color.f", RENDER_COLOR)]);
        for name in ["iSamples", "iCameraF", "iCameraCenter", "iView", "iSunDir", "iSunSize", "iSunStrength"] {
            assert!(p.param_offset(name) >= 0, "{name}");
        }
    }

    #[test]
    fn geometry_renderer_links() {
        let (text, _) = model();
        let p = link_sources(&[("spheres.f", &text), ("common.f", COMMON), ("render_geometry.f", RENDER_GEOMETRY)]);
        assert!(p.param_offset("iDrawMode") >= 0);
        assert_eq!(p.param_offset("iSunDir"), -1);
    }

    #[test]
    fn compose_links() {
        let p = link_sources(&[("mean_and_gamma.f", MEAN_AND_GAMMA)]);
        assert!(p.param_offset("iChannel0") >= 0);
        assert_eq!(p.param_offset("iResolution"), -1);
    }
}
