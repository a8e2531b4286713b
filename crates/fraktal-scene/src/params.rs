//! Typed values produced by the preprocessor. Angles are in degrees.

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Int2 {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Float2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Float3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A direction as two angles, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Angle2 {
    pub theta: f32,
    pub phi: f32,
}

/// `#view(dir=(theta,phi), pos=(x,y,z))`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct View {
    pub dir: Angle2,
    pub pos: Float3,
}

/// `#camera(f=.., center=(x,y))`; `yfov=..` is converted to `f`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Camera {
    /// Pinhole focal length in pixels.
    pub f: f32,
    pub center: Float2,
}

/// `#sun(size=.., dir=(..), color=(..), intensity=..)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sun {
    /// Angular diameter in degrees.
    pub size: f32,
    pub dir: Angle2,
    pub color: Float3,
    pub intensity: f32,
}

/// Interactive widgets requested by `#widget(Type, ..)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Widget {
    Sun(Sun),
}

/// Everything the scene directives of a model file describe.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneParams {
    pub resolution: Int2,
    pub view: View,
    pub camera: Camera,
    pub sun: Sun,
    pub widgets: Vec<Widget>,
}

/// Pinhole focal length (pixels) giving a vertical field of view of
/// `yfov` degrees over `height` pixels.
pub fn yfov_to_focal(yfov: f32, height: f32) -> f32 {
    (height / 2.0) / (yfov.to_radians() / 2.0).tan()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ninety_degree_fov_focal_is_half_height() {
        assert!((yfov_to_focal(90.0, 200.0) - 100.0).abs() < 1e-3);
    }
}
