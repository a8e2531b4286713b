//! Camera and sun setup derived from scene directives.
//!
//! Angles follow the scene format: `theta` turns about +y, `phi` tilts up
//! from the horizon. The camera looks along -z before rotation.

use fraktal_scene::{Angle2, SceneParams, yfov_to_focal};

/// Vertical field of view used when the model sets no focal length.
const DEFAULT_YFOV_DEG: f32 = 45.0;

/// Column-major 4x4 matrix.
pub type Mat4 = [f32; 16];

/// Render parameters for one image size.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub focal: f32,
    pub center: [f32; 2],
    pub view: Mat4,
}

impl Camera {
    /// Resolves the scene camera for a `width` x `height` image. Focal length
    /// and center given for the scene's own resolution are rescaled.
    pub fn from_scene(scene: &SceneParams, width: i32, height: i32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let scale = if scene.resolution.y > 0 { h / scene.resolution.y as f32 } else { 1.0 };

        let focal = if scene.camera.f > 0.0 {
            scene.camera.f * scale
        } else {
            yfov_to_focal(DEFAULT_YFOV_DEG, h)
        };
        let c = scene.camera.center;
        let center = if c.x == 0.0 && c.y == 0.0 { [w / 2.0, h / 2.0] } else { [c.x * scale, c.y * scale] };

        let p = scene.view.pos;
        Self { focal, center, view: view_matrix(scene.view.dir, [p.x, p.y, p.z]) }
    }
}

/// `T(pos) * Ry(theta) * Rx(phi)`.
#[rustfmt::skip]
pub fn view_matrix(dir: Angle2, pos: [f32; 3]) -> Mat4 {
    let (st, ct) = dir.theta.to_radians().sin_cos();
    let (sp, cp) = dir.phi.to_radians().sin_cos();
    // Columns of Ry * Rx.
    let x = [ct, 0.0, -st];
    let y = [st * sp, cp, ct * sp];
    let z = [st * cp, -sp, ct * cp];
    [
        x[0], x[1], x[2], 0.0,
        y[0], y[1], y[2], 0.0,
        z[0], z[1], z[2], 0.0,
        pos[0], pos[1], pos[2], 1.0,
    ]
}

/// Unit vector towards a direction given as azimuth and elevation.
pub fn direction(dir: Angle2) -> [f32; 3] {
    let (st, ct) = dir.theta.to_radians().sin_cos();
    let (sp, cp) = dir.phi.to_radians().sin_cos();
    [cp * st, sp, cp * ct]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraktal_scene::{Float2, Int2};

    fn close(a: &[f32], b: &[f32]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    fn apply(m: &Mat4, v: [f32; 4]) -> [f32; 4] {
        std::array::from_fn(|r| (0..4).map(|c| m[c * 4 + r] * v[c]).sum())
    }

    #[test]
    fn zero_angles_give_a_translation() {
        let m = view_matrix(Angle2::default(), [1.0, 2.0, 3.0]);
        assert!(close(&apply(&m, [0.0, 0.0, 0.0, 1.0]), &[1.0, 2.0, 3.0, 1.0]));
        assert!(close(&apply(&m, [0.0, 0.0, -1.0, 0.0]), &[0.0, 0.0, -1.0, 0.0]));
    }

    #[test]
    fn negative_phi_looks_down() {
        let m = view_matrix(Angle2 { theta: 0.0, phi: -30.0 }, [0.0; 3]);
        let forward = apply(&m, [0.0, 0.0, -1.0, 0.0]);
        assert!(forward[1] < -0.49);
    }

    #[test]
    fn theta_turns_about_y() {
        let m = view_matrix(Angle2 { theta: 90.0, phi: 0.0 }, [0.0; 3]);
        assert!(close(&apply(&m, [0.0, 0.0, -1.0, 0.0]), &[-1.0, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn directions() {
        assert!(close(&direction(Angle2 { theta: 0.0, phi: 90.0 }), &[0.0, 1.0, 0.0]));
        assert!(close(&direction(Angle2 { theta: 90.0, phi: 0.0 }), &[1.0, 0.0, 0.0]));
    }

    #[test]
    fn camera_is_rescaled_to_the_image() {
        let mut scene = SceneParams { resolution: Int2 { x: 200, y: 100 }, ..Default::default() };
        scene.camera.f = 50.0;
        scene.camera.center = Float2 { x: 100.0, y: 50.0 };
        let cam = Camera::from_scene(&scene, 400, 200);
        assert_eq!(cam.focal, 100.0);
        assert_eq!(cam.center, [200.0, 100.0]);

        let cam = Camera::from_scene(&SceneParams::default(), 64, 32);
        assert_eq!(cam.center, [32.0, 16.0]);
        assert!((cam.focal - yfov_to_focal(45.0, 32.0)).abs() < 1e-4);
    }
}
