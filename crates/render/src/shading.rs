//! Lighting arithmetic shared by the forward and deferred paths.
//!
//! The WGSL shaders of the GPU backend evaluate the same expressions.

use glam::Vec3;
use lumen_lights::PointLight;

/// Exponent for the Blinn-Phong highlight. The G-buffer stores only the
/// specular strength, so the power is a constant of the renderer.
pub const SPECULAR_POWER: f32 = 32.0;

/// Shading inputs at one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub position: Vec3,
    /// Unit length, or zero where no geometry was drawn.
    pub normal: Vec3,
    pub diffuse: Vec3,
    pub specular: f32,
}

pub fn ambient(diffuse: Vec3, ambient_color: Vec3) -> Vec3 {
    diffuse * ambient_color
}

/// Contribution of one light, fading linearly to zero at its radius.
pub fn point_light(surface: &SurfacePoint, light: &PointLight, camera_position: Vec3) -> Vec3 {
    let to_light = light.position() - surface.position;
    let dist = to_light.length();
    if dist >= light.radius || dist <= f32::EPSILON {
        return Vec3::ZERO;
    }
    let l = to_light / dist;
    let n_dot_l = surface.normal.dot(l);
    if n_dot_l <= 0.0 {
        return Vec3::ZERO;
    }
    let attenuation = 1.0 - dist / light.radius;
    let v = (camera_position - surface.position).normalize_or_zero();
    let h = (l + v).normalize_or_zero();
    let highlight = surface.normal.dot(h).max(0.0).powf(SPECULAR_POWER) * surface.specular;
    light.color().truncate() * attenuation * (surface.diffuse * n_dot_l + Vec3::splat(highlight))
}

/// Full forward lighting: ambient plus every light in order.
pub fn forward(
    surface: &SurfacePoint,
    lights: &[PointLight],
    ambient_color: Vec3,
    camera_position: Vec3,
) -> Vec3 {
    lights.iter().fold(ambient(surface.diffuse, ambient_color), |acc, light| {
        acc + point_light(surface, light, camera_position)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn floor_point() -> SurfacePoint {
        SurfacePoint {
            position: Vec3::ZERO,
            normal: Vec3::Y,
            diffuse: Vec3::splat(0.5),
            specular: 0.0,
        }
    }

    #[test]
    fn light_outside_radius_contributes_nothing() {
        let light = PointLight::new(Vec3::new(0.0, 50.0, 0.0), 40.0, Vec4::ONE);
        assert_eq!(point_light(&floor_point(), &light, Vec3::Y), Vec3::ZERO);
    }

    #[test]
    fn light_behind_surface_contributes_nothing() {
        let light = PointLight::new(Vec3::new(0.0, -5.0, 0.0), 40.0, Vec4::ONE);
        assert_eq!(point_light(&floor_point(), &light, Vec3::Y), Vec3::ZERO);
    }

    #[test]
    fn linear_falloff_overhead() {
        // Directly overhead at half the radius: N.L = 1, attenuation 0.5.
        let light = PointLight::new(Vec3::new(0.0, 10.0, 0.0), 20.0, Vec4::ONE);
        let c = point_light(&floor_point(), &light, Vec3::new(0.0, 100.0, 0.0));
        assert!((c - Vec3::splat(0.25)).abs().max_element() < 1e-6);
    }

    #[test]
    fn specular_adds_highlight() {
        let mut surface = floor_point();
        surface.specular = 1.0;
        let light = PointLight::new(Vec3::new(0.0, 10.0, 0.0), 20.0, Vec4::ONE);
        let c = point_light(&surface, &light, Vec3::new(0.0, 100.0, 0.0));
        // Half vector equals the normal, so the highlight is the full strength.
        assert!((c - Vec3::splat(0.25 + 0.5)).abs().max_element() < 1e-5);
    }

    #[test]
    fn forward_without_lights_is_ambient() {
        let surface = floor_point();
        let ambient_color = Vec3::new(0.1, 0.2, 0.3);
        assert_eq!(
            forward(&surface, &[], ambient_color, Vec3::ZERO),
            surface.diffuse * ambient_color
        );
    }
}
