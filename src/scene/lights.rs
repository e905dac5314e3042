use glam::Vec3;

use crate::math_utils::rgb_hex;

/// How a light renders its shadow map.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ShadowConfig {
    /// Width and height of the shadow map in texels.
    pub map_size: u32,
    /// Near plane of the shadow camera.
    pub near: f32,
    /// Far plane of the shadow camera. Nothing past it casts a shadow.
    pub far: f32,
    pub bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 512,
            near: 0.5,
            far: 500.0,
            bias: 0.0,
        }
    }
}

/// Light added uniformly to every surface.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// An infinitely distant light shining from the node's position towards
/// `target`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
    pub target: Vec3,
    /// Half the width and height of the orthographic shadow camera.
    pub shadow_extent: f32,
    pub shadow: ShadowConfig,
}

impl DirectionalLight {
    pub fn new(hex: u32, intensity: f32) -> Self {
        Self {
            color: rgb_hex(hex),
            intensity,
            target: Vec3::ZERO,
            shadow_extent: 5.0,
            shadow: Default::default(),
        }
    }

    /// Direction light travels in when shining from `position`.
    pub fn direction_from(&self, position: Vec3) -> Vec3 {
        (self.target - position).normalize_or_zero()
    }
}

/// A light emitting in every direction from the node's position.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Range of the light. Zero means the light never fades out.
    pub distance: f32,
    pub decay: f32,
    pub shadow: ShadowConfig,
}

impl PointLight {
    pub fn new(hex: u32, intensity: f32) -> Self {
        Self {
            color: rgb_hex(hex),
            intensity,
            distance: 0.0,
            decay: 1.0,
            shadow: Default::default(),
        }
    }

    pub fn with_distance(self, distance: f32) -> Self {
        Self { distance, ..self }
    }

    /// Fraction of the light's intensity that reaches a point `d` units away.
    pub fn attenuation(&self, d: f32) -> f32 {
        if self.distance > 0.0 && self.decay > 0.0 {
            (1.0 - d / self.distance).clamp(0.0, 1.0).powf(self.decay)
        } else {
            1.0
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Light {
    Ambient(AmbientLight),
    Directional(DirectionalLight),
    Point(PointLight),
}

impl Light {
    pub fn ambient(hex: u32, intensity: f32) -> Self {
        Light::Ambient(AmbientLight {
            color: rgb_hex(hex),
            intensity,
        })
    }

    pub fn color(&self) -> Vec3 {
        match self {
            Light::Ambient(l) => l.color,
            Light::Directional(l) => l.color,
            Light::Point(l) => l.color,
        }
    }

    pub fn intensity(&self) -> f32 {
        match self {
            Light::Ambient(l) => l.intensity,
            Light::Directional(l) => l.intensity,
            Light::Point(l) => l.intensity,
        }
    }

    /// Shadow settings, or `None` for lights that cannot cast shadows.
    pub fn shadow(&self) -> Option<&ShadowConfig> {
        match self {
            Light::Ambient(_) => None,
            Light::Directional(l) => Some(&l.shadow),
            Light::Point(l) => Some(&l.shadow),
        }
    }

    pub fn shadow_mut(&mut self) -> Option<&mut ShadowConfig> {
        match self {
            Light::Ambient(_) => None,
            Light::Directional(l) => Some(&mut l.shadow),
            Light::Point(l) => Some(&mut l.shadow),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_fades_to_zero_at_its_distance() {
        let light = PointLight::new(0xff7d46, 1.0).with_distance(7.0);

        assert_eq!(1.0, light.attenuation(0.0));
        assert!((light.attenuation(3.5) - 0.5).abs() < 1e-6);
        assert_eq!(0.0, light.attenuation(7.0));
        assert_eq!(0.0, light.attenuation(12.0));
    }

    #[test]
    fn point_light_without_distance_never_fades() {
        let light = PointLight::new(0xff00ff, 0.5);
        assert_eq!(1.0, light.attenuation(1000.0));
    }

    #[test]
    fn ambient_light_has_no_shadow() {
        let mut ambient = Light::ambient(0xffffff, 0.12);
        assert!(ambient.shadow().is_none());
        assert!(ambient.shadow_mut().is_none());

        let mut moon = Light::Directional(DirectionalLight::new(0xffffff, 0.12));
        moon.shadow_mut().unwrap().far = 7.0;
        assert_eq!(7.0, moon.shadow().unwrap().far);
    }
}
