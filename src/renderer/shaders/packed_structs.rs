//! Rust structs with memory layouts that match their same named counterparts
//! in `standard.wgsl`.
//!
//! Data is packed as tightly as possible and the spare `w` component of a
//! `Vec4` carries an extra scalar wherever one is available. For example the
//! packed point light stores its range in `position.w`:
//!
//!   light.position.xyz = world position
//!   light.position.w = distance
//!
//! These structs must exactly match the memory layout whenever their
//! representation is changed in shader code or vice versa. All fields are
//! `Vec4` sized because WebGPU aligns uniform struct members to 16 bytes.
use glam::{Vec3, Vec4};

use crate::{
    math_utils::srgb_to_linear,
    scene::{DirectionalLight, Fog, PointLight, StandardMaterial},
};

/// Marks a light without a shadow map in the packed shadow layer fields.
pub const NO_SHADOW: f32 = -1.0;

/// Rust struct with the same memory layout as `PackedDirectionalLight`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedDirectionalLight {
    pub direction: Vec4, // .xyz points from the light to the scene, .w is shadow layer.
    pub color: Vec4,     // linear color premultiplied by intensity, .w is 1 when enabled.
}

impl PackedDirectionalLight {
    pub fn new(light: &DirectionalLight, position: Vec3, shadow_layer: Option<u32>) -> Self {
        Self {
            direction: vec3_w(light.direction_from(position), layer_or_none(shadow_layer)),
            color: vec3_w(srgb_to_linear(light.color) * light.intensity, 1.0),
        }
    }
}

/// Rust struct with the same memory layout as `PackedPointLight`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedPointLight {
    pub position: Vec4, // .w is distance, zero for unlimited range.
    pub color: Vec4,    // linear color premultiplied by intensity, .w is decay.
    pub shadow: Vec4,   // .x is the first of six cube face layers, .y is bias.
}

impl PackedPointLight {
    pub fn new(light: &PointLight, position: Vec3, shadow_layer: Option<u32>) -> Self {
        Self {
            position: vec3_w(position, light.distance),
            color: vec3_w(srgb_to_linear(light.color) * light.intensity, light.decay),
            shadow: Vec4::new(layer_or_none(shadow_layer), light.shadow.bias, 0.0, 0.0),
        }
    }
}

/// Rust struct with the same memory layout as `PackedFog`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedFog {
    pub color: Vec4, // linear, .w is 1 when fog is enabled.
    pub range: Vec4, // .x near, .y far.
}

impl From<Option<&Fog>> for PackedFog {
    fn from(fog: Option<&Fog>) -> Self {
        match fog {
            Some(fog) => Self {
                color: vec3_w(srgb_to_linear(fog.color), 1.0),
                range: Vec4::new(fog.near, fog.far, 0.0, 0.0),
            },
            None => Self::default(),
        }
    }
}

/// Rust struct with the same memory layout as `PackedMaterialConstants`.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedMaterialConstants {
    pub color: Vec4,        // linear base color, .w is opacity.
    pub surface: Vec4,      // roughness, metalness, ao intensity, 1 if a normal map is set.
    pub displacement: Vec4, // .x scale, .y bias.
    pub uv_repeat: Vec4,    // .xy repeat of the primary uvs, .zw of the second uv set.
}

impl From<&StandardMaterial> for PackedMaterialConstants {
    fn from(material: &StandardMaterial) -> Self {
        let maps = &material.maps;

        // All maps except ambient occlusion share the transform of the first
        // assigned map, in the same priority order used for the base color.
        let primary = [
            &maps.color,
            &maps.displacement,
            &maps.normal,
            &maps.roughness,
            &maps.metalness,
            &maps.alpha,
        ]
        .into_iter()
        .flatten()
        .next()
        .map(|t| t.settings().repeat)
        .unwrap_or(glam::Vec2::ONE);

        let secondary = maps
            .ambient_occlusion
            .as_ref()
            .map(|t| t.settings().repeat)
            .unwrap_or(glam::Vec2::ONE);

        Self {
            color: vec3_w(srgb_to_linear(material.color), material.opacity),
            surface: Vec4::new(
                material.roughness,
                material.metalness,
                material.ao_map_intensity,
                if maps.normal.is_some() { 1.0 } else { 0.0 },
            ),
            displacement: Vec4::new(
                material.displacement_scale,
                material.displacement_bias,
                0.0,
                0.0,
            ),
            uv_repeat: Vec4::new(primary.x, primary.y, secondary.x, secondary.y),
        }
    }
}

fn layer_or_none(layer: Option<u32>) -> f32 {
    layer.map(|l| l as f32).unwrap_or(NO_SHADOW)
}

/// Returns a new `Vec4` value that is the combination of a `Vec3` x, y and z
/// and an additional `w` value.
pub fn vec3_w(xyz: Vec3, w: f32) -> Vec4 {
    Vec4::new(xyz.x, xyz.y, xyz.z, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::{tests::ManualLoader, TextureProvider, TextureSettings},
        scene::MaterialBuilder,
    };

    #[test]
    fn packed_structs_are_vec4_aligned() {
        assert_eq!(32, std::mem::size_of::<PackedDirectionalLight>());
        assert_eq!(48, std::mem::size_of::<PackedPointLight>());
        assert_eq!(32, std::mem::size_of::<PackedFog>());
        assert_eq!(64, std::mem::size_of::<PackedMaterialConstants>());
    }

    #[test]
    fn point_light_packs_range_and_decay() {
        let light = PointLight::new(0xff0000, 2.0).with_distance(7.0);
        let packed = PackedPointLight::new(&light, Vec3::new(1.0, 2.0, 3.0), Some(7));

        assert_eq!(Vec4::new(1.0, 2.0, 3.0, 7.0), packed.position);
        assert_eq!(Vec4::new(2.0, 0.0, 0.0, 1.0), packed.color);
        assert_eq!(7.0, packed.shadow.x);
    }

    #[test]
    fn lights_without_shadows_use_the_marker_layer() {
        let packed = PackedPointLight::new(&PointLight::new(0xffffff, 1.0), Vec3::ZERO, None);
        assert_eq!(NO_SHADOW, packed.shadow.x);
    }

    #[test]
    fn directional_light_points_at_its_target() {
        let light = DirectionalLight::new(0xffffff, 1.0);
        let packed = PackedDirectionalLight::new(&light, Vec3::new(0.0, 10.0, 0.0), Some(0));

        assert_eq!(Vec4::new(0.0, -1.0, 0.0, 0.0), packed.direction);
        assert_eq!(1.0, packed.color.w);
    }

    #[test]
    fn missing_fog_is_disabled() {
        assert_eq!(0.0, PackedFog::from(None).color.w);

        let fog = Fog::new(Vec3::ONE, 1.0, 15.0);
        let packed = PackedFog::from(Some(&fog));
        assert_eq!(1.0, packed.color.w);
        assert_eq!(Vec4::new(1.0, 15.0, 0.0, 0.0), packed.range);
    }

    #[test]
    fn material_constants_take_repeat_from_maps() {
        let mut provider = TextureProvider::with_loader(ManualLoader::default());
        let color = provider.load("grass/color.png", TextureSettings::srgb().tiled(8.0, 8.0));
        let ao = provider.load("grass/ao.png", TextureSettings::default().tiled(4.0, 2.0));

        let material = MaterialBuilder::new()
            .color_hex(0xffffff)
            .opacity(0.5)
            .map(color)
            .ao_map(ao)
            .build();

        let packed = PackedMaterialConstants::from(&material);
        assert_eq!(Vec4::new(8.0, 8.0, 4.0, 2.0), packed.uv_repeat);
        assert_eq!(0.5, packed.color.w);
        assert_eq!(0.0, packed.surface.w);
    }

    #[test]
    fn material_without_maps_does_not_repeat() {
        let packed = PackedMaterialConstants::from(&MaterialBuilder::new().build());
        assert_eq!(Vec4::new(1.0, 1.0, 1.0, 1.0), packed.uv_repeat);
        assert_eq!(Vec4::new(1.0, 0.0, 1.0, 0.0), packed.surface);
    }
}
