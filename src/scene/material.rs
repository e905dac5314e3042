use glam::Vec3;

use crate::{assets::TextureHandle, math_utils::rgb_hex};

/// Texture slots of a `StandardMaterial`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MapSlot {
    Color,
    Alpha,
    AmbientOcclusion,
    Displacement,
    Normal,
    Metalness,
    Roughness,
}

impl MapSlot {
    /// Every slot in binding order.
    pub const ALL: [MapSlot; 7] = [
        MapSlot::Color,
        MapSlot::Alpha,
        MapSlot::AmbientOcclusion,
        MapSlot::Displacement,
        MapSlot::Normal,
        MapSlot::Metalness,
        MapSlot::Roughness,
    ];
}

/// Optional texture maps that modulate a material's constant properties.
#[derive(Clone, Debug, Default)]
pub struct MaterialMaps {
    pub color: Option<TextureHandle>,
    pub alpha: Option<TextureHandle>,
    pub ambient_occlusion: Option<TextureHandle>,
    pub displacement: Option<TextureHandle>,
    pub normal: Option<TextureHandle>,
    pub metalness: Option<TextureHandle>,
    pub roughness: Option<TextureHandle>,
}

impl MaterialMaps {
    pub fn get(&self, slot: MapSlot) -> Option<&TextureHandle> {
        match slot {
            MapSlot::Color => self.color.as_ref(),
            MapSlot::Alpha => self.alpha.as_ref(),
            MapSlot::AmbientOcclusion => self.ambient_occlusion.as_ref(),
            MapSlot::Displacement => self.displacement.as_ref(),
            MapSlot::Normal => self.normal.as_ref(),
            MapSlot::Metalness => self.metalness.as_ref(),
            MapSlot::Roughness => self.roughness.as_ref(),
        }
    }

    /// Sum of the versions of every assigned map. Changes whenever one of the
    /// maps finishes loading.
    pub fn version(&self) -> u64 {
        MapSlot::ALL
            .iter()
            .filter_map(|slot| self.get(*slot))
            .map(|t| t.version())
            .sum()
    }
}

/// A physically based material with metalness and roughness parameters.
///
/// Constant values are multiplied with the matching texture map when one is
/// set, so a metalness of zero disables a metalness map.
#[derive(Clone, Debug)]
pub struct StandardMaterial {
    /// Base color in sRGB.
    pub color: Vec3,
    pub opacity: f32,
    pub roughness: f32,
    pub metalness: f32,
    /// Blend with whatever was drawn behind instead of overwriting it. Needed
    /// for alpha maps to have a visible effect.
    pub transparent: bool,
    pub ao_map_intensity: f32,
    /// Distance vertices are pushed along their normal for a white
    /// displacement texel.
    pub displacement_scale: f32,
    pub displacement_bias: f32,
    pub maps: MaterialMaps,
}

impl StandardMaterial {
    /// Ambient occlusion is sampled with the second uv channel so any mesh
    /// using this material needs one.
    pub fn requires_uv2(&self) -> bool {
        self.maps.ambient_occlusion.is_some()
    }
}

/// A fluent builder for creating `StandardMaterial`s without having to specify
/// every optional property.
#[derive(Debug, Default)]
pub struct MaterialBuilder {
    color: Option<Vec3>,
    opacity: Option<f32>,
    roughness: Option<f32>,
    metalness: Option<f32>,
    transparent: bool,
    ao_map_intensity: Option<f32>,
    displacement_scale: Option<f32>,
    displacement_bias: Option<f32>,
    maps: MaterialMaps,
}

impl MaterialBuilder {
    pub const DEFAULT_COLOR: Vec3 = Vec3::ONE;
    pub const DEFAULT_ROUGHNESS: f32 = 1.0;
    pub const DEFAULT_METALNESS: f32 = 0.0;
    pub const DEFAULT_DISPLACEMENT_SCALE: f32 = 1.0;

    pub fn new() -> Self {
        Default::default()
    }

    /// Set the base color from a packed `0xRRGGBB` value.
    pub fn color_hex(self, hex: u32) -> Self {
        self.color(rgb_hex(hex))
    }

    pub fn color(mut self, color: Vec3) -> Self {
        self.color = Some(color);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn roughness(mut self, roughness: f32) -> Self {
        self.roughness = Some(roughness);
        self
    }

    pub fn metalness(mut self, metalness: f32) -> Self {
        self.metalness = Some(metalness);
        self
    }

    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn ao_map_intensity(mut self, intensity: f32) -> Self {
        self.ao_map_intensity = Some(intensity);
        self
    }

    pub fn displacement_scale(mut self, scale: f32) -> Self {
        self.displacement_scale = Some(scale);
        self
    }

    pub fn displacement_bias(mut self, bias: f32) -> Self {
        self.displacement_bias = Some(bias);
        self
    }

    /// Set the color texture map.
    pub fn map(mut self, texture: TextureHandle) -> Self {
        self.maps.color = Some(texture);
        self
    }

    pub fn alpha_map(mut self, texture: TextureHandle) -> Self {
        self.maps.alpha = Some(texture);
        self
    }

    pub fn ao_map(mut self, texture: TextureHandle) -> Self {
        self.maps.ambient_occlusion = Some(texture);
        self
    }

    pub fn displacement_map(mut self, texture: TextureHandle) -> Self {
        self.maps.displacement = Some(texture);
        self
    }

    pub fn normal_map(mut self, texture: TextureHandle) -> Self {
        self.maps.normal = Some(texture);
        self
    }

    pub fn metalness_map(mut self, texture: TextureHandle) -> Self {
        self.maps.metalness = Some(texture);
        self
    }

    pub fn roughness_map(mut self, texture: TextureHandle) -> Self {
        self.maps.roughness = Some(texture);
        self
    }

    /// Use the properties of this builder to construct a new material.
    pub fn build(self) -> StandardMaterial {
        StandardMaterial {
            color: self.color.unwrap_or(Self::DEFAULT_COLOR),
            opacity: self.opacity.unwrap_or(1.0),
            roughness: self.roughness.unwrap_or(Self::DEFAULT_ROUGHNESS),
            metalness: self.metalness.unwrap_or(Self::DEFAULT_METALNESS),
            transparent: self.transparent,
            ao_map_intensity: self.ao_map_intensity.unwrap_or(1.0),
            displacement_scale: self
                .displacement_scale
                .unwrap_or(Self::DEFAULT_DISPLACEMENT_SCALE),
            displacement_bias: self.displacement_bias.unwrap_or(0.0),
            maps: self.maps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{tests::ManualLoader, TextureProvider, TextureSettings};

    #[test]
    fn unset_properties_use_defaults() {
        let material = MaterialBuilder::new().build();

        assert_eq!(MaterialBuilder::DEFAULT_COLOR, material.color);
        assert_eq!(1.0, material.roughness);
        assert_eq!(0.0, material.metalness);
        assert_eq!(1.0, material.opacity);
        assert!(!material.transparent);
        assert!(!material.requires_uv2());
    }

    #[test]
    fn ao_map_requires_second_uv_channel() {
        let mut provider = TextureProvider::with_loader(ManualLoader::default());
        let ao = provider.load("textures/bricks/ambientOcclusion.png", TextureSettings::default());

        let material = MaterialBuilder::new().color_hex(0xb35f45).ao_map(ao).build();

        assert!(material.requires_uv2());
        assert!(material.maps.get(MapSlot::AmbientOcclusion).is_some());
        assert!(material.maps.get(MapSlot::Color).is_none());
    }
}
