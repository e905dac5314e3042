use std::{collections::HashMap, rc::Rc};

use tracing::debug;

use super::{
    shaders::{
        material_sampler_binding, material_texture_binding, packed_structs::PackedMaterialConstants,
        BindGroupLayouts, MaterialUniforms,
    },
    textures::Texture,
};
use crate::{
    assets::{TextureHandle, TextureId},
    scene::{MapSlot, StandardMaterial},
};

/// Texel bound in place of a map that is unassigned, still loading or failed
/// to load. Each value leaves the material's constant properties unchanged.
pub fn default_texel(slot: MapSlot) -> [u8; 4] {
    match slot {
        // A tangent space normal pointing straight out of the surface.
        MapSlot::Normal => [128, 128, 255, 255],
        // No displacement.
        MapSlot::Displacement => [0, 0, 0, 255],
        MapSlot::Color
        | MapSlot::Alpha
        | MapSlot::AmbientOcclusion
        | MapSlot::Metalness
        | MapSlot::Roughness => [255, 255, 255, 255],
    }
}

/// 1x1 textures bound to material slots with nothing better to show.
pub struct DefaultTextures {
    white: Texture,
    flat_normal: Texture,
    black: Texture,
}

impl DefaultTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            white: Texture::solid_color(
                device,
                queue,
                default_texel(MapSlot::Color),
                Some("default white texture"),
            ),
            flat_normal: Texture::solid_color(
                device,
                queue,
                default_texel(MapSlot::Normal),
                Some("default normal texture"),
            ),
            black: Texture::solid_color(
                device,
                queue,
                default_texel(MapSlot::Displacement),
                Some("default displacement texture"),
            ),
        }
    }

    pub fn for_slot(&self, slot: MapSlot) -> &Texture {
        match slot {
            MapSlot::Normal => &self.flat_normal,
            MapSlot::Displacement => &self.black,
            _ => &self.white,
        }
    }
}

/// GPU resources for one `StandardMaterial`.
pub struct GpuMaterial {
    uniforms: MaterialUniforms,
    /// Value of `MaterialMaps::version` when the bind group was built.
    maps_version: u64,
}

impl GpuMaterial {
    pub fn uniforms(&self) -> &MaterialUniforms {
        &self.uniforms
    }
}

struct UploadedTexture {
    version: u64,
    texture: Texture,
}

/// Uploads material textures and keeps material bind groups up to date as
/// their maps finish loading.
pub struct MaterialCache {
    defaults: DefaultTextures,
    textures: HashMap<TextureId, UploadedTexture>,
    /// Keyed by the address of the shared material. The `Rc` is kept so the
    /// address cannot be reused while the entry exists.
    materials: HashMap<usize, (Rc<StandardMaterial>, GpuMaterial)>,
}

impl MaterialCache {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            defaults: DefaultTextures::new(device, queue),
            textures: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    /// Make sure `material` has an up to date bind group.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &BindGroupLayouts,
        material: &Rc<StandardMaterial>,
    ) {
        let key = material_key(material);
        let version = material.maps.version();

        if matches!(self.materials.get(&key), Some((_, gpu)) if gpu.maps_version == version) {
            return;
        }

        for slot in MapSlot::ALL {
            if let Some(handle) = material.maps.get(slot) {
                self.upload_texture(device, queue, handle);
            }
        }

        let gpu_material = self.create_material(device, layouts, material, version);
        self.materials.insert(key, (material.clone(), gpu_material));
    }

    pub fn get(&self, material: &Rc<StandardMaterial>) -> Option<&GpuMaterial> {
        self.materials
            .get(&material_key(material))
            .map(|(_, gpu)| gpu)
    }

    fn upload_texture(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, handle: &TextureHandle) {
        let Some(image) = handle.image() else {
            return;
        };

        let current = self.textures.get(&handle.id()).map(|t| t.version);

        if current != Some(handle.version()) {
            debug!(
                "uploading texture {} ({} x {})",
                handle.path(),
                image.width(),
                image.height()
            );

            let texture =
                Texture::from_image(device, queue, &image, &handle.settings(), Some(handle.path()));

            self.textures.insert(
                handle.id(),
                UploadedTexture {
                    version: handle.version(),
                    texture,
                },
            );
        }
    }

    fn create_material(
        &self,
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        material: &StandardMaterial,
        maps_version: u64,
    ) -> GpuMaterial {
        let textures: Vec<&Texture> = MapSlot::ALL
            .iter()
            .map(|slot| {
                material
                    .maps
                    .get(*slot)
                    .and_then(|handle| self.textures.get(&handle.id()))
                    .map(|uploaded| &uploaded.texture)
                    .unwrap_or_else(|| self.defaults.for_slot(*slot))
            })
            .collect();

        let mut entries = Vec::with_capacity(textures.len() * 2);

        for (index, texture) in textures.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: material_texture_binding(index),
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: material_sampler_binding(index),
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }

        GpuMaterial {
            uniforms: MaterialUniforms::with_entries(
                device,
                Some("material uniforms"),
                PackedMaterialConstants::from(material),
                &layouts.material_layout,
                &entries,
            ),
            maps_version,
        }
    }
}

fn material_key(material: &Rc<StandardMaterial>) -> usize {
    Rc::as_ptr(material) as usize
}
