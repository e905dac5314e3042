pub mod packed_structs;

use glam::{Mat4, Vec3, Vec4};

use packed_structs::{
    vec3_w, PackedDirectionalLight, PackedFog, PackedMaterialConstants, PackedPointLight,
};

use super::uniforms_buffers::{GenericUniformBuffer, UniformBuffer};
use crate::scene::MapSlot;

/// Most point lights the standard shader can light a fragment with.
pub const MAX_POINT_LIGHTS: usize = 4;

/// Shadow map layers: one for the directional light and six cube faces for
/// each point light.
pub const SHADOW_LAYERS: usize = 1 + MAX_POINT_LIGHTS * 6;

/// Per-frame uniform values used by the standard shader model.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerFrameBufferData {
    pub view_projection: Mat4,
    pub view: Mat4,
    pub view_pos: Vec4, // .w is 1 when the output backbuffer is sRGB.
    pub ambient: Vec4,  // linear color premultiplied by intensity.
    pub fog: PackedFog,
    pub directional: PackedDirectionalLight,
    pub point_lights: [PackedPointLight; MAX_POINT_LIGHTS],
    pub point_light_count: u32,
    pub shadow_map_size: f32,
    pub _padding: [f32; 2],
    pub shadow_matrices: [Mat4; SHADOW_LAYERS],
}

/// Responsible for storing per-frame shader uniform values and copying them
/// to a GPU backed buffer accessible to shaders.
///
/// The per-frame bind group also carries the shadow map array and its
/// comparison sampler so the bind group is recreated together with the
/// shadow maps.
pub struct PerFrameUniforms {
    pub buffer: GenericUniformBuffer<PerFrameBufferData>,
}

impl PerFrameUniforms {
    pub fn new(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        shadow_view: &wgpu::TextureView,
        shadow_sampler: &wgpu::Sampler,
    ) -> Self {
        Self {
            buffer: GenericUniformBuffer::with_entries(
                device,
                Some("per-frame uniforms"),
                Default::default(),
                &layouts.per_frame_layout,
                &[
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(shadow_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(shadow_sampler),
                    },
                ],
            ),
        }
    }

    /// Set the camera's view and projection.
    pub fn set_camera(&mut self, view: Mat4, view_projection: Mat4, position: Vec3) {
        let values = self.buffer.values_mut();
        values.view = view;
        values.view_projection = view_projection;
        values.view_pos = vec3_w(position, values.view_pos.w);
    }

    /// Set if the output backbuffer format is SRGB or not.
    pub fn set_output_is_srgb(&mut self, is_srgb: bool) {
        self.buffer.values_mut().view_pos.w = if is_srgb { 1.0 } else { 0.0 };
    }

    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.buffer.values_mut().ambient = vec3_w(ambient, 0.0);
    }

    pub fn set_fog(&mut self, fog: PackedFog) {
        self.buffer.values_mut().fog = fog;
    }

    /// Set the directional light, or disable it with `None`.
    pub fn set_directional_light(&mut self, light: Option<PackedDirectionalLight>) {
        self.buffer.values_mut().directional = light.unwrap_or_default();
    }

    /// Replace the point lights. Lights past `MAX_POINT_LIGHTS` are dropped.
    pub fn set_point_lights(&mut self, lights: &[PackedPointLight]) {
        let count = lights.len().min(MAX_POINT_LIGHTS);
        let values = self.buffer.values_mut();

        values.point_lights = Default::default();
        values.point_lights[..count].copy_from_slice(&lights[..count]);
        values.point_light_count = count as u32;
    }

    pub fn set_shadow_map_size(&mut self, size: u32) {
        self.buffer.values_mut().shadow_map_size = size as f32;
    }

    pub fn set_shadow_matrix(&mut self, layer: usize, view_projection: Mat4) {
        self.buffer.values_mut().shadow_matrices[layer] = view_projection;
    }
}

impl UniformBuffer for PerFrameUniforms {
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.buffer.update_gpu(queue)
    }

    fn bind_group(&self) -> &wgpu::BindGroup {
        self.buffer.bind_group()
    }

    fn is_dirty(&self) -> bool {
        self.buffer.is_dirty()
    }
}

/// Per-model uniform values shared by the standard and shadow shaders.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PerModelBufferData {
    pub local_to_world: Mat4,
    pub normal_matrix: Mat4,
    pub flags: Vec4, // .x is 1 when the model receives shadows.
}

/// Responsible for storing per-model shader uniform values and copying them
/// to a GPU backed buffer accessible to shaders.
#[derive(Debug)]
pub struct PerModelUniforms {
    pub buffer: GenericUniformBuffer<PerModelBufferData>,
}

impl PerModelUniforms {
    /// Create a new PerModelUniforms object. One instance per mesh node.
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts, label: &str) -> Self {
        Self {
            buffer: GenericUniformBuffer::new(
                device,
                Some(&format!("{label} per-model uniforms")),
                Default::default(),
                &layouts.per_model_layout,
            ),
        }
    }

    /// Set local to world transform matrix, and the matching normal matrix.
    pub fn set_local_to_world(&mut self, local_to_world: Mat4) {
        let values = self.buffer.values_mut();
        values.local_to_world = local_to_world;
        values.normal_matrix = local_to_world.inverse().transpose();
    }

    pub fn set_receive_shadow(&mut self, receive_shadow: bool) {
        self.buffer.values_mut().flags.x = if receive_shadow { 1.0 } else { 0.0 };
    }
}

impl UniformBuffer for PerModelUniforms {
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.buffer.update_gpu(queue)
    }

    fn bind_group(&self) -> &wgpu::BindGroup {
        self.buffer.bind_group()
    }

    fn is_dirty(&self) -> bool {
        self.buffer.is_dirty()
    }
}

/// The light camera used when rendering one shadow map layer.
#[repr(C)]
#[derive(Clone, Copy, Default, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowViewBufferData {
    pub view_projection: Mat4,
}

/// Material constants are bound at slot 0 of the material bind group, with
/// every `MapSlot` adding a texture and a sampler after it.
pub type MaterialUniforms = GenericUniformBuffer<PackedMaterialConstants>;

/// Binding of the texture for the `index`th entry of `MapSlot::ALL`.
pub fn material_texture_binding(index: usize) -> u32 {
    1 + 2 * index as u32
}

/// Binding of the sampler for the `index`th entry of `MapSlot::ALL`.
pub fn material_sampler_binding(index: usize) -> u32 {
    2 + 2 * index as u32
}

/// A registry of bind group layouts used by this renderer.
pub struct BindGroupLayouts {
    pub per_frame_layout: wgpu::BindGroupLayout,
    pub per_model_layout: wgpu::BindGroupLayout,
    pub material_layout: wgpu::BindGroupLayout,
    pub shadow_view_layout: wgpu::BindGroupLayout,
}

impl BindGroupLayouts {
    /// Create a new bind group layout registry.
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            per_frame_layout: device.create_bind_group_layout(&Self::per_frame_desc()),
            per_model_layout: device.create_bind_group_layout(&Self::uniform_desc(
                "per-model bind group layout",
            )),
            material_layout: device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("material bind group layout"),
                entries: &Self::material_entries(),
            }),
            shadow_view_layout: device.create_bind_group_layout(&Self::uniform_desc(
                "shadow view bind group layout",
            )),
        }
    }

    /// Gets the bind group layout describing any instance of `PerFrameUniforms`.
    ///
    /// Expected bind group inputs:
    ///  0 - per-frame uniforms
    ///  1 - shadow map array
    ///  2 - shadow map comparison sampler
    pub fn per_frame_desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some("per-frame bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        }
    }

    /// A layout holding a single uniform buffer at slot 0.
    pub fn uniform_desc(label: &'static str) -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        }
    }

    /// Material constants followed by a texture and sampler per map slot. The
    /// vertex stage needs the maps too for displacement.
    pub fn material_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];

        for index in 0..MapSlot::ALL.len() {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: material_texture_binding(index),
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: material_sampler_binding(index),
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                // This needs to match the filterable field for the texture
                // from above.
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }

        entries
    }
}

/// Mesh vertex.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub uv2: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x2,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_frame_data_is_vec4_aligned() {
        let size = std::mem::size_of::<PerFrameBufferData>();
        assert_eq!(0, size % 16);
        assert_eq!(
            64 * 2 + 16 * 2 + 32 + 32 + 48 * MAX_POINT_LIGHTS + 16 + 64 * SHADOW_LAYERS,
            size
        );
    }

    #[test]
    fn per_model_data_is_vec4_aligned() {
        assert_eq!(144, std::mem::size_of::<PerModelBufferData>());
    }

    #[test]
    fn vertex_layout_covers_every_attribute() {
        let desc = Vertex::desc();
        assert_eq!(40, desc.array_stride);
        assert_eq!(4, desc.attributes.len());
        assert_eq!(32, desc.attributes[3].offset);
    }

    #[test]
    fn material_bindings_follow_the_constants() {
        let entries = BindGroupLayouts::material_entries();
        assert_eq!(1 + 2 * MapSlot::ALL.len(), entries.len());

        for (index, entry) in entries.iter().enumerate() {
            assert_eq!(index as u32, entry.binding);
        }

        assert_eq!(13, material_texture_binding(6));
        assert_eq!(14, material_sampler_binding(6));
    }
}
