use glam::Mat4;

use super::{
    materials::GpuMaterial,
    meshes::GpuMesh,
    shaders::{BindGroupLayouts, PerModelUniforms},
    uniforms_buffers::UniformBuffer,
};

/// GPU state for one mesh node. The node's geometry and material are shared
/// with other nodes and live in their own caches.
pub struct Model {
    uniforms: PerModelUniforms,
}

impl Model {
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts, name: &str) -> Self {
        Self {
            uniforms: PerModelUniforms::new(device, layouts, name),
        }
    }

    pub fn uniforms(&self) -> &PerModelUniforms {
        &self.uniforms
    }

    /// Copy the node's latest transform and shadow flag. Unchanged values do
    /// not mark the uniforms dirty.
    pub fn update(&mut self, local_to_world: Mat4, receive_shadow: bool) {
        let values = *self.uniforms.buffer.values();

        if values.local_to_world != local_to_world {
            self.uniforms.set_local_to_world(local_to_world);
        }

        if (values.flags.x > 0.5) != receive_shadow {
            self.uniforms.set_receive_shadow(receive_shadow);
        }
    }

    /// Send any changed uniform values to the GPU.
    pub fn prepare(&self, queue: &wgpu::Queue) {
        if self.uniforms.is_dirty() {
            self.uniforms.update_gpu(queue);
        }
    }
}

/// A trait for types that are capable of rendering models and meshes.
pub trait DrawModel<'a> {
    fn draw_model(&mut self, model: &'a Model, mesh: &'a GpuMesh, material: &'a GpuMaterial);
    fn draw_mesh(&mut self, mesh: &'a GpuMesh);
}

impl<'rpass, 'a> DrawModel<'a> for wgpu::RenderPass<'rpass>
where
    'a: 'rpass,
{
    fn draw_model(&mut self, model: &'a Model, mesh: &'a GpuMesh, material: &'a GpuMaterial) {
        debug_assert!(!model.uniforms.is_dirty());

        self.set_bind_group(1, model.uniforms.bind_group(), &[]);
        self.set_bind_group(2, material.uniforms().bind_group(), &[]);
        self.draw_mesh(mesh);
    }

    fn draw_mesh(&mut self, mesh: &'a GpuMesh) {
        self.set_vertex_buffer(0, mesh.vertex_buffer().slice(..));
        self.set_index_buffer(mesh.index_buffer().slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count(), 0, 0..1);
    }
}
