//! GPU copies of scene geometry.
//!
//! Geometry winding order is CCW with outward facing normals, matching the
//! back face culling used by the render pipelines.
use wgpu::util::DeviceExt;

use super::shaders::Vertex;
use crate::scene::Geometry;

/// Vertex and index buffers for one `Geometry`. Shared by every mesh node
/// that references the same geometry.
pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, geometry: &Geometry) -> Self {
        let label = format!("{:?}", geometry.shape());

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} vertex buffer")),
            contents: bytemuck::cast_slice(&interleave_vertices(geometry)),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} index buffer")),
            contents: bytemuck::cast_slice(geometry.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: geometry.indices().len() as u32,
        }
    }

    pub fn vertex_buffer(&self) -> &wgpu::Buffer {
        &self.vertex_buffer
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Pack the separate attribute arrays of `geometry` into vertices. Geometry
/// without a second uv set reuses its first one.
pub fn interleave_vertices(geometry: &Geometry) -> Vec<Vertex> {
    let uv2 = geometry.uv2().unwrap_or(geometry.uvs());

    geometry
        .positions()
        .iter()
        .zip(geometry.normals())
        .zip(geometry.uvs())
        .zip(uv2)
        .map(|(((position, normal), uv), uv2)| Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
            uv2: uv2.to_array(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_vertex_is_interleaved() {
        let geometry = Geometry::sphere(1.0, 16, 16);
        let vertices = interleave_vertices(&geometry);

        assert_eq!(geometry.vertex_count(), vertices.len());
        assert_eq!(geometry.positions()[5].to_array(), vertices[5].position);
        assert_eq!(geometry.normals()[5].to_array(), vertices[5].normal);
    }

    #[test]
    fn missing_uv2_falls_back_to_uv() {
        let vertices = interleave_vertices(&Geometry::cuboid(1.0, 1.0, 1.0));
        assert!(vertices.iter().all(|v| v.uv == v.uv2));
    }

    #[test]
    fn uv2_is_used_when_present() {
        let geometry = Geometry::plane(20.0, 20.0, 1, 1).with_uv2();
        let vertices = interleave_vertices(&geometry);

        let uv2 = geometry.uv2().unwrap();
        for (vertex, expected) in vertices.iter().zip(uv2) {
            assert_eq!(expected.to_array(), vertex.uv2);
        }
    }
}
