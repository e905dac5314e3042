use std::cell::Cell;

/// A trait for WGPU objects that represent uniform buffers used by shaders with
/// CPU side storage of values that can be copied back to the GPU.
pub trait UniformBuffer {
    /// Copy data stored in this uniform buffer to the GPU.
    ///
    /// Updating the GPU will also clear the dirty flag on this buffer.
    fn update_gpu(&self, queue: &wgpu::Queue);

    /// Get the bind group representing this uniform buffer.
    fn bind_group(&self) -> &wgpu::BindGroup;

    /// Check if the uniform buffer values are out of sync with the GPU.
    fn is_dirty(&self) -> bool;
}

/// A utility struct that simplifies mapping a Rust struct of uniform values to
/// a wgpu uniform value accessible via shader.
///
/// The uniform values always live at binding 0 of the bind group. Layouts that
/// pair the uniforms with textures or samplers pass those in as
/// `extra_entries`, which are appended after the buffer.
#[derive(Debug)]
pub struct GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    values: T,
    gpu_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// True if `values` is potentially out of sync with the GPU buffer.
    is_dirty: Cell<bool>,
}

impl<T> GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    /// Create a new uniform buffer whose bind group only holds the buffer.
    pub fn new(
        device: &wgpu::Device,
        label: Option<&str>,
        values: T,
        bind_group_layout: &wgpu::BindGroupLayout,
    ) -> Self {
        Self::with_entries(device, label, values, bind_group_layout, &[])
    }

    /// Create a new uniform buffer bound at slot 0 followed by `extra_entries`.
    pub fn with_entries(
        device: &wgpu::Device,
        label: Option<&str>,
        values: T,
        bind_group_layout: &wgpu::BindGroupLayout,
        extra_entries: &[wgpu::BindGroupEntry],
    ) -> Self {
        let gpu_buffer = wgpu::util::DeviceExt::create_buffer_init(
            device,
            &wgpu::util::BufferInitDescriptor {
                label,
                contents: bytemuck::bytes_of(&values),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            },
        );

        let mut entries = Vec::with_capacity(extra_entries.len() + 1);
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: gpu_buffer.as_entire_binding(),
        });
        entries.extend(extra_entries.iter().cloned());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout: bind_group_layout,
            entries: &entries,
        });

        Self {
            values,
            gpu_buffer,
            bind_group,
            is_dirty: Cell::new(false),
        }
    }

    /// Access the values stored in this uniform buffer.
    pub fn values(&self) -> &T {
        &self.values
    }

    /// Access the values stored in this uniform buffer with a mutable ref.
    ///
    /// Calling this method will set the buffer's dirty flag even if no values
    /// are changed.
    pub fn values_mut(&mut self) -> &mut T {
        self.is_dirty.set(true);
        &mut self.values
    }
}

impl<T> UniformBuffer for GenericUniformBuffer<T>
where
    T: Clone + Copy + std::fmt::Debug + bytemuck::Pod + bytemuck::Zeroable,
{
    fn update_gpu(&self, queue: &wgpu::Queue) {
        self.is_dirty.set(false);
        queue.write_buffer(&self.gpu_buffer, 0, bytemuck::bytes_of(&self.values));
    }

    fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    fn is_dirty(&self) -> bool {
        self.is_dirty.get()
    }
}
