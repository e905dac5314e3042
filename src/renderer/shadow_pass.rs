use tracing::debug;

use super::{
    meshes::GpuMesh,
    models::{DrawModel, Model},
    shaders::{BindGroupLayouts, ShadowViewBufferData, Vertex, SHADOW_LAYERS},
    shading::ShadowView,
    uniforms_buffers::{GenericUniformBuffer, UniformBuffer},
};

/// Renders shadow casters into an array of depth maps, one layer per light
/// camera, and provides the array to the standard shader for lookups.
pub struct ShadowPass {
    map_size: u32,
    /// Shadow map layers written to by the GPU.
    _depth_texture: wgpu::Texture,
    /// All layers, for sampling in the standard shader.
    array_view: wgpu::TextureView,
    /// One view per layer, for rendering.
    layer_views: Vec<wgpu::TextureView>,
    /// Compares against stored depth with hardware filtering.
    sampler: wgpu::Sampler,
    /// The light camera of each layer.
    layer_uniforms: Vec<GenericUniformBuffer<ShadowViewBufferData>>,
    render_pipeline: wgpu::RenderPipeline,
}

impl ShadowPass {
    pub const DEPTH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a new shadow pass. Only one instance is needed per renderer.
    pub fn new(device: &wgpu::Device, layouts: &BindGroupLayouts, map_size: u32) -> Self {
        let (depth_texture, array_view, layer_views) = Self::create_depth_texture(device, map_size);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow map sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let layer_uniforms = (0..SHADOW_LAYERS)
            .map(|layer| {
                GenericUniformBuffer::new(
                    device,
                    Some(&format!("shadow layer {layer} uniforms")),
                    Default::default(),
                    &layouts.shadow_view_layout,
                )
            })
            .collect();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shadow shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/shadow.wgsl").into()),
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shadow pass render pipeline"),
            layout: Some(
                &device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("shadow pass pipeline layout"),
                    bind_group_layouts: &[&layouts.shadow_view_layout, &layouts.per_model_layout],
                    push_constant_ranges: &[],
                }),
            ),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[Vertex::desc()],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Back faces go into the shadow map which keeps lit front
                // faces from shadowing themselves.
                cull_mode: Some(wgpu::Face::Front),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: Self::DEPTH_TEXTURE_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: None,
            multiview: None,
        });

        Self {
            map_size,
            _depth_texture: depth_texture,
            array_view,
            layer_views,
            sampler,
            layer_uniforms,
            render_pipeline,
        }
    }

    pub fn map_size(&self) -> u32 {
        self.map_size
    }

    /// Recreate the shadow maps with `map_size` texels per side. Bind groups
    /// holding the old `array_view` must be recreated afterwards.
    pub fn resize(&mut self, device: &wgpu::Device, map_size: u32) {
        debug!("resizing shadow maps to {map_size} x {map_size}");

        let (depth_texture, array_view, layer_views) = Self::create_depth_texture(device, map_size);
        self._depth_texture = depth_texture;
        self.array_view = array_view;
        self.layer_views = layer_views;
        self.map_size = map_size;
    }

    pub fn array_view(&self) -> &wgpu::TextureView {
        &self.array_view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Copy light cameras to the GPU. Must be called before `draw`.
    pub fn prepare(&mut self, queue: &wgpu::Queue, views: &[ShadowView]) {
        for view in views {
            let uniforms = &mut self.layer_uniforms[view.layer as usize];
            uniforms.values_mut().view_projection = view.view_projection;
            uniforms.update_gpu(queue);
        }
    }

    /// Render `casters` into the layer of every view.
    pub fn draw(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        views: &[ShadowView],
        casters: &[(&Model, &GpuMesh)],
    ) {
        for view in views {
            let layer = view.layer as usize;

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.layer_views[layer],
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(0, self.layer_uniforms[layer].bind_group(), &[]);

            for &(model, mesh) in casters {
                render_pass.set_bind_group(1, model.uniforms().bind_group(), &[]);
                render_pass.draw_mesh(mesh);
            }
        }
    }

    fn create_depth_texture(
        device: &wgpu::Device,
        map_size: u32,
    ) -> (wgpu::Texture, wgpu::TextureView, Vec<wgpu::TextureView>) {
        // `RENDER_ATTACHMENT` lets each layer be drawn into and
        // `TEXTURE_BINDING` lets the standard shader read it back.
        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow maps"),
            size: wgpu::Extent3d {
                width: map_size,
                height: map_size,
                depth_or_array_layers: SHADOW_LAYERS as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let array_view = depth_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow map array view"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });

        let layer_views = (0..SHADOW_LAYERS as u32)
            .map(|layer| {
                depth_texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("shadow map layer view"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        (depth_texture, array_view, layer_views)
    }
}
