mod materials;
mod meshes;
mod models;
mod shaders;
mod shading;
mod shadow_pass;
mod textures;
mod uniforms_buffers;

use std::{collections::HashMap, sync::Arc};

use anyhow::Context;
use glam::Vec3;
use tracing::{debug, error, info, warn};
use winit::window::Window;

use crate::{
    camera::Camera,
    frame::SceneRenderer,
    math_utils::srgb_to_linear,
    scene::{GeometryId, NodeId, Scene},
};

use materials::MaterialCache;
use meshes::GpuMesh;
use models::{DrawModel, Model};
use shaders::{packed_structs::PackedFog, BindGroupLayouts, PerFrameUniforms, Vertex};
use shading::{DrawItem, DrawList, FrameLights};
use shadow_pass::ShadowPass;
use textures::Texture;
use uniforms_buffers::UniformBuffer;

/// Shadow map resolution used until a light asks for something else.
const DEFAULT_SHADOW_MAP_SIZE: u32 = 512;

/// Draws a `Scene` into the window's surface. GPU copies of geometry,
/// materials and node transforms are created the first time a node is drawn
/// and kept in sync afterwards.
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    layouts: BindGroupLayouts,
    depth_texture: Texture,
    per_frame_uniforms: PerFrameUniforms,
    shadow_pass: ShadowPass,
    opaque_pipeline: wgpu::RenderPipeline,
    transparent_pipeline: wgpu::RenderPipeline,
    meshes: HashMap<GeometryId, GpuMesh>,
    materials: MaterialCache,
    models: HashMap<NodeId, Model>,
    /// The surface holds a reference to the window so it is kept alive here
    /// for as long as the renderer exists.
    window: Arc<Window>,
}

impl Renderer {
    /// Create a renderer drawing into `window` with a `width` x `height`
    /// backbuffer.
    pub async fn new(window: Arc<Window>, width: u32, height: u32) -> anyhow::Result<Self> {
        // Create a WGPU instance that can use any supported graphics API.
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        // Create the main rendering surface and then get an adapter that acts
        // as the handle to one of the machine's physical GPU(s).
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create rendering surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("no graphics adapter can draw to the window"))?;

        info!("using graphics adapter {:?}", adapter.get_info());

        // Get a communication channel to the graphics card and a queue for
        // submitting commands to.
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: if cfg!(target_arch = "wasm32") {
                        wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
                    } else {
                        wgpu::Limits::default()
                    },
                    label: None,
                },
                None,
            )
            .await
            .context("failed to open the graphics device")?;

        // Prefer an sRGB backbuffer. The standard shader encodes its own
        // output when the surface has no sRGB format.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("rendering surface reports no texture formats")?;

        if surface_format.is_srgb() {
            info!("rendering surface supports sRGB");
        } else {
            info!("no sRGB support found for the main rendering surface, shaders will encode output");
        }

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);

        let layouts = BindGroupLayouts::new(&device);

        // Create a depth buffer to ensure fragments are correctly rendered
        // back to front.
        let depth_texture =
            Texture::create_depth_texture(&device, &surface_config, Some("depth buffer"));

        let shadow_pass = ShadowPass::new(&device, &layouts, DEFAULT_SHADOW_MAP_SIZE);

        let mut per_frame_uniforms = PerFrameUniforms::new(
            &device,
            &layouts,
            shadow_pass.array_view(),
            shadow_pass.sampler(),
        );
        per_frame_uniforms.set_output_is_srgb(surface_format.is_srgb());
        per_frame_uniforms.set_shadow_map_size(shadow_pass.map_size());

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("standard shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("renderer/shaders/standard.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("standard pipeline layout"),
            bind_group_layouts: &[
                &layouts.per_frame_layout,
                &layouts.per_model_layout,
                &layouts.material_layout,
            ],
            push_constant_ranges: &[],
        });

        let opaque_pipeline = create_standard_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            wgpu::BlendState::REPLACE,
            "opaque render pipeline",
        );

        let transparent_pipeline = create_standard_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            wgpu::BlendState::ALPHA_BLENDING,
            "transparent render pipeline",
        );

        let materials = MaterialCache::new(&device, &queue);

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            layouts,
            depth_texture,
            per_frame_uniforms,
            shadow_pass,
            opaque_pipeline,
            transparent_pipeline,
            meshes: HashMap::new(),
            materials,
            models: HashMap::new(),
            window,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Resize the backbuffer and depth buffer. Zero sized requests are
    /// ignored since surfaces cannot be empty.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            warn!("invalid width of {width} or height {height} when resizing");
            return;
        }

        debug!("resizing backbuffer to {width} x {height}");

        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);

        self.depth_texture =
            Texture::create_depth_texture(&self.device, &self.surface_config, Some("depth buffer"));
    }

    /// Render one frame of `scene` from the point of view of `camera`.
    pub fn render_scene(&mut self, scene: &Scene, camera: &Camera) -> Result<(), wgpu::SurfaceError> {
        let view_matrix = camera.view_matrix();
        let lights = FrameLights::gather(scene);
        let draws = DrawList::gather(scene, view_matrix);

        if let Some(map_size) = lights.shadow_map_size {
            if map_size != self.shadow_pass.map_size() {
                self.resize_shadow_maps(map_size);
            }
        }

        // Update per-frame shader uniforms.
        let uniforms = &mut self.per_frame_uniforms;
        uniforms.set_camera(view_matrix, camera.view_projection_matrix(), camera.eye());
        uniforms.set_ambient(lights.ambient);
        uniforms.set_fog(PackedFog::from(scene.fog()));
        uniforms.set_directional_light(lights.directional);
        uniforms.set_point_lights(&lights.point_lights);

        for view in &lights.shadow_views {
            uniforms.set_shadow_matrix(view.layer as usize, view.view_projection);
        }

        uniforms.update_gpu(&self.queue);
        self.shadow_pass.prepare(&self.queue, &lights.shadow_views);

        // Create or refresh the GPU side of everything that will be drawn.
        for item in draws.iter() {
            let geometry = &item.mesh.geometry;

            self.meshes
                .entry(geometry.id())
                .or_insert_with(|| GpuMesh::new(&self.device, geometry));

            self.materials
                .prepare(&self.device, &self.queue, &self.layouts, &item.mesh.material);

            let model = self
                .models
                .entry(item.node)
                .or_insert_with(|| Model::new(&self.device, &self.layouts, item.name));

            model.update(item.local_to_world, item.receive_shadow);
            model.prepare(&self.queue);
        }

        let backbuffer = self.surface.get_current_texture()?;
        let view = backbuffer
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut command_encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render loop encoder"),
            });

        let casters: Vec<(&Model, &GpuMesh)> = draws
            .shadow_casters()
            .filter_map(|item| {
                Some((
                    self.models.get(&item.node)?,
                    self.meshes.get(&item.mesh.geometry.id())?,
                ))
            })
            .collect();

        self.shadow_pass
            .draw(&mut command_encoder, &lights.shadow_views, &casters);

        {
            let mut render_pass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color(scene.background())),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(0, self.per_frame_uniforms.bind_group(), &[]);

            render_pass.set_pipeline(&self.opaque_pipeline);
            for item in &draws.opaque {
                self.draw_item(&mut render_pass, item);
            }

            render_pass.set_pipeline(&self.transparent_pipeline);
            for item in &draws.transparent {
                self.draw_item(&mut render_pass, item);
            }
        }

        // All done - submit commands for execution.
        self.queue.submit(std::iter::once(command_encoder.finish()));
        backbuffer.present();

        Ok(())
    }

    fn draw_item<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>, item: &DrawItem<'_>) {
        let (Some(model), Some(mesh), Some(material)) = (
            self.models.get(&item.node),
            self.meshes.get(&item.mesh.geometry.id()),
            self.materials.get(&item.mesh.material),
        ) else {
            warn!("skipping {} because its GPU resources are missing", item.name);
            return;
        };

        render_pass.draw_model(model, mesh, material);
    }

    /// The background color as written to the backbuffer. sRGB surfaces encode
    /// linear values on write, other surfaces store the sRGB value directly.
    fn clear_color(&self, background: Vec3) -> wgpu::Color {
        let color = if self.surface_config.format.is_srgb() {
            srgb_to_linear(background)
        } else {
            background
        };

        wgpu::Color {
            r: color.x as f64,
            g: color.y as f64,
            b: color.z as f64,
            a: 1.0,
        }
    }

    /// Recreate the shadow maps at a new resolution along with the per-frame
    /// bind group that samples them.
    fn resize_shadow_maps(&mut self, map_size: u32) {
        self.shadow_pass.resize(&self.device, map_size);

        let values = *self.per_frame_uniforms.buffer.values();

        self.per_frame_uniforms = PerFrameUniforms::new(
            &self.device,
            &self.layouts,
            self.shadow_pass.array_view(),
            self.shadow_pass.sampler(),
        );

        *self.per_frame_uniforms.buffer.values_mut() = values;
        self.per_frame_uniforms.set_shadow_map_size(map_size);
    }
}

impl SceneRenderer for Renderer {
    fn render(&mut self, scene: &Scene, camera: &Camera) {
        match self.render_scene(scene, camera) {
            Ok(_) => {}
            // Reconfigure the surface if it's lost or outdated.
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                warn!("rendering surface lost or outdated, reconfiguring");
                let (width, height) = self.size();
                self.resize(width, height);
            }
            // The system is out of memory and the application should quit.
            Err(wgpu::SurfaceError::OutOfMemory) => {
                panic!("WGPU out of memory error");
            }
            // Other errors (Timeout) should be resolved by the next frame.
            Err(e) => {
                error!("{e:?}");
            }
        }
    }
}

fn create_standard_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[Vertex::desc()],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: Texture::DEPTH_TEXTURE_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}
