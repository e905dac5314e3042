use image::RgbaImage;

use crate::assets::{ColorSpace, TextureSettings, WrapMode};

/// Stores a WGPU texture along with its associated view and sampler.
pub struct Texture {
    /// Only held so the GPU texture lives as long as `view`.
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    pub const DEPTH_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Upload `image` with a full mip chain, sampled according to `settings`.
    ///
    /// Texture repetition is not a sampler property. The shader scales uvs by
    /// `settings.repeat` and the sampler's address mode decides what happens
    /// past the edge.
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &RgbaImage,
        settings: &TextureSettings,
        label: Option<&str>,
    ) -> Self {
        let (width, height) = image.dimensions();
        let mip_level_count = mip_level_count(width, height);

        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(settings.color_space),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // Mips are downsampled on the CPU since the images are small and only
        // uploaded once.
        let mut level_image = image.clone();

        for mip_level in 0..mip_level_count {
            if mip_level > 0 {
                let (w, h) = level_image.dimensions();
                level_image = image::imageops::resize(
                    &level_image,
                    (w / 2).max(1),
                    (h / 2).max(1),
                    image::imageops::FilterType::Triangle,
                );
            }

            let (w, h) = level_image.dimensions();

            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &level_image,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * w),
                    rows_per_image: Some(h),
                },
                wgpu::Extent3d {
                    width: w,
                    height: h,
                    depth_or_array_layers: 1,
                },
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = create_sampler(device, settings, label);

        Self {
            _texture: texture,
            view,
            sampler,
        }
    }

    /// Create a 1x1 texture filled with `rgba`. Used in place of maps that are
    /// not assigned or not loaded yet.
    pub fn solid_color(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: [u8; 4],
        label: Option<&str>,
    ) -> Self {
        let image = RgbaImage::from_pixel(1, 1, image::Rgba(rgba));
        Self::from_image(device, queue, &image, &TextureSettings::default(), label)
    }

    /// Create a texture representing the depth buffer.
    pub fn create_depth_texture(
        device: &wgpu::Device,
        surface: &wgpu::SurfaceConfiguration,
        label: Option<&str>,
    ) -> Self {
        // Including `TextureUsages::RENDER_ATTACHMENT` in the usage flags
        // ensures depth information can be written to this texture.
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size: wgpu::Extent3d {
                width: surface.width,
                height: surface.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Self {
            _texture: texture,
            view,
            sampler,
        }
    }
}

fn create_sampler(
    device: &wgpu::Device,
    settings: &TextureSettings,
    label: Option<&str>,
) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label,
        address_mode_u: address_mode(settings.wrap_s),
        address_mode_v: address_mode(settings.wrap_t),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Color maps are decoded from sRGB by the sampler so the shader always sees
/// linear values.
pub fn texture_format(color_space: ColorSpace) -> wgpu::TextureFormat {
    match color_space {
        ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
    }
}

pub fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
    }
}

/// Number of mip levels needed to go from `width` x `height` down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}
