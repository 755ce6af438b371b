//! GPU textures and texture creation utilities.
//!
//! This module provides [`Texture`], a wrapper around WGPU texture resources
//! covering the three shapes the materials consume: 2D maps, cubemaps and 3D
//! density fields. Textures are created once and shared by cloning the handle
//! (clones alias the same GPU memory). The only permitted mutation is an
//! in-place rewrite of the texel contents, which every holder of the handle
//! observes; views and bind groups stay valid across rewrites.

use anyhow::{Result, bail};
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

/// A GPU texture with a view and optional sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: Option<wgpu::Sampler>,
}

impl Texture {
    /// Standard depth buffer texture format (32-bit float).
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// Create a depth texture for depth-testing during rendering.
    pub fn create_depth_texture(device: &wgpu::Device, size: [u32; 2], label: &str) -> Self {
        let size = wgpu::Extent3d {
            width: size[0].max(1),
            height: size[1].max(1),
            depth_or_array_layers: 1,
        };
        let desc = wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[Self::DEPTH_FORMAT],
        };
        let texture = device.create_texture(&desc);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            sampler: None,
        }
    }

    /// Load a 2D texture from raw byte data (image file contents).
    ///
    /// * `format` is an optional file format hint (e.g., "png"); auto-detected
    ///   when `None`.
    /// * `srgb` selects sRGB storage for color maps; data maps (normals,
    ///   roughness, metalness, opacity) want linear.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
        srgb: bool,
    ) -> Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        };
        Ok(Self::from_image(device, queue, &img, Some(label), srgb))
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
        srgb: bool,
    ) -> Self {
        let dimensions = img.dimensions();
        let rgba = img.to_rgba8();
        let format = if srgb {
            wgpu::TextureFormat::Rgba8UnormSrgb
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        };
        Self::from_rgba8(device, queue, &rgba, dimensions, label, format)
    }

    /// Create a 2D texture from tightly packed RGBA8 texels.
    pub fn from_rgba8(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        rgba: &[u8],
        (width, height): (u32, u32),
        label: Option<&str>,
        format: wgpu::TextureFormat,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_default_sampler(device));
        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Create a 1x1 solid-color map.
    ///
    /// These stand in for absent optional maps so every shader path can bind a
    /// full texture set: white for opacity/albedo, black for emissive, flat
    /// blue for normals.
    pub fn solid_color(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        rgba: [u8; 4],
    ) -> Self {
        Self::from_rgba8(
            device,
            queue,
            &rgba,
            (1, 1),
            Some(label),
            wgpu::TextureFormat::Rgba8Unorm,
        )
    }

    /// Create a cubemap from six RGBA8 faces of `face_size`² texels each.
    ///
    /// Face order follows the wgpu array-layer convention:
    /// +X, -X, +Y, -Y, +Z, -Z.
    pub fn cubemap_from_faces(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        face_size: u32,
        faces: &[Vec<u8>; 6],
    ) -> Result<Self> {
        let size = wgpu::Extent3d {
            width: face_size,
            height: face_size,
            depth_or_array_layers: 6,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = Some(create_clamping_sampler(device));
        let cubemap = Self {
            texture,
            view,
            sampler,
        };
        cubemap.write_cubemap_faces(queue, face_size, faces)?;
        Ok(cubemap)
    }

    /// Rewrite all six faces of an existing cubemap in place.
    ///
    /// This is how the skybox environment is swapped at runtime: the handle,
    /// its views and every bind group referencing it stay valid, so materials
    /// reusing the cubemap (e.g. a reflection source) pick up the new contents
    /// on their next draw.
    pub fn write_cubemap_faces(
        &self,
        queue: &wgpu::Queue,
        face_size: u32,
        faces: &[Vec<u8>; 6],
    ) -> Result<()> {
        if self.texture.width() != face_size || self.texture.height() != face_size {
            bail!(
                "cubemap rewrite size mismatch: texture is {}x{}, faces are {face_size}x{face_size}",
                self.texture.width(),
                self.texture.height()
            );
        }
        for (layer, face) in faces.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    aspect: wgpu::TextureAspect::All,
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                },
                face,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * face_size),
                    rows_per_image: Some(face_size),
                },
                wgpu::Extent3d {
                    width: face_size,
                    height: face_size,
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(())
    }

    /// Create a 3D density texture from single-channel texels.
    ///
    /// Densities are stored as `R8Unorm`, so a sampled value of 1.0 maps to
    /// the byte 255.
    pub fn volume_3d(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        (width, height, depth): (u32, u32, u32),
        texels: &[u8],
    ) -> Result<Self> {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: depth,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = Some(create_clamping_sampler(device));
        let volume = Self {
            texture,
            view,
            sampler,
        };
        volume.write_volume(queue, (width, height, depth), texels)?;
        Ok(volume)
    }

    /// Rewrite the contents of an existing 3D texture in place.
    pub fn write_volume(
        &self,
        queue: &wgpu::Queue,
        (width, height, depth): (u32, u32, u32),
        texels: &[u8],
    ) -> Result<()> {
        if texels.len() as u64 != width as u64 * height as u64 * depth as u64 {
            bail!(
                "volume rewrite expects {} texels, got {}",
                width * height * depth,
                texels.len()
            );
        }
        if self.texture.width() != width
            || self.texture.height() != height
            || self.texture.depth_or_array_layers() != depth
        {
            bail!("volume rewrite size mismatch");
        }
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: depth,
            },
        );
        Ok(())
    }

    /// Create a 256x1 RGBA lookup texture (transfer functions, BRDF ramps).
    pub fn lut_256(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        table: &[[u8; 4]; 256],
    ) -> Self {
        let texels: Vec<u8> = table.iter().flatten().copied().collect();
        Self::from_rgba8(
            device,
            queue,
            &texels,
            (256, 1),
            Some(label),
            wgpu::TextureFormat::Rgba8Unorm,
        )
    }

    /// Create a tileable noise texture used to jitter volume ray origins.
    ///
    /// The pattern is generated from a fixed integer hash, so it is identical
    /// across runs and machines.
    pub fn tileable_noise(device: &wgpu::Device, queue: &wgpu::Queue, size: u32) -> Self {
        let mut texels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let value = hash2(x, y);
                texels.extend_from_slice(&[value, value, value, 255]);
            }
        }
        let mut noise = Self::from_rgba8(
            device,
            queue,
            &texels,
            (size, size),
            Some("jitter noise"),
            wgpu::TextureFormat::Rgba8Unorm,
        );
        // Jitter lookups wrap across the screen.
        noise.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        }));
        noise
    }
}

/// Lowe-style integer scramble, folded to a byte.
fn hash2(x: u32, y: u32) -> u8 {
    let mut h = x.wrapping_mul(0x9E37_79B9) ^ y.wrapping_mul(0x85EB_CA6B);
    h ^= h >> 13;
    h = h.wrapping_mul(0xC2B2_AE35);
    h ^= h >> 16;
    (h & 0xFF) as u8
}

pub fn create_default_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

pub fn create_clamping_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}
