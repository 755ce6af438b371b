//! Central GPU context owning device, queue and shared render resources.
//!
//! The context is headless: it renders into caller-provided color targets and
//! its own depth buffer, so no window or surface is involved and tests can run
//! against any adapter the platform offers.

use anyhow::{Context as _, Result};

use crate::{
    camera::{Camera, CameraResources},
    data_structures::texture::Texture,
    pipelines::binding::{self, FallbackMaps},
};

#[derive(Debug)]
pub struct Context {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Format of the color targets the materials render into.
    pub color_format: wgpu::TextureFormat,
    pub size: [u32; 2],
    pub depth_texture: Texture,
    pub camera: CameraResources,
    /// Shared layout for the per-light uniform bind groups (group 2).
    pub light_bind_group_layout: wgpu::BindGroupLayout,
    /// All-zero light contribution, bound when a pipeline wants a light slot
    /// but the scene has no visible light to offer.
    pub fallback_light_bind_group: wgpu::BindGroup,
    /// Neutral stand-in maps for absent optional textures.
    pub fallbacks: FallbackMaps,
}

impl Context {
    pub async fn new(size: [u32; 2]) -> Result<Self> {
        log::debug!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;

        log::debug!("device and queue");
        // Line fill mode backs the wireframe overlay.
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::POLYGON_MODE_LINE,
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("device request failed")?;

        let color_format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let depth_texture = Texture::create_depth_texture(&device, size, "depth_texture");

        let aspect = size[0].max(1) as f32 / size[1].max(1) as f32;
        let camera = CameraResources::new(&device, Camera::new((0.0, 1.0, 4.0), (0.0, 0.0, 0.0), aspect));

        let light_bind_group_layout = binding::uniform_layout(&device, "light_bind_group_layout");
        let fallback_light_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("fallback light"),
            size: 48,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });
        let fallback_light_bind_group = binding::mk_uniform_bind_group(
            &device,
            &light_bind_group_layout,
            &fallback_light_buffer,
            "fallback light",
        );
        let fallbacks = FallbackMaps::new(&device, &queue);

        Ok(Self {
            device,
            queue,
            color_format,
            size,
            depth_texture,
            camera,
            light_bind_group_layout,
            fallback_light_bind_group,
            fallbacks,
        })
    }

    /// Blocking wrapper around [`Context::new`] for synchronous callers.
    pub fn new_blocking(size: [u32; 2]) -> Result<Self> {
        futures::executor::block_on(Self::new(size))
    }

    /// Recreate the depth buffer and camera aspect for a new target size.
    pub fn resize(&mut self, size: [u32; 2]) {
        if size[0] == 0 || size[1] == 0 {
            log::warn!("ignoring resize to zero extent");
            return;
        }
        self.size = size;
        self.depth_texture = Texture::create_depth_texture(&self.device, size, "depth_texture");
        self.camera.camera.aspect = size[0] as f32 / size[1] as f32;
        self.camera.upload(&self.queue);
    }

    /// Create a color texture this context can render into and read back from.
    pub fn create_render_target(&self, label: &str) -> Texture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: self.size[0],
                height: self.size[1],
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.color_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Texture {
            texture,
            view,
            sampler: None,
        }
    }
}
