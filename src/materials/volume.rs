//! Volume rendering: emission-absorption marching and iso-surface extraction.

use std::any::Any;

use anyhow::Result;
use cgmath::{Matrix4, SquareMatrix};

use crate::{
    context::Context,
    data_structures::{instance::Instance, mesh::Mesh, texture::Texture, volume::Volume},
    materials::{DrawState, Material, MaterialCore},
    pipelines::binding,
    scene::FrameContext,
};

const NOISE_SIZE: u32 = 64;

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct VolumeGlobals {
    inv_model: [[f32; 4]; 4],
    tint: [f32; 4],
    /// x: step length, y: density threshold, z: brightness, w: transfer toggle.
    params: [f32; 4],
    clip: [f32; 4],
    /// x: time, y: exposure, z: output selector, w: jitter toggle.
    misc: [f32; 4],
}

/// Swap the density field of an existing 3D texture.
///
/// Matching extents rewrite the texels in place, which every bind group
/// sharing the texture observes. An extent change forces a new texture, and
/// the caller must rebuild its bind group from the returned handle.
fn upload_density(
    ctx: &Context,
    density: &Texture,
    dims: (u32, u32, u32),
    volume: &Volume,
) -> Result<Option<Texture>> {
    let new_dims = (volume.width, volume.height, volume.depth);
    if new_dims == dims {
        density.write_volume(&ctx.queue, dims, &volume.to_texels())?;
        Ok(None)
    } else {
        log::debug!(
            "density field extent changed {dims:?} -> {new_dims:?}, rebuilding texture"
        );
        Ok(Some(volume.to_texture(&ctx.device, &ctx.queue, "density field")?))
    }
}

fn inverse_or_identity(model: &Instance) -> Matrix4<f32> {
    model.inverse_matrix().unwrap_or_else(|| {
        log::warn!("degenerate volume transform, marching in world space");
        Matrix4::identity()
    })
}

fn clip_to_vec4(clip_plane: Option<[f32; 4]>) -> [f32; 4] {
    clip_plane.unwrap_or([0.0; 4])
}

/// Density cloud rendered by marching view rays through a 3D texture.
///
/// Each sample above the threshold contributes emission and opacity, colored
/// either by a flat tint or by a transfer-function lookup. The march happens
/// in the node's local space, so the node transform stretches the field with
/// its bounding box.
pub struct VolumeMaterial {
    pub step: f32,
    pub threshold: f32,
    pub brightness: f32,
    pub tint: [f32; 4],
    pub jitter: bool,
    /// Half-space clip in local coordinates, `[normal, offset]`.
    pub clip_plane: Option<[f32; 4]>,
    dims: (u32, u32, u32),
    density: Texture,
    noise: Texture,
    transfer: Option<Texture>,
    core: MaterialCore,
}

impl VolumeMaterial {
    pub fn new(ctx: &Context, volume: &Volume) -> Result<Self> {
        let density = volume.to_texture(&ctx.device, &ctx.queue, "density field")?;
        let noise = Texture::tileable_noise(&ctx.device, &ctx.queue, NOISE_SIZE);
        let texture_layout = binding::volume_layout(&ctx.device);
        let texture_bind_group = binding::mk_volume_bind_group(
            &ctx.device,
            &texture_layout,
            &ctx.fallbacks,
            &density,
            Some(&noise),
            None,
        );
        let core = MaterialCore::new_single(
            ctx,
            "volume material",
            include_str!("../pipelines/volume.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<VolumeGlobals>() as u64,
            DrawState::VOLUME_BOX,
        );
        Ok(Self {
            step: 0.01,
            threshold: 0.01,
            brightness: 8.0,
            tint: [1.0, 1.0, 1.0, 1.0],
            jitter: true,
            clip_plane: None,
            dims: (volume.width, volume.height, volume.depth),
            density,
            noise,
            transfer: None,
            core,
        })
    }

    /// Replace the density data, in place when the extents match.
    pub fn set_volume(&mut self, ctx: &Context, volume: &Volume) -> Result<()> {
        if let Some(rebuilt) = upload_density(ctx, &self.density, self.dims, volume)? {
            self.density = rebuilt;
            self.dims = (volume.width, volume.height, volume.depth);
            self.rebuild_textures(ctx);
        }
        Ok(())
    }

    /// Select or clear the transfer-function lookup. `None` falls back to the
    /// flat tint.
    pub fn set_transfer(&mut self, ctx: &Context, transfer: Option<Texture>) {
        self.transfer = transfer;
        self.rebuild_textures(ctx);
    }

    pub fn has_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    fn rebuild_textures(&mut self, ctx: &Context) {
        self.core.texture_bind_group = binding::mk_volume_bind_group(
            &ctx.device,
            &self.core.texture_layout,
            &ctx.fallbacks,
            &self.density,
            Some(&self.noise),
            self.transfer.as_ref(),
        );
    }
}

impl Material for VolumeMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, model: &Instance) {
        let globals = VolumeGlobals {
            inv_model: inverse_or_identity(model).into(),
            tint: self.tint,
            params: [
                self.step,
                self.threshold,
                self.brightness,
                if self.transfer.is_some() { 1.0 } else { 0.0 },
            ],
            clip: clip_to_vec4(self.clip_plane),
            misc: [
                frame.time,
                frame.exposure,
                frame.output as f32,
                if self.jitter { 1.0 } else { 0.0 },
            ],
        };
        self.core.upload(&ctx.queue, bytemuck::bytes_of(&globals));
    }

    fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        mesh: &Mesh,
        instances: &wgpu::Buffer,
        frame: &FrameContext,
    ) {
        self.core.draw_single(pass, mesh, instances, frame);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct IsoGlobals {
    inv_model: [[f32; 4]; 4],
    color: [f32; 4],
    ambient: [f32; 4],
    /// x: step length, y: iso value, z: gradient half-step, w: normal debug.
    params: [f32; 4],
    clip: [f32; 4],
    misc: [f32; 4],
}

/// The first density crossing of an iso value, shaded as a solid surface.
///
/// Normals come from central differences of the density field; lighting runs
/// the same per-light accumulation loop as the solid materials, with the
/// volume-box culling kept across all passes.
pub struct IsoVolumeMaterial {
    pub iso_value: f32,
    /// Gradient half-step for the central differences.
    pub h: f32,
    pub step: f32,
    pub color: [f32; 4],
    pub debug_normals: bool,
    pub jitter: bool,
    pub clip_plane: Option<[f32; 4]>,
    dims: (u32, u32, u32),
    density: Texture,
    noise: Texture,
    core: MaterialCore,
}

impl IsoVolumeMaterial {
    pub fn new(ctx: &Context, volume: &Volume) -> Result<Self> {
        let density = volume.to_texture(&ctx.device, &ctx.queue, "density field")?;
        let noise = Texture::tileable_noise(&ctx.device, &ctx.queue, NOISE_SIZE);
        let texture_layout = binding::volume_layout(&ctx.device);
        let texture_bind_group = binding::mk_volume_bind_group(
            &ctx.device,
            &texture_layout,
            &ctx.fallbacks,
            &density,
            Some(&noise),
            None,
        );
        let core = MaterialCore::new_lit(
            ctx,
            "iso volume material",
            include_str!("../pipelines/iso.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<IsoGlobals>() as u64,
            DrawState::VOLUME_BOX,
            DrawState::VOLUME_BOX_ACCUMULATE,
        );
        Ok(Self {
            iso_value: 0.3,
            h: 0.01,
            step: 0.005,
            color: [1.0, 1.0, 1.0, 1.0],
            debug_normals: false,
            jitter: false,
            clip_plane: None,
            dims: (volume.width, volume.height, volume.depth),
            density,
            noise,
            core,
        })
    }

    pub fn set_volume(&mut self, ctx: &Context, volume: &Volume) -> Result<()> {
        if let Some(rebuilt) = upload_density(ctx, &self.density, self.dims, volume)? {
            self.density = rebuilt;
            self.dims = (volume.width, volume.height, volume.depth);
            self.core.texture_bind_group = binding::mk_volume_bind_group(
                &ctx.device,
                &self.core.texture_layout,
                &ctx.fallbacks,
                &self.density,
                Some(&self.noise),
                None,
            );
        }
        Ok(())
    }

    fn globals(&self, ambient: [f32; 3], model_inv: [[f32; 4]; 4], frame: &FrameContext) -> IsoGlobals {
        IsoGlobals {
            inv_model: model_inv,
            color: self.color,
            ambient: [ambient[0], ambient[1], ambient[2], 1.0],
            params: [
                self.step,
                self.iso_value,
                self.h,
                if self.debug_normals { 1.0 } else { 0.0 },
            ],
            clip: clip_to_vec4(self.clip_plane),
            misc: [
                frame.time,
                frame.exposure,
                frame.output as f32,
                if self.jitter { 1.0 } else { 0.0 },
            ],
        }
    }
}

impl Material for IsoVolumeMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, model: &Instance) {
        let inv: [[f32; 4]; 4] = inverse_or_identity(model).into();
        let with_ambient = self.globals(frame.ambient_light, inv, frame);
        let without = self.globals([0.0; 3], inv, frame);
        self.core.upload(&ctx.queue, bytemuck::bytes_of(&with_ambient));
        self.core.upload_zero(&ctx.queue, bytemuck::bytes_of(&without));
    }

    fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        mesh: &Mesh,
        instances: &wgpu::Buffer,
        frame: &FrameContext,
    ) {
        self.core.draw_lit(pass, mesh, instances, frame);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
