//! The skybox look: an environment cubemap on an inward-facing shell.

use std::any::Any;

use crate::{
    context::Context,
    data_structures::{instance::Instance, mesh::Mesh, texture::Texture},
    materials::{DrawState, Material, MaterialCore},
    pipelines::binding,
    scene::FrameContext,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SkyGlobals {
    color: [f32; 4],
    ambient: [f32; 4],
    misc: [f32; 4],
}

/// Environment cubemap sampled along the view direction.
///
/// Draws with depth testing disabled and depth writes off, so the sky can be
/// drawn at any point in the frame and still sit behind every tested surface.
pub struct SkyboxMaterial {
    pub color: [f32; 4],
    environment: Texture,
    core: MaterialCore,
}

impl SkyboxMaterial {
    pub fn new(ctx: &Context, environment: Texture) -> Self {
        let texture_layout = binding::environment_layout(&ctx.device);
        let texture_bind_group =
            binding::mk_environment_bind_group(&ctx.device, &texture_layout, &environment);
        let core = MaterialCore::new_single(
            ctx,
            "skybox material",
            include_str!("../pipelines/skybox.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<SkyGlobals>() as u64,
            DrawState::SKY,
        );
        Self {
            color: [1.0; 4],
            environment,
            core,
        }
    }

    /// The cubemap this skybox samples. Shared handles observe in-place
    /// rewrites of its faces, which is how environment swaps propagate.
    pub fn environment(&self) -> &Texture {
        &self.environment
    }
}

impl Material for SkyboxMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, _model: &Instance) {
        let globals = SkyGlobals {
            color: self.color,
            ambient: [1.0; 4],
            misc: [frame.time, frame.exposure, frame.output as f32, 0.0],
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
