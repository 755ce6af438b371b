//! The plain surface looks: flat color, textured, and the wireframe overlay.

use std::any::Any;

use crate::{
    context::Context,
    data_structures::{instance::Instance, mesh::Mesh, texture::Texture},
    materials::{DrawState, Material, MaterialCore},
    pipelines::binding,
    scene::FrameContext,
};

/// Globals uniform shared by the flat and textured looks.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct SurfaceGlobals {
    color: [f32; 4],
    ambient: [f32; 4],
    /// x: time, y: exposure, z: output selector.
    misc: [f32; 4],
}

fn surface_globals(color: [f32; 4], ambient: [f32; 3], frame: &FrameContext) -> SurfaceGlobals {
    SurfaceGlobals {
        color,
        ambient: [ambient[0], ambient[1], ambient[2], 1.0],
        misc: [frame.time, frame.exposure, frame.output as f32, 0.0],
    }
}

/// A single flat color, lit only by the scene ambient term.
pub struct StandardMaterial {
    pub color: [f32; 4],
    core: MaterialCore,
}

impl StandardMaterial {
    pub fn new(ctx: &Context, color: [f32; 4]) -> Self {
        let texture_layout = binding::surface_layout(&ctx.device);
        let texture_bind_group = binding::mk_surface_bind_group(
            &ctx.device,
            &texture_layout,
            &ctx.fallbacks,
            None,
            None,
        );
        let core = MaterialCore::new_single(
            ctx,
            "standard material",
            include_str!("../pipelines/flat.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<SurfaceGlobals>() as u64,
            DrawState::OPAQUE,
        );
        Self { color, core }
    }
}

impl Material for StandardMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, _model: &Instance) {
        let globals = surface_globals(self.color, frame.ambient_light, frame);
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

/// An albedo map tinted by a color, lit only by the scene ambient term.
pub struct TextureMaterial {
    pub color: [f32; 4],
    albedo: Option<Texture>,
    core: MaterialCore,
}

impl TextureMaterial {
    pub fn new(ctx: &Context, albedo: Option<Texture>) -> Self {
        let texture_layout = binding::surface_layout(&ctx.device);
        let texture_bind_group = binding::mk_surface_bind_group(
            &ctx.device,
            &texture_layout,
            &ctx.fallbacks,
            albedo.as_ref(),
            None,
        );
        let core = MaterialCore::new_single(
            ctx,
            "texture material",
            include_str!("../pipelines/texture.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<SurfaceGlobals>() as u64,
            DrawState::OPAQUE,
        );
        Self {
            color: [1.0; 4],
            albedo,
            core,
        }
    }
}

impl Material for TextureMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, _model: &Instance) {
        let globals = surface_globals(self.color, frame.ambient_light, frame);
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

    fn base_texture(&self) -> Option<&Texture> {
        self.albedo.as_ref()
    }

    fn set_base_texture(&mut self, ctx: &Context, texture: Texture) {
        self.albedo = Some(texture);
        self.core.texture_bind_group = binding::mk_surface_bind_group(
            &ctx.device,
            &self.core.texture_layout,
            &ctx.fallbacks,
            self.albedo.as_ref(),
            None,
        );
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Line-mode overlay drawn on top of a node's regular look.
pub struct WireframeMaterial {
    pub color: [f32; 4],
    core: MaterialCore,
}

impl WireframeMaterial {
    pub fn new(ctx: &Context, color: [f32; 4]) -> Self {
        let texture_layout = binding::surface_layout(&ctx.device);
        let texture_bind_group = binding::mk_surface_bind_group(
            &ctx.device,
            &texture_layout,
            &ctx.fallbacks,
            None,
            None,
        );
        let core = MaterialCore::new_single(
            ctx,
            "wireframe material",
            include_str!("../pipelines/flat.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<SurfaceGlobals>() as u64,
            DrawState::WIREFRAME,
        );
        Self { color, core }
    }
}

impl Material for WireframeMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, _model: &Instance) {
        // Overlay lines keep their color regardless of the scene ambient.
        let globals = surface_globals(self.color, [1.0; 3], frame);
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
