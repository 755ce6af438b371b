//! Classic Phong shading with per-light accumulation.

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
struct PhongGlobals {
    color: [f32; 4],
    ambient: [f32; 4],
    /// x: time, y: exposure, z: output selector, w: normal-map toggle.
    misc: [f32; 4],
    k_ambient: [f32; 4],
    k_diffuse: [f32; 4],
    /// w: shininess exponent.
    k_specular: [f32; 4],
}

/// Ambient + diffuse + specular shading, drawn once per visible light.
///
/// The first draw carries the scene ambient and replaces the framebuffer
/// contents; every further light is added on top with the ambient zeroed so
/// it is only contributed once.
pub struct PhongMaterial {
    pub color: [f32; 4],
    pub k_ambient: [f32; 3],
    pub k_diffuse: [f32; 3],
    pub k_specular: [f32; 3],
    pub shininess: f32,
    albedo: Option<Texture>,
    normal_map: Option<Texture>,
    core: MaterialCore,
}

impl PhongMaterial {
    pub fn new(ctx: &Context, albedo: Option<Texture>, normal_map: Option<Texture>) -> Self {
        let texture_layout = binding::surface_layout(&ctx.device);
        let texture_bind_group = binding::mk_surface_bind_group(
            &ctx.device,
            &texture_layout,
            &ctx.fallbacks,
            albedo.as_ref(),
            normal_map.as_ref(),
        );
        let core = MaterialCore::new_lit(
            ctx,
            "phong material",
            include_str!("../pipelines/phong.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<PhongGlobals>() as u64,
            DrawState::OPAQUE,
            DrawState::ACCUMULATE,
        );
        Self {
            color: [1.0; 4],
            k_ambient: [1.0; 3],
            k_diffuse: [1.0; 3],
            k_specular: [1.0; 3],
            shininess: 32.0,
            albedo,
            normal_map,
            core,
        }
    }

    pub fn set_normal_map(&mut self, ctx: &Context, normal_map: Option<Texture>) {
        self.normal_map = normal_map;
        self.rebuild_textures(ctx);
    }

    fn rebuild_textures(&mut self, ctx: &Context) {
        self.core.texture_bind_group = binding::mk_surface_bind_group(
            &ctx.device,
            &self.core.texture_layout,
            &ctx.fallbacks,
            self.albedo.as_ref(),
            self.normal_map.as_ref(),
        );
    }

    fn globals(&self, ambient: [f32; 3], frame: &FrameContext) -> PhongGlobals {
        let use_normal_map = if self.normal_map.is_some() { 1.0 } else { 0.0 };
        PhongGlobals {
            color: self.color,
            ambient: [ambient[0], ambient[1], ambient[2], 1.0],
            misc: [frame.time, frame.exposure, frame.output as f32, use_normal_map],
            k_ambient: [self.k_ambient[0], self.k_ambient[1], self.k_ambient[2], 0.0],
            k_diffuse: [self.k_diffuse[0], self.k_diffuse[1], self.k_diffuse[2], 0.0],
            k_specular: [
                self.k_specular[0],
                self.k_specular[1],
                self.k_specular[2],
                self.shininess,
            ],
        }
    }
}

impl Material for PhongMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, _model: &Instance) {
        let with_ambient = self.globals(frame.ambient_light, frame);
        let without = self.globals([0.0; 3], frame);
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

    fn base_texture(&self) -> Option<&Texture> {
        self.albedo.as_ref()
    }

    fn set_base_texture(&mut self, ctx: &Context, texture: Texture) {
        self.albedo = Some(texture);
        self.rebuild_textures(ctx);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
