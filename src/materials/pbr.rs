//! Physically based shading with image-based lighting.

use std::any::Any;

use crate::{
    context::Context,
    data_structures::{instance::Instance, mesh::Mesh, texture::Texture},
    materials::{DrawState, Material, MaterialCore, encode_mesh},
    pipelines::binding::{self, PREFILTERED_LEVELS, PbrTextureSet},
    scene::FrameContext,
};

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PbrGlobals {
    color: [f32; 4],
    /// x: roughness factor, y: metalness factor, z: map-driven toggle.
    factors: [f32; 4],
    misc: [f32; 4],
}

/// The optional 2D maps a PBR surface may carry. Absent maps are replaced by
/// neutral stand-ins when the bind group is built.
#[derive(Default)]
pub struct PbrMaps {
    pub albedo: Option<Texture>,
    pub normal: Option<Texture>,
    pub roughness: Option<Texture>,
    pub metalness: Option<Texture>,
    pub emissive: Option<Texture>,
    pub opacity: Option<Texture>,
}

/// Cook-Torrance surface with an image-based indirect term.
///
/// The environment interface is a BRDF lookup texture plus five prefiltered
/// cubemap levels of increasing roughness. `use_metal` switches between the
/// map-driven workflow (sampled roughness/metalness scaled by the factors)
/// and a fixed-factor workflow where the maps are inert.
pub struct PbrMaterial {
    pub color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub use_metal: bool,
    /// Draw with alpha compositing over the scene instead of opaquely.
    /// Follows the presence of an opacity map; callers may override it.
    pub transparent: bool,
    maps: PbrMaps,
    brdf_lut: Texture,
    environment: Texture,
    prefiltered: [Texture; PREFILTERED_LEVELS as usize],
    core: MaterialCore,
}

impl PbrMaterial {
    pub fn new(
        ctx: &Context,
        maps: PbrMaps,
        brdf_lut: Texture,
        environment: Texture,
        prefiltered: [Texture; PREFILTERED_LEVELS as usize],
    ) -> Self {
        let texture_layout = binding::pbr_layout(&ctx.device);
        let texture_bind_group = mk_bind_group(
            ctx,
            &texture_layout,
            &maps,
            &brdf_lut,
            &environment,
            &prefiltered,
        );
        // The second pipeline is the transparency variant, not a light
        // accumulation pass; this family shades all its lighting in one draw.
        let core = MaterialCore::new_lit(
            ctx,
            "pbr material",
            include_str!("../pipelines/pbr.wgsl"),
            texture_layout,
            texture_bind_group,
            std::mem::size_of::<PbrGlobals>() as u64,
            DrawState::OPAQUE,
            DrawState::SEE_THROUGH,
        );
        Self {
            color: [1.0; 4],
            roughness: 1.0,
            metalness: 1.0,
            use_metal: true,
            transparent: maps.opacity.is_some(),
            maps,
            brdf_lut,
            environment,
            prefiltered,
            core,
        }
    }

    pub fn maps(&self) -> &PbrMaps {
        &self.maps
    }

    pub fn set_maps(&mut self, ctx: &Context, maps: PbrMaps) {
        self.transparent = maps.opacity.is_some();
        self.maps = maps;
        self.rebuild_textures(ctx);
    }

    fn rebuild_textures(&mut self, ctx: &Context) {
        self.core.texture_bind_group = mk_bind_group(
            ctx,
            &self.core.texture_layout,
            &self.maps,
            &self.brdf_lut,
            &self.environment,
            &self.prefiltered,
        );
    }
}

fn mk_bind_group(
    ctx: &Context,
    layout: &wgpu::BindGroupLayout,
    maps: &PbrMaps,
    brdf_lut: &Texture,
    environment: &Texture,
    prefiltered: &[Texture; PREFILTERED_LEVELS as usize],
) -> wgpu::BindGroup {
    binding::mk_pbr_bind_group(
        &ctx.device,
        layout,
        &ctx.fallbacks,
        &PbrTextureSet {
            albedo: maps.albedo.as_ref(),
            normal: maps.normal.as_ref(),
            roughness: maps.roughness.as_ref(),
            metalness: maps.metalness.as_ref(),
            emissive: maps.emissive.as_ref(),
            opacity: maps.opacity.as_ref(),
            brdf_lut,
            environment,
            prefiltered,
        },
    )
}

impl Material for PbrMaterial {
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, _model: &Instance) {
        let globals = PbrGlobals {
            color: self.color,
            factors: [
                self.roughness,
                self.metalness,
                if self.use_metal { 1.0 } else { 0.0 },
                0.0,
            ],
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
        let pipeline = if self.transparent {
            self.core
                .accumulate_pipeline
                .as_ref()
                .unwrap_or(&self.core.base_pipeline)
        } else {
            &self.core.base_pipeline
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(binding::GROUP_TEXTURES, &self.core.texture_bind_group, &[]);
        pass.set_bind_group(binding::GROUP_CAMERA, frame.camera_bind_group, &[]);
        pass.set_bind_group(binding::GROUP_LIGHT, frame.primary_light_bind_group(), &[]);
        pass.set_bind_group(binding::GROUP_GLOBALS, &self.core.globals_bind_group, &[]);
        encode_mesh(pass, mesh, instances);
    }

    fn base_texture(&self) -> Option<&Texture> {
        self.maps.albedo.as_ref()
    }

    fn set_base_texture(&mut self, ctx: &Context, texture: Texture) {
        self.maps.albedo = Some(texture);
        self.rebuild_textures(ctx);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The effective shading inputs the fragment stage derives from the material
/// parameters, kept as a plain function so the workflow switch can be checked
/// without a GPU.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadingInputs {
    pub base_color: [f32; 3],
    pub roughness: f32,
    pub metalness: f32,
}

/// Mirror of the fragment-stage parameter selection.
///
/// With `use_metal` on, roughness and metalness come from the sampled maps
/// scaled by the factors and the fixed color is inert. Off, the factors apply
/// directly and the sampled roughness/metalness values cannot influence the
/// result.
pub fn shading_inputs(
    use_metal: bool,
    roughness_factor: f32,
    metalness_factor: f32,
    fixed_color: [f32; 3],
    sampled_albedo: [f32; 3],
    sampled_roughness: f32,
    sampled_metalness: f32,
) -> ShadingInputs {
    if use_metal {
        ShadingInputs {
            base_color: sampled_albedo,
            roughness: (sampled_roughness * roughness_factor).clamp(0.025, 1.0),
            metalness: (sampled_metalness * metalness_factor).clamp(0.0, 1.0),
        }
    } else {
        ShadingInputs {
            base_color: [
                fixed_color[0] * sampled_albedo[0],
                fixed_color[1] * sampled_albedo[1],
                fixed_color[2] * sampled_albedo[2],
            ],
            roughness: roughness_factor.clamp(0.025, 1.0),
            metalness: metalness_factor.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::shading_inputs;

    #[test]
    fn fixed_workflow_ignores_sampled_maps() {
        let a = shading_inputs(false, 0.4, 0.2, [0.8, 0.5, 0.3], [1.0; 3], 0.1, 0.9);
        let b = shading_inputs(false, 0.4, 0.2, [0.8, 0.5, 0.3], [1.0; 3], 0.95, 0.05);
        assert_eq!(a, b);
        assert_eq!(a.roughness, 0.4);
        assert_eq!(a.metalness, 0.2);
    }

    #[test]
    fn map_workflow_ignores_fixed_color() {
        let a = shading_inputs(true, 1.0, 1.0, [0.8, 0.5, 0.3], [0.2, 0.4, 0.6], 0.5, 0.5);
        let b = shading_inputs(true, 1.0, 1.0, [0.1, 0.1, 0.1], [0.2, 0.4, 0.6], 0.5, 0.5);
        assert_eq!(a, b);
        assert_eq!(a.base_color, [0.2, 0.4, 0.6]);
    }

    #[test]
    fn roughness_never_reaches_zero() {
        let inputs = shading_inputs(true, 0.0, 1.0, [1.0; 3], [1.0; 3], 0.0, 1.0);
        assert!(inputs.roughness >= 0.025);
    }
}
