//! Material families and the draw-state machinery behind them.
//!
//! A material owns everything one surface look needs: its shader pipelines,
//! its texture bind group and its globals uniform. Scene nodes hold materials
//! as trait objects and drive them through [`Material`], so looks can be
//! swapped at runtime without the node knowing which family it holds.

pub mod passes;
pub mod pbr;
pub mod phong;
pub mod reflective;
pub mod skybox;
pub mod standard;
pub mod volume;

pub use passes::{Blend, Culling, DepthTest, DrawState, Fill, LightPass, light_passes};
pub use pbr::{PbrMaps, PbrMaterial};
pub use phong::PhongMaterial;
pub use reflective::ReflectiveMaterial;
pub use skybox::SkyboxMaterial;
pub use standard::{StandardMaterial, TextureMaterial, WireframeMaterial};
pub use volume::{IsoVolumeMaterial, VolumeMaterial};

use std::any::Any;

use crate::{
    context::Context,
    data_structures::{
        instance::{Instance, InstanceRaw},
        mesh::{Mesh, ModelVertex, Vertex},
        texture::Texture,
    },
    materials::passes::light_passes_with,
    pipelines::{binding, common::mk_render_pipeline},
    scene::FrameContext,
};

/// A renderable surface or volume look.
pub trait Material: Any {
    /// Push this frame's uniform data to the GPU. Called once per node before
    /// any render pass of the frame is encoded.
    fn upload_parameters(&mut self, ctx: &Context, frame: &FrameContext, model: &Instance);

    /// Encode the draw (or draw sequence) for one mesh.
    fn draw(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        mesh: &Mesh,
        instances: &wgpu::Buffer,
        frame: &FrameContext,
    );

    /// The bound base color map, when this family carries one. Used to carry
    /// the map across material and mesh swaps.
    fn base_texture(&self) -> Option<&Texture> {
        None
    }

    /// Replace the base color map. Families without one ignore the call.
    fn set_base_texture(&mut self, _ctx: &Context, _texture: Texture) {}

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The per-material GPU resources every family shares: pipelines per draw
/// state, the texture bind group and the globals uniform.
///
/// Lit families additionally carry a second globals buffer holding the
/// zero-ambient variant, bound on accumulation passes (uniform writes are not
/// ordered between draws of one submission, so the ambient hand-off has to be
/// two buffers rather than one rewrite).
pub(crate) struct MaterialCore {
    pub base_pipeline: wgpu::RenderPipeline,
    pub accumulate_pipeline: Option<wgpu::RenderPipeline>,
    pub texture_layout: wgpu::BindGroupLayout,
    pub texture_bind_group: wgpu::BindGroup,
    pub globals_buffer: wgpu::Buffer,
    pub globals_bind_group: wgpu::BindGroup,
    pub zero_buffer: Option<wgpu::Buffer>,
    pub zero_bind_group: Option<wgpu::BindGroup>,
    first_state: DrawState,
    rest_state: DrawState,
}

impl MaterialCore {
    /// Build the resources for a single-draw material.
    pub fn new_single(
        ctx: &Context,
        label: &str,
        shader_source: &str,
        texture_layout: wgpu::BindGroupLayout,
        texture_bind_group: wgpu::BindGroup,
        globals_size: u64,
        state: DrawState,
    ) -> Self {
        Self::new(
            ctx,
            label,
            shader_source,
            texture_layout,
            texture_bind_group,
            globals_size,
            state,
            None,
        )
    }

    /// Build the resources for a material that runs the per-light
    /// accumulation loop.
    pub fn new_lit(
        ctx: &Context,
        label: &str,
        shader_source: &str,
        texture_layout: wgpu::BindGroupLayout,
        texture_bind_group: wgpu::BindGroup,
        globals_size: u64,
        first: DrawState,
        rest: DrawState,
    ) -> Self {
        Self::new(
            ctx,
            label,
            shader_source,
            texture_layout,
            texture_bind_group,
            globals_size,
            first,
            Some(rest),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        ctx: &Context,
        label: &str,
        shader_source: &str,
        texture_layout: wgpu::BindGroupLayout,
        texture_bind_group: wgpu::BindGroup,
        globals_size: u64,
        first_state: DrawState,
        rest_state: Option<DrawState>,
    ) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });

        let camera_layout = binding::uniform_layout(device, "camera_bind_group_layout");
        let light_layout = binding::uniform_layout(device, "light_bind_group_layout");
        let globals_layout = binding::uniform_layout(device, "globals_bind_group_layout");
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&texture_layout, &camera_layout, &light_layout, &globals_layout],
            push_constant_ranges: &[],
        });

        let vertex_layouts = [ModelVertex::desc(), InstanceRaw::desc()];
        let base_pipeline = mk_render_pipeline(
            device,
            &layout,
            ctx.color_format,
            &first_state,
            &vertex_layouts,
            &shader,
            label,
        );
        let accumulate_pipeline = rest_state.as_ref().map(|state| {
            mk_render_pipeline(
                device,
                &layout,
                ctx.color_format,
                state,
                &vertex_layouts,
                &shader,
                &format!("{label} accumulate"),
            )
        });

        let globals_buffer = mk_globals_buffer(device, label, globals_size);
        let globals_bind_group =
            binding::mk_uniform_bind_group(device, &globals_layout, &globals_buffer, label);
        let (zero_buffer, zero_bind_group) = if rest_state.is_some() {
            let buffer = mk_globals_buffer(device, &format!("{label} zero ambient"), globals_size);
            let bind_group = binding::mk_uniform_bind_group(
                device,
                &globals_layout,
                &buffer,
                &format!("{label} zero ambient"),
            );
            (Some(buffer), Some(bind_group))
        } else {
            (None, None)
        };

        Self {
            base_pipeline,
            accumulate_pipeline,
            texture_layout,
            texture_bind_group,
            globals_buffer,
            globals_bind_group,
            zero_buffer,
            zero_bind_group,
            first_state,
            rest_state: rest_state.unwrap_or(first_state),
        }
    }

    pub fn upload(&self, queue: &wgpu::Queue, globals: &[u8]) {
        queue.write_buffer(&self.globals_buffer, 0, globals);
    }

    /// Upload the zero-ambient variant bound on accumulation passes.
    pub fn upload_zero(&self, queue: &wgpu::Queue, globals: &[u8]) {
        if let Some(buffer) = &self.zero_buffer {
            queue.write_buffer(buffer, 0, globals);
        }
    }

    /// Encode a single draw with the base pipeline.
    pub fn draw_single(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        mesh: &Mesh,
        instances: &wgpu::Buffer,
        frame: &FrameContext,
    ) {
        pass.set_pipeline(&self.base_pipeline);
        self.bind_common(pass, frame);
        pass.set_bind_group(
            binding::GROUP_LIGHT,
            frame.primary_light_bind_group(),
            &[],
        );
        pass.set_bind_group(binding::GROUP_GLOBALS, &self.globals_bind_group, &[]);
        encode_mesh(pass, mesh, instances);
    }

    /// Encode one draw per visible light, handing the ambient term to the
    /// first pass and switching to the additive pipeline afterwards. With no
    /// visible lights nothing is drawn.
    pub fn draw_lit(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        mesh: &Mesh,
        instances: &wgpu::Buffer,
        frame: &FrameContext,
    ) {
        let visibility = frame.light_visibility();
        let plan = light_passes_with(
            frame.ambient_light,
            &visibility,
            self.first_state,
            self.rest_state,
        );
        for (index, step) in plan.iter().enumerate() {
            if index == 0 {
                pass.set_pipeline(&self.base_pipeline);
            } else if let Some(accumulate) = &self.accumulate_pipeline {
                pass.set_pipeline(accumulate);
            }
            self.bind_common(pass, frame);
            pass.set_bind_group(
                binding::GROUP_LIGHT,
                &frame.lights[step.light].bind_group,
                &[],
            );
            let globals = if index == 0 {
                &self.globals_bind_group
            } else {
                self.zero_bind_group.as_ref().unwrap_or(&self.globals_bind_group)
            };
            pass.set_bind_group(binding::GROUP_GLOBALS, globals, &[]);
            encode_mesh(pass, mesh, instances);
        }
    }

    fn bind_common(&self, pass: &mut wgpu::RenderPass<'_>, frame: &FrameContext) {
        pass.set_bind_group(binding::GROUP_TEXTURES, &self.texture_bind_group, &[]);
        pass.set_bind_group(binding::GROUP_CAMERA, frame.camera_bind_group, &[]);
    }
}

fn mk_globals_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub(crate) fn encode_mesh(pass: &mut wgpu::RenderPass<'_>, mesh: &Mesh, instances: &wgpu::Buffer) {
    pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
    pass.set_vertex_buffer(1, instances.slice(..));
    pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
    pass.draw_indexed(0..mesh.num_elements, 0, 0..1);
}
