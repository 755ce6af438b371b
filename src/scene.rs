//! Scene data: nodes, lights, the skybox shell and the per-frame context.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use cgmath::{EuclideanSpace, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    context::Context,
    data_structures::{instance::Instance, mesh::{self, Mesh}, texture::Texture},
    materials::{Material, SkyboxMaterial, WireframeMaterial},
    pipelines::binding,
};

static NODE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Light data as uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    position: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
}

/// A point light with its own uniform buffer and bind group.
///
/// Lights keep their position in the scene's light list for their lifetime,
/// so a per-draw light switch is a bind group switch and nothing more.
#[derive(Debug)]
pub struct Light {
    pub name: String,
    pub position: Point3<f32>,
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    /// Invisible lights contribute no draw pass at all.
    pub visible: bool,
    buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl Light {
    pub fn new(ctx: &Context, name: impl Into<String>, position: Point3<f32>) -> Self {
        let uniform = LightUniform {
            position: [position.x, position.y, position.z, 1.0],
            diffuse: [1.0; 4],
            specular: [1.0; 4],
        };
        let buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = binding::mk_uniform_bind_group(
            &ctx.device,
            &ctx.light_bind_group_layout,
            &buffer,
            "light_bind_group",
        );
        Self {
            name: name.into(),
            position,
            diffuse: [1.0; 3],
            specular: [1.0; 3],
            visible: true,
            buffer,
            bind_group,
        }
    }

    /// Push the current light state to its uniform buffer.
    pub fn upload_contribution(&self, queue: &wgpu::Queue) {
        let uniform = LightUniform {
            position: [self.position.x, self.position.y, self.position.z, 1.0],
            diffuse: [self.diffuse[0], self.diffuse[1], self.diffuse[2], 1.0],
            specular: [self.specular[0], self.specular[1], self.specular[2], 1.0],
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

/// Everything a material needs to know about the frame being drawn.
pub struct FrameContext<'a> {
    pub camera_bind_group: &'a wgpu::BindGroup,
    pub lights: &'a [Light],
    pub fallback_light: &'a wgpu::BindGroup,
    pub ambient_light: [f32; 3],
    pub exposure: f32,
    /// Debug output selector: 0 shaded, 1 albedo, 2 normals, 3 specular.
    pub output: u32,
    pub time: f32,
}

impl FrameContext<'_> {
    pub fn light_visibility(&self) -> Vec<bool> {
        self.lights.iter().map(|light| light.visible).collect()
    }

    /// The first visible light, for single-draw materials that shade exactly
    /// one light. Falls back to the zero light when none is visible.
    pub fn primary_light_bind_group(&self) -> &wgpu::BindGroup {
        self.lights
            .iter()
            .find(|light| light.visible)
            .map(|light| &light.bind_group)
            .unwrap_or(self.fallback_light)
    }
}

/// A drawable scene entry: a shared mesh, an owned material and a transform.
pub struct SceneNode {
    pub name: String,
    pub visible: bool,
    mesh: Option<Mesh>,
    material: Option<Box<dyn Material>>,
    transform: Instance,
    instance_buffer: wgpu::Buffer,
}

impl SceneNode {
    /// Create an empty node. Unnamed nodes get a generated `Node{n}` name.
    pub fn new(ctx: &Context, name: Option<&str>) -> Self {
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("Node{}", NODE_COUNTER.fetch_add(1, Ordering::Relaxed)),
        };
        let transform = Instance::new();
        let instance_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{name} Instance Buffer")),
                contents: bytemuck::cast_slice(&[transform.to_raw()]),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            });
        Self {
            name,
            visible: true,
            mesh: None,
            material: None,
            transform,
            instance_buffer,
        }
    }

    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    pub fn set_mesh(&mut self, mesh: Mesh) {
        self.mesh = Some(mesh);
    }

    pub fn material(&self) -> Option<&dyn Material> {
        self.material.as_deref()
    }

    pub fn material_mut(&mut self) -> Option<&mut Box<dyn Material>> {
        self.material.as_mut()
    }

    /// Swap the material, carrying the previously bound base texture over to
    /// the new one when the new material arrives without its own.
    pub fn set_material(&mut self, ctx: &Context, mut material: Box<dyn Material>) {
        if material.base_texture().is_none() {
            if let Some(kept) = self
                .material
                .as_ref()
                .and_then(|old| old.base_texture())
                .cloned()
            {
                material.set_base_texture(ctx, kept);
            }
        }
        self.material = Some(material);
    }

    pub fn transform(&self) -> &Instance {
        &self.transform
    }

    /// Update the transform and its GPU copy.
    pub fn set_transform(&mut self, ctx: &Context, transform: Instance) {
        self.transform = transform;
        ctx.queue.write_buffer(
            &self.instance_buffer,
            0,
            bytemuck::cast_slice(&[self.transform.to_raw()]),
        );
    }

    /// Push per-frame material data. A node without a material uploads
    /// nothing.
    pub fn upload(&mut self, ctx: &Context, frame: &FrameContext) {
        let transform = self.transform.clone();
        if let Some(material) = &mut self.material {
            material.upload_parameters(ctx, frame, &transform);
        }
    }

    /// Encode this node's draws. A node missing its mesh or material renders
    /// nothing, by design the degraded form of a partially built scene.
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, frame: &FrameContext) {
        if !self.visible {
            return;
        }
        if let (Some(mesh), Some(material)) = (&self.mesh, &self.material) {
            material.draw(pass, mesh, &self.instance_buffer, frame);
        }
    }

    /// Encode an overlay draw of the mesh with the shared wireframe look.
    pub fn render_wireframe(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        overlay: &WireframeMaterial,
        frame: &FrameContext,
    ) {
        if !self.visible {
            return;
        }
        if let Some(mesh) = &self.mesh {
            Material::draw(overlay, pass, mesh, &self.instance_buffer, frame);
        }
    }
}

/// The environment shell: a cube around the camera wearing a
/// [`SkyboxMaterial`].
pub struct SkyboxNode {
    node: SceneNode,
    environment: Texture,
    face_size: u32,
}

impl SkyboxNode {
    pub fn new(ctx: &Context, environment: Texture) -> Self {
        let face_size = environment.texture.width();
        let mut node = SceneNode::new(ctx, Some("Skybox"));
        node.set_mesh(mesh::mk_cube(&ctx.device));
        node.material = Some(Box::new(SkyboxMaterial::new(ctx, environment.clone())));
        Self {
            node,
            environment,
            face_size,
        }
    }

    /// Re-center the shell on the camera. Called every frame so the sky never
    /// parallaxes, it only rotates with the view.
    pub fn update(&mut self, ctx: &Context) {
        let eye = ctx.camera.camera.eye;
        self.node.set_transform(
            ctx,
            Instance {
                position: eye.to_vec(),
                scale: Vector3::new(200.0, 200.0, 200.0),
                ..Instance::new()
            },
        );
    }

    /// Replace the environment wholesale by rewriting the cubemap faces in
    /// place. Every material sharing this cubemap sees the new environment on
    /// its next draw.
    ///
    /// Returns whether the rewrite was applied; a face-size mismatch keeps
    /// the current environment and reports `false`.
    pub fn set_environment_faces(
        &self,
        queue: &wgpu::Queue,
        face_size: u32,
        faces: &[Vec<u8>; 6],
    ) -> Result<bool> {
        if face_size != self.face_size {
            log::warn!(
                "skybox face size mismatch ({} != {}), keeping current environment",
                face_size,
                self.face_size
            );
            return Ok(false);
        }
        self.environment.write_cubemap_faces(queue, face_size, faces)?;
        Ok(true)
    }

    pub fn environment(&self) -> &Texture {
        &self.environment
    }

    pub fn upload(&mut self, ctx: &Context, frame: &FrameContext) {
        self.node.upload(ctx, frame);
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>, frame: &FrameContext) {
        self.node.render(pass, frame);
    }
}

/// A renderable collection of nodes and lights plus the frame globals.
pub struct Scene {
    pub nodes: Vec<SceneNode>,
    pub skybox: Option<SkyboxNode>,
    /// Index-stable list; materials address lights by position.
    pub lights: Vec<Light>,
    pub ambient_light: [f32; 3],
    pub exposure: f32,
    /// Debug output selector uploaded to every material.
    pub output: u32,
    pub time: f32,
    /// Draw a line-mode overlay over every node.
    pub render_wireframe: bool,
    wireframe_overlay: Option<WireframeMaterial>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            skybox: None,
            lights: Vec::new(),
            ambient_light: [0.1; 3],
            exposure: 1.0,
            output: 0,
            time: 0.0,
            render_wireframe: false,
            wireframe_overlay: None,
        }
    }

    fn frame<'a>(&'a self, ctx: &'a Context) -> FrameContext<'a> {
        FrameContext {
            camera_bind_group: &ctx.camera.bind_group,
            lights: &self.lights,
            fallback_light: &ctx.fallback_light_bind_group,
            ambient_light: self.ambient_light,
            exposure: self.exposure,
            output: self.output,
            time: self.time,
        }
    }

    /// Push all per-frame GPU state: lights, the skybox shell and every
    /// node's material parameters.
    pub fn upload(&mut self, ctx: &Context) {
        for light in &self.lights {
            light.upload_contribution(&ctx.queue);
        }
        if self.render_wireframe && self.wireframe_overlay.is_none() {
            self.wireframe_overlay = Some(WireframeMaterial::new(ctx, [0.0, 0.0, 0.0, 1.0]));
        }
        // The frame context borrows the light list, so nodes are walked by
        // index while it is alive.
        let lights = std::mem::take(&mut self.lights);
        {
            let frame = FrameContext {
                camera_bind_group: &ctx.camera.bind_group,
                lights: &lights,
                fallback_light: &ctx.fallback_light_bind_group,
                ambient_light: self.ambient_light,
                exposure: self.exposure,
                output: self.output,
                time: self.time,
            };
            if let Some(skybox) = &mut self.skybox {
                skybox.update(ctx);
                skybox.upload(ctx, &frame);
            }
            for node in &mut self.nodes {
                node.upload(ctx, &frame);
            }
            if let Some(overlay) = &mut self.wireframe_overlay {
                overlay.upload_parameters(ctx, &frame, &Instance::new());
            }
        }
        self.lights = lights;
    }

    /// Encode the whole scene into one render pass: sky first, then nodes,
    /// then the optional wireframe overlay.
    pub fn render(&self, ctx: &Context, pass: &mut wgpu::RenderPass<'_>) {
        let frame = self.frame(ctx);
        if let Some(skybox) = &self.skybox {
            skybox.render(pass, &frame);
        }
        for node in &self.nodes {
            node.render(pass, &frame);
        }
        if self.render_wireframe {
            if let Some(overlay) = &self.wireframe_overlay {
                for node in &self.nodes {
                    node.render_wireframe(pass, overlay, &frame);
                }
            }
        }
    }

    /// Upload and draw into `target` with the context's depth buffer.
    pub fn encode(
        &mut self,
        ctx: &Context,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) {
        self.upload(ctx);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: 0.0,
                        g: 0.0,
                        b: 0.0,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ctx.depth_texture.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        self.render(ctx, &mut pass);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
