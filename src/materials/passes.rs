//! Draw-state descriptors and the multi-light pass planner.
//!
//! Blend, depth, cull and fill state in wgpu is baked into immutable
//! pipelines, so the state transitions the materials need are described here
//! as plain data. Each material builds one pipeline per [`DrawState`] it uses
//! and selects between them per draw; state can never leak between materials
//! because every draw names its complete state.
//!
//! [`light_passes`] is the planning half of multi-light accumulation: it turns
//! the scene's light visibility into the exact sequence of draws a
//! Phong-family material must issue, including the ambient hand-off and the
//! blend/depth switch after the first pass.

/// How a draw combines with the framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Blend {
    /// Overwrite; the state of the first (or only) pass of every material.
    Replace,
    /// `src_alpha, one`: summation for light accumulation passes.
    Additive,
    /// Standard alpha compositing for transparent surfaces.
    Alpha,
    /// `one, one_minus_src_alpha`: compositing colors already weighted by
    /// their alpha, as the volume march emits them.
    Premultiplied,
}

/// Depth testing mode for a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthTest {
    /// Default test.
    Less,
    /// Relaxed test so coincident-depth fragments from earlier passes of the
    /// same mesh are not rejected.
    LessEqual,
    /// No test at all; the skybox must appear behind everything regardless of
    /// depth buffer contents.
    Disabled,
}

/// Face culling for a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Culling {
    None,
    Back,
    /// Cull front faces so only the far side of the mesh rasterizes. Volume
    /// boxes march from their back faces, and the PBR transparency pass shows
    /// back faces only.
    Front,
}

/// Rasterization fill mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fill {
    Solid,
    Lines,
}

/// The complete fixed-function state of one draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawState {
    pub blend: Blend,
    pub depth: DepthTest,
    pub depth_write: bool,
    pub cull: Culling,
    pub fill: Fill,
}

impl DrawState {
    /// Default opaque state: first pass of every shaded material.
    pub const OPAQUE: Self = Self {
        blend: Blend::Replace,
        depth: DepthTest::Less,
        depth_write: true,
        cull: Culling::None,
        fill: Fill::Solid,
    };

    /// Accumulation passes 1..N-1 of the multi-light loop.
    pub const ACCUMULATE: Self = Self {
        blend: Blend::Additive,
        depth: DepthTest::LessEqual,
        depth_write: true,
        cull: Culling::None,
        fill: Fill::Solid,
    };

    /// Skybox shell: depth testing disabled for the duration of its own draw.
    pub const SKY: Self = Self {
        blend: Blend::Replace,
        depth: DepthTest::Disabled,
        depth_write: false,
        cull: Culling::None,
        fill: Fill::Solid,
    };

    /// Line-mode overlay.
    pub const WIREFRAME: Self = Self {
        blend: Blend::Replace,
        depth: DepthTest::Less,
        depth_write: true,
        cull: Culling::None,
        fill: Fill::Lines,
    };

    /// PBR transparency pass: back faces only, composited over what is behind.
    pub const SEE_THROUGH: Self = Self {
        blend: Blend::Alpha,
        depth: DepthTest::Less,
        depth_write: false,
        cull: Culling::Front,
        fill: Fill::Solid,
    };

    /// Volume bounding box: ray entry comes from the mesh's back faces, and
    /// the march emits premultiplied color that composites over the scene
    /// without occluding it.
    pub const VOLUME_BOX: Self = Self {
        blend: Blend::Premultiplied,
        depth: DepthTest::Less,
        depth_write: false,
        cull: Culling::Front,
        fill: Fill::Solid,
    };

    /// Iso-surface accumulation passes keep the volume-box culling.
    pub const VOLUME_BOX_ACCUMULATE: Self = Self {
        blend: Blend::Additive,
        depth: DepthTest::LessEqual,
        depth_write: false,
        cull: Culling::Front,
        fill: Fill::Solid,
    };

    pub fn blend_state(&self) -> wgpu::BlendState {
        match self.blend {
            Blend::Replace => wgpu::BlendState {
                color: wgpu::BlendComponent::REPLACE,
                alpha: wgpu::BlendComponent::REPLACE,
            },
            Blend::Additive => wgpu::BlendState {
                color: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::SrcAlpha,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
                alpha: wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                },
            },
            Blend::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            Blend::Premultiplied => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
        }
    }

    pub fn depth_state(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.depth_write,
            depth_compare: match self.depth {
                DepthTest::Less => wgpu::CompareFunction::Less,
                DepthTest::LessEqual => wgpu::CompareFunction::LessEqual,
                DepthTest::Disabled => wgpu::CompareFunction::Always,
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }
    }

    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        // Meshes wind counter-clockwise throughout, so the winding convention
        // stays fixed and only the culled face set varies.
        let cull_mode = match self.cull {
            Culling::None => None,
            Culling::Back => Some(wgpu::Face::Back),
            Culling::Front => Some(wgpu::Face::Front),
        };
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: match self.fill {
                Fill::Solid => wgpu::PolygonMode::Fill,
                Fill::Lines => wgpu::PolygonMode::Line,
            },
            unclipped_depth: false,
            conservative: false,
        }
    }
}

/// One draw of the multi-light accumulation loop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightPass {
    /// Index into the scene's light list.
    pub light: usize,
    /// Ambient term uploaded for this draw. Only the first pass carries the
    /// frame ambient; it has already been contributed once afterwards.
    pub ambient: [f32; 3],
    pub state: DrawState,
}

/// Plan the draw sequence for a Phong-family material.
///
/// One pass per visible light: the first gets the frame ambient with default
/// blend and depth state, the rest get zero ambient with additive blending and
/// a relaxed depth test. Invisible lights consume no pass at all. An empty
/// plan (no lights, or none visible) means the material draws nothing.
pub fn light_passes(ambient: [f32; 3], visible: &[bool]) -> Vec<LightPass> {
    light_passes_with(ambient, visible, DrawState::OPAQUE, DrawState::ACCUMULATE)
}

/// [`light_passes`] with caller-chosen first/accumulation states, for
/// materials that need to keep extra state (e.g. the iso-surface material's
/// front-face culling) across the whole loop.
pub fn light_passes_with(
    ambient: [f32; 3],
    visible: &[bool],
    first: DrawState,
    rest: DrawState,
) -> Vec<LightPass> {
    let mut passes = Vec::new();
    for (light, _) in visible.iter().enumerate().filter(|&(_, &v)| v) {
        if passes.is_empty() {
            passes.push(LightPass {
                light,
                ambient,
                state: first,
            });
        } else {
            passes.push(LightPass {
                light,
                ambient: [0.0; 3],
                state: rest,
            });
        }
    }
    passes
}
