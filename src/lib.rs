//! lumina
//!
//! A material and shading library on top of wgpu: scene nodes with swappable
//! surface looks, multi-light accumulation, image-based lighting and
//! volumetric ray marching, all driven by immutable per-state pipelines. The
//! crate is headless by design; it renders into caller-provided targets and
//! leaves windowing and asset decoding to the embedding application.
//!
//! High-level modules
//! - `camera`: camera types and uniforms for view/projection
//! - `context`: central GPU context that owns device/queue and shared resources
//! - `data_structures`: meshes, instances, textures and CPU density fields
//! - `materials`: the material families and the draw-state planner
//! - `pipelines`: binding conventions, pipeline construction and WGSL shaders
//! - `scene`: nodes, lights, the skybox shell and frame composition
//! - `editor`: runtime variant selection (meshes, environments, datasets)
//!

pub mod camera;
pub mod context;
pub mod data_structures;
pub mod editor;
pub mod materials;
pub mod pipelines;
pub mod scene;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::*;
pub use wgpu::*;
