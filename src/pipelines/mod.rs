//! Pipeline construction and the shader binding convention.
//!
//! The WGSL sources live beside this module and are compiled by the material
//! that owns them; `binding` pins the texture slot table they all share and
//! `common` builds render pipelines from draw-state descriptors.

pub mod binding;
pub mod common;
