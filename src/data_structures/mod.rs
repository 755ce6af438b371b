//! Engine data models: meshes, node transforms, textures and density volumes.

pub mod instance;
pub mod mesh;
pub mod texture;
pub mod volume;
