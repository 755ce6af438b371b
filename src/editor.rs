//! Runtime variant selection: meshes, skyboxes, volume datasets and transfer
//! functions.
//!
//! The editor owns one index per discrete choice and applies changes to the
//! scene. Selection is forgiving: an out-of-range index leaves both the
//! selection and the scene untouched, and a mesh variant without its own
//! albedo keeps whatever map the node's material already carries.

use anyhow::Result;

use crate::{
    context::Context,
    data_structures::{mesh::Mesh, texture::Texture, volume::Volume},
    materials::VolumeMaterial,
    scene::{SceneNode, SkyboxNode},
};

/// A selectable mesh, optionally bringing its own base color map.
pub struct MeshVariant {
    pub name: String,
    pub mesh: Mesh,
    pub albedo: Option<Texture>,
}

/// A selectable environment: six cubemap faces of equal square size.
pub struct SkyboxVariant {
    pub name: String,
    pub face_size: u32,
    pub faces: [Vec<u8>; 6],
}

/// A selectable density dataset.
pub struct VolumeVariant {
    pub name: String,
    pub volume: Volume,
}

/// A density-to-color mapping baked into a 256-entry lookup texture.
#[derive(Clone, Debug, PartialEq)]
pub enum TransferFunction {
    /// High densities only, bone-white with a hard opacity ramp.
    Bones,
    /// The mid-density band in reds.
    Muscles,
    /// Muscles in the mid band plus bones above it.
    Combined,
    /// A caller-provided table.
    Custom(Box<[[u8; 4]; 256]>),
}

impl TransferFunction {
    pub fn table(&self) -> [[u8; 4]; 256] {
        let mut table = [[0u8; 4]; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let d = i as f32 / 255.0;
            *entry = match self {
                TransferFunction::Bones => bones_entry(d),
                TransferFunction::Muscles => muscles_entry(d),
                TransferFunction::Combined => {
                    if d < 0.45 {
                        muscles_entry(d)
                    } else {
                        bones_entry(d)
                    }
                }
                TransferFunction::Custom(table) => table[i],
            };
        }
        table
    }

    pub fn to_texture(&self, ctx: &Context, label: &str) -> Texture {
        Texture::lut_256(&ctx.device, &ctx.queue, label, &self.table())
    }
}

fn bones_entry(d: f32) -> [u8; 4] {
    let alpha = ((d - 0.4) / 0.2).clamp(0.0, 1.0);
    let tone = (200.0 + 55.0 * d) as u8;
    [tone, tone, (tone as f32 * 0.9) as u8, (alpha * 255.0) as u8]
}

fn muscles_entry(d: f32) -> [u8; 4] {
    let band = ((d - 0.1) / 0.1).clamp(0.0, 1.0) * (1.0 - ((d - 0.4) / 0.1).clamp(0.0, 1.0));
    [
        (120.0 + 100.0 * d) as u8,
        (30.0 * d) as u8,
        (30.0 * d) as u8,
        (band * 160.0) as u8,
    ]
}

/// Accept `requested` as a selection into a list of `len` variants.
///
/// `None` means the request was out of range and nothing may change.
fn accept_selection(requested: usize, len: usize) -> Option<usize> {
    (requested < len).then_some(requested)
}

/// The current selections, one per discrete choice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorState {
    pub mesh_selected: usize,
    pub skybox_selected: usize,
    pub volume_selected: usize,
    pub transfer_selected: usize,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put the chosen mesh variant on `node`. When the variant has no albedo
    /// of its own, the material keeps the map it is already wearing.
    pub fn select_mesh(
        &mut self,
        ctx: &Context,
        node: &mut SceneNode,
        variants: &[MeshVariant],
        requested: usize,
    ) -> bool {
        let Some(index) = accept_selection(requested, variants.len()) else {
            log::warn!("mesh selection {requested} out of range, ignoring");
            return false;
        };
        self.mesh_selected = index;
        let variant = &variants[index];
        node.set_mesh(variant.mesh.clone());
        if let Some(albedo) = &variant.albedo {
            if let Some(material) = node.material_mut() {
                material.set_base_texture(ctx, albedo.clone());
            }
        }
        true
    }

    /// Swap the skybox environment to the chosen variant, in place.
    pub fn select_skybox(
        &mut self,
        ctx: &Context,
        skybox: &SkyboxNode,
        variants: &[SkyboxVariant],
        requested: usize,
    ) -> Result<bool> {
        let Some(index) = accept_selection(requested, variants.len()) else {
            log::warn!("skybox selection {requested} out of range, ignoring");
            return Ok(false);
        };
        let variant = &variants[index];
        let applied =
            skybox.set_environment_faces(&ctx.queue, variant.face_size, &variant.faces)?;
        if applied {
            self.skybox_selected = index;
        }
        Ok(applied)
    }

    /// Load the chosen density dataset into the volume material.
    pub fn select_volume(
        &mut self,
        ctx: &Context,
        material: &mut VolumeMaterial,
        variants: &[VolumeVariant],
        requested: usize,
    ) -> Result<bool> {
        let Some(index) = accept_selection(requested, variants.len()) else {
            log::warn!("volume selection {requested} out of range, ignoring");
            return Ok(false);
        };
        material.set_volume(ctx, &variants[index].volume)?;
        self.volume_selected = index;
        Ok(true)
    }

    /// Bind the chosen transfer function to the volume material.
    pub fn select_transfer(
        &mut self,
        ctx: &Context,
        material: &mut VolumeMaterial,
        variants: &[TransferFunction],
        requested: usize,
    ) -> bool {
        let Some(index) = accept_selection(requested, variants.len()) else {
            log::warn!("transfer selection {requested} out of range, ignoring");
            return false;
        };
        self.transfer_selected = index;
        let texture = variants[index].to_texture(ctx, "transfer function");
        material.set_transfer(ctx, Some(texture));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorState, TransferFunction, accept_selection};

    #[test]
    fn out_of_range_selection_is_rejected() {
        assert_eq!(accept_selection(0, 3), Some(0));
        assert_eq!(accept_selection(2, 3), Some(2));
        assert_eq!(accept_selection(3, 3), None);
        assert_eq!(accept_selection(7, 0), None);
    }

    #[test]
    fn default_state_selects_the_first_variant_everywhere() {
        let state = EditorState::new();
        assert_eq!(state, EditorState::default());
        assert_eq!(state.mesh_selected, 0);
    }

    #[test]
    fn bones_transfer_hides_low_densities() {
        let table = TransferFunction::Bones.table();
        assert_eq!(table[0][3], 0);
        assert_eq!(table[64][3], 0);
        assert_eq!(table[255][3], 255);
    }

    #[test]
    fn muscles_transfer_peaks_in_the_mid_band() {
        let table = TransferFunction::Muscles.table();
        assert_eq!(table[0][3], 0);
        assert!(table[70][3] > 0);
        assert_eq!(table[255][3], 0);
        // Reds dominate throughout the visible band.
        assert!(table[70][0] > table[70][1]);
    }

    #[test]
    fn combined_transfer_shows_both_bands() {
        let table = TransferFunction::Combined.table();
        assert!(table[70][3] > 0, "muscle band missing");
        assert!(table[230][3] > 0, "bone band missing");
        assert_eq!(table[70], TransferFunction::Muscles.table()[70]);
        assert_eq!(table[230], TransferFunction::Bones.table()[230]);
    }

    #[test]
    fn custom_transfer_round_trips() {
        let mut raw = [[1u8, 2, 3, 4]; 256];
        raw[10] = [9, 9, 9, 9];
        let table = TransferFunction::Custom(Box::new(raw)).table();
        assert_eq!(table, raw);
    }
}
