//! The texture binding convention shared by every material family.
//!
//! Materials hand their parameter sets to shaders through fixed binding
//! indices in bind group 0; the remaining groups are uniforms (1: camera,
//! 2: light, 3: per-material globals). The indices below are a stable
//! convention and must not be renumbered, shaders and any pipeline sharing
//! them depend on the exact values.
//!
//! Optional maps degrade silently: when a material has no texture for a slot,
//! the bind group is built with a neutral 1x1 stand-in (white, black or flat
//! normal) so the shader path stays uniform whether or not the map exists.

use crate::data_structures::texture::Texture;

// Surface material family.
pub const BIND_ALBEDO: u32 = 0;
pub const BIND_NORMAL: u32 = 1;
pub const BIND_ROUGHNESS: u32 = 2;
pub const BIND_METALNESS: u32 = 3;
pub const BIND_BRDF_LUT: u32 = 4;
pub const BIND_ENVIRONMENT: u32 = 5;
/// Prefiltered environment levels occupy five consecutive slots, one per
/// roughness band 0..4.
pub const BIND_PREFILTERED_BASE: u32 = 6;
pub const PREFILTERED_LEVELS: u32 = 5;
pub const BIND_EMISSIVE: u32 = 11;
pub const BIND_OPACITY: u32 = 12;
/// Samplers sit above the texture table.
pub const BIND_SAMPLER: u32 = 13;
pub const BIND_CUBE_SAMPLER: u32 = 14;

// Volume material family.
pub const BIND_DENSITY: u32 = 0;
pub const BIND_BLUE_NOISE: u32 = 1;
pub const BIND_TRANSFER: u32 = 2;
pub const BIND_VOLUME_SAMPLER: u32 = 3;
pub const BIND_NOISE_SAMPLER: u32 = 4;

// Bind group slots.
pub const GROUP_TEXTURES: u32 = 0;
pub const GROUP_CAMERA: u32 = 1;
pub const GROUP_LIGHT: u32 = 2;
pub const GROUP_GLOBALS: u32 = 3;

/// Neutral stand-in maps substituted for absent optional textures.
#[derive(Clone, Debug)]
pub struct FallbackMaps {
    /// Opaque white: opacity, albedo, roughness/metalness, transfer function.
    pub white: Texture,
    /// Black: emissive.
    pub black: Texture,
    /// Flat +Z normal.
    pub normal: Texture,
    /// Mid-gray: jitter noise (a constant offset, i.e. no visible jitter).
    pub gray: Texture,
}

impl FallbackMaps {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        Self {
            white: Texture::solid_color(device, queue, "fallback white", [255, 255, 255, 255]),
            black: Texture::solid_color(device, queue, "fallback black", [0, 0, 0, 255]),
            normal: Texture::solid_color(device, queue, "fallback normal", [127, 127, 255, 255]),
            gray: Texture::solid_color(device, queue, "fallback gray", [127, 127, 127, 255]),
        }
    }
}

fn texture_2d_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn texture_cube_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::Cube,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn texture_3d_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D3,
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Layout for a single uniform buffer at binding 0 (camera, light, globals).
pub fn uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some(label),
    })
}

pub fn mk_uniform_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    buffer: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: buffer.as_entire_binding(),
        }],
        label: Some(label),
    })
}

/// Texture layout for the flat/texture/phong materials: albedo + normal.
pub fn surface_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture_2d_entry(BIND_ALBEDO),
            texture_2d_entry(BIND_NORMAL),
            sampler_entry(BIND_SAMPLER),
        ],
        label: Some("surface textures"),
    })
}

pub fn mk_surface_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    fallbacks: &FallbackMaps,
    albedo: Option<&Texture>,
    normal: Option<&Texture>,
) -> wgpu::BindGroup {
    let albedo = albedo.unwrap_or(&fallbacks.white);
    let normal = normal.unwrap_or(&fallbacks.normal);
    let sampler = albedo
        .sampler
        .as_ref()
        .unwrap_or_else(|| fallbacks.white.sampler.as_ref().expect("fallback sampler"));
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: BIND_ALBEDO,
                resource: wgpu::BindingResource::TextureView(&albedo.view),
            },
            wgpu::BindGroupEntry {
                binding: BIND_NORMAL,
                resource: wgpu::BindingResource::TextureView(&normal.view),
            },
            wgpu::BindGroupEntry {
                binding: BIND_SAMPLER,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
        label: Some("surface textures"),
    })
}

/// Texture layout for the skybox/reflective materials: environment cubemap.
pub fn environment_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture_cube_entry(BIND_ENVIRONMENT),
            sampler_entry(BIND_CUBE_SAMPLER),
        ],
        label: Some("environment"),
    })
}

pub fn mk_environment_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    environment: &Texture,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: BIND_ENVIRONMENT,
                resource: wgpu::BindingResource::TextureView(&environment.view),
            },
            wgpu::BindGroupEntry {
                binding: BIND_CUBE_SAMPLER,
                resource: wgpu::BindingResource::Sampler(
                    environment.sampler.as_ref().expect("cubemap sampler"),
                ),
            },
        ],
        label: Some("environment"),
    })
}

/// Full PBR texture layout: material maps, BRDF LUT, environment and the five
/// prefiltered roughness bands.
pub fn pbr_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        texture_2d_entry(BIND_ALBEDO),
        texture_2d_entry(BIND_NORMAL),
        texture_2d_entry(BIND_ROUGHNESS),
        texture_2d_entry(BIND_METALNESS),
        texture_2d_entry(BIND_BRDF_LUT),
        texture_cube_entry(BIND_ENVIRONMENT),
    ];
    for level in 0..PREFILTERED_LEVELS {
        entries.push(texture_cube_entry(BIND_PREFILTERED_BASE + level));
    }
    entries.push(texture_2d_entry(BIND_EMISSIVE));
    entries.push(texture_2d_entry(BIND_OPACITY));
    entries.push(sampler_entry(BIND_SAMPLER));
    entries.push(sampler_entry(BIND_CUBE_SAMPLER));
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &entries,
        label: Some("pbr textures"),
    })
}

/// The PBR material's texture references. Environment pieces are required;
/// the 2D maps are optional and degrade to neutral defaults.
pub struct PbrTextureSet<'a> {
    pub albedo: Option<&'a Texture>,
    pub normal: Option<&'a Texture>,
    pub roughness: Option<&'a Texture>,
    pub metalness: Option<&'a Texture>,
    pub emissive: Option<&'a Texture>,
    pub opacity: Option<&'a Texture>,
    pub brdf_lut: &'a Texture,
    pub environment: &'a Texture,
    pub prefiltered: &'a [Texture; PREFILTERED_LEVELS as usize],
}

pub fn mk_pbr_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    fallbacks: &FallbackMaps,
    set: &PbrTextureSet,
) -> wgpu::BindGroup {
    let albedo = set.albedo.unwrap_or(&fallbacks.white);
    let normal = set.normal.unwrap_or(&fallbacks.normal);
    let roughness = set.roughness.unwrap_or(&fallbacks.white);
    let metalness = set.metalness.unwrap_or(&fallbacks.white);
    // Missing emissive is black, missing opacity is fully opaque white.
    let emissive = set.emissive.unwrap_or(&fallbacks.black);
    let opacity = set.opacity.unwrap_or(&fallbacks.white);
    let sampler = fallbacks.white.sampler.as_ref().expect("fallback sampler");
    let cube_sampler = set
        .environment
        .sampler
        .as_ref()
        .expect("cubemap sampler");
    let mut entries = vec![
        wgpu::BindGroupEntry {
            binding: BIND_ALBEDO,
            resource: wgpu::BindingResource::TextureView(&albedo.view),
        },
        wgpu::BindGroupEntry {
            binding: BIND_NORMAL,
            resource: wgpu::BindingResource::TextureView(&normal.view),
        },
        wgpu::BindGroupEntry {
            binding: BIND_ROUGHNESS,
            resource: wgpu::BindingResource::TextureView(&roughness.view),
        },
        wgpu::BindGroupEntry {
            binding: BIND_METALNESS,
            resource: wgpu::BindingResource::TextureView(&metalness.view),
        },
        wgpu::BindGroupEntry {
            binding: BIND_BRDF_LUT,
            resource: wgpu::BindingResource::TextureView(&set.brdf_lut.view),
        },
        wgpu::BindGroupEntry {
            binding: BIND_ENVIRONMENT,
            resource: wgpu::BindingResource::TextureView(&set.environment.view),
        },
    ];
    for (level, prefiltered) in set.prefiltered.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: BIND_PREFILTERED_BASE + level as u32,
            resource: wgpu::BindingResource::TextureView(&prefiltered.view),
        });
    }
    entries.push(wgpu::BindGroupEntry {
        binding: BIND_EMISSIVE,
        resource: wgpu::BindingResource::TextureView(&emissive.view),
    });
    entries.push(wgpu::BindGroupEntry {
        binding: BIND_OPACITY,
        resource: wgpu::BindingResource::TextureView(&opacity.view),
    });
    entries.push(wgpu::BindGroupEntry {
        binding: BIND_SAMPLER,
        resource: wgpu::BindingResource::Sampler(sampler),
    });
    entries.push(wgpu::BindGroupEntry {
        binding: BIND_CUBE_SAMPLER,
        resource: wgpu::BindingResource::Sampler(cube_sampler),
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &entries,
        label: Some("pbr textures"),
    })
}

/// Texture layout for the volume family: density field, jitter noise and
/// transfer-function LUT.
pub fn volume_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            texture_3d_entry(BIND_DENSITY),
            texture_2d_entry(BIND_BLUE_NOISE),
            texture_2d_entry(BIND_TRANSFER),
            sampler_entry(BIND_VOLUME_SAMPLER),
            sampler_entry(BIND_NOISE_SAMPLER),
        ],
        label: Some("volume textures"),
    })
}

pub fn mk_volume_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    fallbacks: &FallbackMaps,
    density: &Texture,
    noise: Option<&Texture>,
    transfer: Option<&Texture>,
) -> wgpu::BindGroup {
    let noise = noise.unwrap_or(&fallbacks.gray);
    let transfer = transfer.unwrap_or(&fallbacks.white);
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: BIND_DENSITY,
                resource: wgpu::BindingResource::TextureView(&density.view),
            },
            wgpu::BindGroupEntry {
                binding: BIND_BLUE_NOISE,
                resource: wgpu::BindingResource::TextureView(&noise.view),
            },
            wgpu::BindGroupEntry {
                binding: BIND_TRANSFER,
                resource: wgpu::BindingResource::TextureView(&transfer.view),
            },
            wgpu::BindGroupEntry {
                binding: BIND_VOLUME_SAMPLER,
                resource: wgpu::BindingResource::Sampler(
                    density.sampler.as_ref().expect("density sampler"),
                ),
            },
            wgpu::BindGroupEntry {
                binding: BIND_NOISE_SAMPLER,
                resource: wgpu::BindingResource::Sampler(
                    noise
                        .sampler
                        .as_ref()
                        .unwrap_or_else(|| fallbacks.gray.sampler.as_ref().expect("sampler")),
                ),
            },
        ],
        label: Some("volume textures"),
    })
}
