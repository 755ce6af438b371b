//! Node transform data and its GPU representation.
//!
//! Every scene node carries one [`Instance`] (position, rotation, scale) that
//! is packed into an [`InstanceRaw`] and stored in a one-element instance
//! buffer, so the same vertex layout serves every material family.

use cgmath::{One, SquareMatrix};

use crate::data_structures::mesh;

/// A node transform: position, rotation (as quaternion) and non-uniform scale.
#[derive(Clone, Debug)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transform (no move, rotate or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn at(position: cgmath::Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// The inverse of [`to_matrix`](Self::to_matrix).
    ///
    /// Volume materials use this to carry view rays into the density field's
    /// local space. Returns `None` for degenerate (zero-scale) transforms.
    pub fn inverse_matrix(&self) -> Option<cgmath::Matrix4<f32>> {
        self.to_matrix().invert()
    }

    pub fn to_raw(&self) -> InstanceRaw {
        InstanceRaw {
            model: self.to_matrix().into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
        }
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/**
 * The raw instance is the actual data stored on the GPU: the model matrix
 * plus a rotation-only normal matrix (scale must not bend normals).
 */
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
}

impl mesh::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance, not per vertex.
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                // A mat4 occupies four vec4 slots.
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                // Normal matrix as three vec3 slots.
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, Matrix4, Quaternion, Rotation3, SquareMatrix, Vector3};

    use super::Instance;

    fn max_abs_diff(a: Matrix4<f32>, b: Matrix4<f32>) -> f32 {
        let a: [[f32; 4]; 4] = a.into();
        let b: [[f32; 4]; 4] = b.into();
        let mut max = 0.0f32;
        for col in 0..4 {
            for row in 0..4 {
                max = max.max((a[col][row] - b[col][row]).abs());
            }
        }
        max
    }

    #[test]
    fn inverse_round_trips_to_identity() {
        let cases = [
            Instance::new(),
            Instance::at(Vector3::new(3.0, -1.5, 8.0)),
            Instance {
                position: Vector3::new(-2.5, 0.7, 4.0),
                rotation: Quaternion::from_axis_angle(
                    Vector3::new(1.0, 2.0, -0.5).normalize(),
                    Deg(37.5),
                ),
                scale: Vector3::new(1.0, 1.0, 1.0),
            },
            Instance {
                position: Vector3::new(10.0, 20.0, -5.0),
                rotation: Quaternion::from_axis_angle(Vector3::new(0.0, 1.0, 0.0), Deg(123.0)),
                scale: Vector3::new(2.0, 0.5, 7.0),
            },
        ];
        for instance in cases {
            let inverse = instance.inverse_matrix().unwrap();
            let round_trip = instance.to_matrix() * inverse;
            assert!(
                max_abs_diff(round_trip, Matrix4::identity()) < 1e-4,
                "model * inverse strayed from identity for {instance:?}"
            );
        }
    }

    #[test]
    fn zero_scale_has_no_inverse() {
        let degenerate = Instance {
            scale: Vector3::new(0.0, 1.0, 1.0),
            ..Instance::new()
        };
        assert!(degenerate.inverse_matrix().is_none());
    }
}
