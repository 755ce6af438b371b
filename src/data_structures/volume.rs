//! Sampled 3D scalar density fields.
//!
//! A [`Volume`] is the CPU-side source of truth for the density data consumed
//! by the volume-rendering materials: a `width * height * depth` grid of
//! scalar samples in `[0, 1]`. The GPU consumes it through a 3D texture built
//! with [`Volume::to_texture`]; the CPU-side sampling, gradient estimation and
//! ray stepping here mirror the fragment-stage math and back the tests that
//! pin the marching behavior down without a GPU.

use anyhow::{Result, bail};
use cgmath::{InnerSpace, Point3, Vector3};

use crate::data_structures::texture::Texture;

/// A sampled scalar field with explicit dimensions.
#[derive(Clone, Debug)]
pub struct Volume {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    samples: Vec<f32>,
}

impl Volume {
    pub fn new(width: u32, height: u32, depth: u32, samples: Vec<f32>) -> Result<Self> {
        let expected = width as usize * height as usize * depth as usize;
        if samples.len() != expected {
            bail!(
                "volume of {width}x{height}x{depth} needs {expected} samples, got {}",
                samples.len()
            );
        }
        if width == 0 || height == 0 || depth == 0 {
            bail!("volume dimensions must be non-zero");
        }
        Ok(Self {
            width,
            height,
            depth,
            samples,
        })
    }

    /// Fill a volume by evaluating `f` at every voxel center, with arguments
    /// in normalized `[0, 1]` coordinates.
    pub fn from_fn(
        width: u32,
        height: u32,
        depth: u32,
        f: impl Fn(f32, f32, f32) -> f32,
    ) -> Result<Self> {
        let mut samples = Vec::with_capacity(width as usize * height as usize * depth as usize);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    samples.push(f(
                        (x as f32 + 0.5) / width as f32,
                        (y as f32 + 0.5) / height as f32,
                        (z as f32 + 0.5) / depth as f32,
                    ));
                }
            }
        }
        Self::new(width, height, depth, samples)
    }

    /// Assemble a volume from a stack of 2D slices along the depth axis.
    ///
    /// Slices are converted to 8-bit luma; all slices must share the
    /// dimensions of the first.
    pub fn from_slices(slices: &[image::DynamicImage]) -> Result<Self> {
        let Some(first) = slices.first() else {
            bail!("cannot build a volume out of zero slices");
        };
        let (width, height) = (first.width(), first.height());
        let mut samples = Vec::with_capacity((width * height) as usize * slices.len());
        for (idx, slice) in slices.iter().enumerate() {
            if slice.width() != width || slice.height() != height {
                bail!(
                    "slice {idx} is {}x{}, expected {width}x{height}",
                    slice.width(),
                    slice.height()
                );
            }
            samples.extend(slice.to_luma8().pixels().map(|p| p.0[0] as f32 / 255.0));
        }
        Self::new(width, height, slices.len() as u32, samples)
    }

    /// Raw voxel read with edge clamping.
    pub fn voxel(&self, x: i64, y: i64, z: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        let z = z.clamp(0, self.depth as i64 - 1) as usize;
        self.samples[(z * self.height as usize + y) * self.width as usize + x]
    }

    /// Trilinear sample at normalized coordinates in `[0, 1]³`.
    ///
    /// Voxel centers sit at `(i + 0.5) / extent`, matching linear filtering of
    /// the 3D texture with a clamping sampler.
    pub fn sample(&self, p: Point3<f32>) -> f32 {
        let fx = p.x * self.width as f32 - 0.5;
        let fy = p.y * self.height as f32 - 0.5;
        let fz = p.z * self.depth as f32 - 0.5;
        let (x0, y0, z0) = (
            fx.floor() as i64,
            fy.floor() as i64,
            fz.floor() as i64,
        );
        let (tx, ty, tz) = (fx - fx.floor(), fy - fy.floor(), fz - fz.floor());

        let mut value = 0.0;
        for dz in 0..2i64 {
            for dy in 0..2i64 {
                for dx in 0..2i64 {
                    let weight = (if dx == 0 { 1.0 - tx } else { tx })
                        * (if dy == 0 { 1.0 - ty } else { ty })
                        * (if dz == 0 { 1.0 - tz } else { tz });
                    value += weight * self.voxel(x0 + dx, y0 + dy, z0 + dz);
                }
            }
        }
        value
    }

    /// Central-difference gradient estimate at normalized coordinates.
    ///
    /// Samples at `±h` per axis and divides by `2h`. Iso-surface shading
    /// normalizes the result into a surface normal.
    pub fn gradient(&self, p: Point3<f32>, h: f32) -> Vector3<f32> {
        let h = h.abs().max(f32::EPSILON);
        Vector3::new(
            self.sample(Point3::new(p.x + h, p.y, p.z))
                - self.sample(Point3::new(p.x - h, p.y, p.z)),
            self.sample(Point3::new(p.x, p.y + h, p.z))
                - self.sample(Point3::new(p.x, p.y - h, p.z)),
            self.sample(Point3::new(p.x, p.y, p.z + h))
                - self.sample(Point3::new(p.x, p.y, p.z - h)),
        ) / (2.0 * h)
    }

    /// Quantize samples to the `R8Unorm` texels the 3D texture stores.
    pub fn to_texels(&self) -> Vec<u8> {
        self.samples
            .iter()
            .map(|&s| (s.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }

    pub fn dimensions(&self) -> (u32, u32, u32) {
        (self.width, self.height, self.depth)
    }

    /// Build the 3D texture consumed by the volume materials.
    pub fn to_texture(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
    ) -> Result<Texture> {
        Texture::volume_3d(device, queue, label, self.dimensions(), &self.to_texels())
    }
}

/// Sample positions a ray visits while marching the unit bounding cube.
///
/// The ray lives in the volume's local space, where the bounding mesh spans
/// `[-0.5, 0.5]³`. `jitter` offsets the entry point along the ray by a
/// fraction of one step (0 disables jittering); with it at 0 the positions are
/// a pure function of the inputs and bit-identical across runs. Returns an
/// empty list when the ray misses the cube.
pub fn march_positions(
    origin: Point3<f32>,
    direction: Vector3<f32>,
    step: f32,
    jitter: f32,
) -> Vec<Point3<f32>> {
    let direction = direction.normalize();
    let Some((t_enter, t_exit)) = intersect_unit_cube(origin, direction) else {
        return Vec::new();
    };
    let mut positions = Vec::new();
    let mut t = t_enter.max(0.0) + jitter * step;
    while t < t_exit {
        positions.push(origin + direction * t);
        t += step;
    }
    positions
}

/// Slab-method intersection with the `[-0.5, 0.5]³` cube.
fn intersect_unit_cube(origin: Point3<f32>, direction: Vector3<f32>) -> Option<(f32, f32)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    for axis in 0..3 {
        let o = origin[axis];
        let d = direction[axis];
        if d.abs() < 1e-12 {
            if !(-0.5..=0.5).contains(&o) {
                return None;
            }
            continue;
        }
        let (t0, t1) = ((-0.5 - o) / d, (0.5 - o) / d);
        let (t0, t1) = (t0.min(t1), t0.max(t1));
        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);
    }
    (t_enter <= t_exit && t_exit >= 0.0).then_some((t_enter, t_exit))
}

#[cfg(test)]
mod tests {
    use cgmath::{InnerSpace, Point3, Vector3};

    use super::{Volume, march_positions};

    fn ramp_volume() -> Volume {
        // Density equal to the normalized x coordinate: analytic gradient (1, 0, 0).
        Volume::from_fn(32, 32, 32, |x, _, _| x).unwrap()
    }

    #[test]
    fn rejects_wrong_sample_count() {
        assert!(Volume::new(4, 4, 4, vec![0.0; 63]).is_err());
    }

    #[test]
    fn trilinear_sample_reproduces_voxel_centers() {
        let volume = ramp_volume();
        let p = Point3::new(10.5 / 32.0, 0.5, 0.5);
        assert!((volume.sample(p) - 10.5 / 32.0).abs() < 1e-5);
    }

    #[test]
    fn gradient_direction_ignores_step_sign() {
        let volume = Volume::from_fn(24, 24, 24, |x, y, z| {
            // A smooth blob with no closed-form surface alignment.
            ((x - 0.4).powi(2) + (y - 0.6).powi(2) + (z - 0.5).powi(2)).sqrt()
        })
        .unwrap();
        let p = Point3::new(0.55, 0.45, 0.62);
        let forward = volume.gradient(p, 0.02).normalize();
        let backward = volume.gradient(p, -0.02).normalize();
        assert!((forward - backward).magnitude() < 1e-6);
    }

    #[test]
    fn gradient_converges_to_analytic_ramp() {
        let volume = ramp_volume();
        let p = Point3::new(0.5, 0.5, 0.5);
        let analytic = Vector3::new(1.0, 0.0, 0.0);
        let mut last_error = f32::INFINITY;
        for h in [0.2, 0.1, 0.05] {
            let error = (volume.gradient(p, h) - analytic).magnitude();
            assert!(error <= last_error + 1e-6, "error grew as h shrank");
            last_error = error;
        }
        assert!(last_error < 0.05, "estimate did not approach (1, 0, 0)");
    }

    #[test]
    fn march_is_deterministic_without_jitter() {
        let origin = Point3::new(-2.0, 0.1, 0.05);
        let direction = Vector3::new(1.0, 0.0, 0.0);
        let a = march_positions(origin, direction, 0.01, 0.0);
        let b = march_positions(origin, direction, 0.01, 0.0);
        assert!(!a.is_empty());
        assert_eq!(a, b, "identical inputs must yield bit-identical positions");
    }

    #[test]
    fn march_misses_return_no_positions() {
        let origin = Point3::new(-2.0, 5.0, 0.0);
        let direction = Vector3::new(1.0, 0.0, 0.0);
        assert!(march_positions(origin, direction, 0.01, 0.0).is_empty());
    }

    #[test]
    fn march_stays_inside_the_cube() {
        let origin = Point3::new(0.0, 2.0, 0.0);
        let direction = Vector3::new(0.0, -1.0, 0.0);
        for p in march_positions(origin, direction, 0.05, 0.5) {
            for axis in 0..3 {
                assert!(p[axis] >= -0.5 - 1e-5 && p[axis] <= 0.5 + 1e-5);
            }
        }
    }
}
