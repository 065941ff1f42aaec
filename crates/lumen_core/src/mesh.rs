//! Triangle mesh buffers.
//!
//! A `Mesh` holds object-space geometry only; placement in the world and
//! shading are attached by the `Primitive` that references it. Triangles are
//! counter-clockwise: the geometric normal of `(p0, p1, p2)` is
//! `(p1 - p0) x (p2 - p0)`.

use std::f32::consts::{PI, TAU};

use lumen_math::Vec3;

/// Upper bound on `uv_sphere` slices and stacks, keeping vertex indices
/// within `u32`.
pub const MAX_SPHERE_DIVISIONS: u32 = 4096;

/// Indexed triangle mesh with optional per-vertex normals.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals used for shading, one per vertex when present
    pub normals: Option<Vec<Vec3>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        Self {
            positions,
            normals,
            indices,
        }
    }

    /// Planar quad with corners in counter-clockwise order, split along the
    /// `p0`-`p2` diagonal.
    pub fn quad(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        Self::new(vec![p0, p1, p2, p3], vec![0, 1, 2, 0, 2, 3], None)
    }

    /// Tessellated sphere centered at the origin, with smooth normals.
    ///
    /// `segments` slices run around the Y axis and `rings` stacks run from
    /// pole to pole. Both are clamped to `MAX_SPHERE_DIVISIONS`.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.clamp(3, MAX_SPHERE_DIVISIONS);
        let rings = rings.clamp(2, MAX_SPHERE_DIVISIONS);

        let vertex_count = (segments as usize + 1) * (rings as usize + 1);
        let mut positions = Vec::with_capacity(vertex_count);
        let mut normals = Vec::with_capacity(positions.capacity());
        for ring in 0..=rings {
            let theta = PI * ring as f32 / rings as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            for segment in 0..=segments {
                let phi = TAU * segment as f32 / segments as f32;
                let (sin_phi, cos_phi) = phi.sin_cos();
                let n = Vec3::new(sin_theta * cos_phi, cos_theta, -sin_theta * sin_phi);
                positions.push(n * radius);
                normals.push(n);
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::with_capacity(segments as usize * rings as usize * 6);
        for ring in 0..rings {
            for segment in 0..segments {
                let a = ring * stride + segment;
                let b = a + stride;
                // Skip the zero-area triangles that collapse onto a pole.
                if ring != 0 {
                    indices.extend_from_slice(&[a, b, a + 1]);
                }
                if ring != rings - 1 {
                    indices.extend_from_slice(&[a + 1, b, b + 1]);
                }
            }
        }

        Self::new(positions, indices, Some(normals))
    }

    /// Compute smooth vertex normals by averaging area-weighted face normals.
    ///
    /// Used for models that arrive without normals of their own.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [face[0] as usize, face[1] as usize, face[2] as usize];
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }
            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        self.normals = Some(normals);
    }

    /// Check that the index and normal buffers are consistent with the
    /// positions. Returns a human-readable reason on failure.
    ///
    /// Vertex values themselves are not inspected here.
    pub fn validate(&self) -> Result<(), String> {
        if self.indices.is_empty() {
            return Err("mesh has no triangles".to_string());
        }
        if self.indices.len() % 3 != 0 {
            return Err(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            ));
        }
        if let Some(&bad) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.positions.len())
        {
            return Err(format!(
                "index {} out of range for {} vertices",
                bad,
                self.positions.len()
            ));
        }
        if let Some(normals) = &self.normals {
            if normals.len() != self.positions.len() {
                return Err(format!(
                    "{} normals for {} vertices",
                    normals.len(),
                    self.positions.len()
                ));
            }
        }
        Ok(())
    }

    /// Vertex indices of triangle `i`.
    #[inline]
    pub fn triangle(&self, i: usize) -> [usize; 3] {
        let base = 3 * i;
        [
            self.indices[base] as usize,
            self.indices[base + 1] as usize,
            self.indices[base + 2] as usize,
        ]
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}
