//! Bounding Volume Hierarchy (BVH) acceleration structure.
//!
//! A binary tree over every world-space triangle of the scene, built with
//! a median split on the longest centroid axis. Leaves index a contiguous
//! range of the reordered triangle array.

use lumen_core::{Engine, Scene};
use lumen_math::{Aabb, Interval, Ray, Vec2, Vec3};

use super::{is_closer, tie_tolerance, Accelerator, Hit};

/// Maximum triangles per leaf node before splitting.
const LEAF_MAX_SIZE: usize = 4;

/// BVH node - either a branch with two children or a leaf with triangles.
pub enum BvhNode {
    /// Internal node with two children.
    Branch {
        left: Box<BvhNode>,
        right: Box<BvhNode>,
        bbox: Aabb,
    },
    /// Leaf node covering `triangles[start..end]`.
    Leaf { start: usize, end: usize, bbox: Aabb },
    /// Empty node (for edge cases).
    Empty,
}

impl BvhNode {
    fn bbox(&self) -> Aabb {
        match self {
            BvhNode::Empty => Aabb::EMPTY,
            BvhNode::Leaf { bbox, .. } | BvhNode::Branch { bbox, .. } => *bbox,
        }
    }

    fn count(&self) -> usize {
        match self {
            BvhNode::Empty => 0,
            BvhNode::Leaf { .. } => 1,
            BvhNode::Branch { left, right, .. } => 1 + left.count() + right.count(),
        }
    }
}

/// Triangle in world space, stored with precomputed edges.
#[derive(Debug, Clone, Copy)]
struct BvhTriangle {
    v0: Vec3,
    edge1: Vec3,
    edge2: Vec3,
    primitive: u32,
    index: u32,
    bbox: Aabb,
    centroid: Vec3,
}

impl BvhTriangle {
    fn new([v0, v1, v2]: [Vec3; 3], primitive: usize, index: usize) -> Self {
        let bbox = Aabb::enclosing([v0, v1, v2]);
        Self {
            v0,
            edge1: v1 - v0,
            edge2: v2 - v0,
            primitive: primitive as u32,
            index: index as u32,
            bbox,
            centroid: (v0 + v1 + v2) / 3.0,
        }
    }

    /// Möller-Trumbore ray-triangle intersection.
    ///
    /// Returns `t` and the barycentrics of vertices 1 and 2.
    #[inline]
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<(f32, Vec2)> {
        let h = ray.direction.cross(self.edge2);
        let a = self.edge1.dot(h);

        // Ray is parallel to triangle
        if a.abs() < 1e-12 {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.edge2.dot(q);
        ray_t.contains(t).then(|| (t, Vec2::new(u, v)))
    }

    fn to_hit(&self, t: f32, uv: Vec2) -> Hit {
        Hit {
            primitive: self.primitive as usize,
            triangle: self.index as usize,
            t,
            uv,
            geometric_normal: self.edge1.cross(self.edge2).normalize_or_zero(),
        }
    }
}

/// Pure-Rust acceleration structure.
pub struct Bvh {
    root: BvhNode,
    triangles: Vec<BvhTriangle>,
}

impl Bvh {
    /// Build over all triangles of `scene`.
    pub fn build(scene: &Scene, engine: &Engine) -> Self {
        let per_primitive = engine.parallel_map(scene.primitive_count(), |p| {
            let primitive = scene.primitive(p);
            (0..primitive.triangle_count())
                .map(|t| BvhTriangle::new(primitive.triangle(t), p, t))
                .collect::<Vec<_>>()
        });
        let mut triangles: Vec<BvhTriangle> = per_primitive.into_iter().flatten().collect();

        let root = if triangles.is_empty() {
            BvhNode::Empty
        } else {
            let len = triangles.len();
            Self::build_node(&mut triangles, 0, len)
        };

        log::debug!(
            "Built BVH: {} triangles, {} nodes",
            triangles.len(),
            root.count()
        );
        Self { root, triangles }
    }

    /// Recursive BVH construction over `triangles[start..end]`.
    ///
    /// Simple median-split approach: sort by centroid on the longest
    /// centroid axis, split in half, recurse.
    fn build_node(triangles: &mut [BvhTriangle], start: usize, end: usize) -> BvhNode {
        let items = &mut triangles[start..end];
        let bbox = items
            .iter()
            .fold(Aabb::EMPTY, |acc, tri| Aabb::surrounding(&acc, &tri.bbox));

        if items.len() <= LEAF_MAX_SIZE {
            return BvhNode::Leaf { start, end, bbox };
        }

        let centroid_bounds = Aabb::enclosing(items.iter().map(|tri| tri.centroid));
        let axis = centroid_bounds.longest_axis();

        // Ties keep insertion order so the tree is reproducible.
        items.sort_by(|a, b| {
            a.centroid[axis]
                .partial_cmp(&b.centroid[axis])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mid = start + items.len() / 2;
        let left = Self::build_node(triangles, start, mid);
        let right = Self::build_node(triangles, mid, end);

        BvhNode::Branch {
            left: Box::new(left),
            right: Box::new(right),
            bbox,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn bounds(&self) -> Aabb {
        self.root.bbox()
    }

    fn intersect_node(&self, node: &BvhNode, ray: &Ray, inv_dir: Vec3, best: &mut Option<Hit>) {
        let search = search_interval(ray, best);

        match node {
            BvhNode::Empty => {}

            BvhNode::Leaf { start, end, bbox } => {
                if bbox.hit(ray, inv_dir, search).is_none() {
                    return;
                }
                for tri in &self.triangles[*start..*end] {
                    if let Some((t, uv)) = tri.intersect(ray, search_interval(ray, best)) {
                        let accept = match best {
                            Some(hit) => is_closer(t, tri.primitive as usize, hit),
                            None => true,
                        };
                        if accept {
                            *best = Some(tri.to_hit(t, uv));
                        }
                    }
                }
            }

            BvhNode::Branch { left, right, bbox } => {
                if bbox.hit(ray, inv_dir, search).is_none() {
                    return;
                }
                let (near, far) = nearer_first(left, right, ray, inv_dir, search);
                self.intersect_node(near, ray, inv_dir, best);
                self.intersect_node(far, ray, inv_dir, best);
            }
        }
    }

    fn occluded_node(&self, node: &BvhNode, ray: &Ray, inv_dir: Vec3, ray_t: Interval) -> bool {
        match node {
            BvhNode::Empty => false,
            BvhNode::Leaf { start, end, bbox } => {
                bbox.hit(ray, inv_dir, ray_t).is_some()
                    && self.triangles[*start..*end]
                        .iter()
                        .any(|tri| tri.intersect(ray, ray_t).is_some())
            }
            BvhNode::Branch { left, right, bbox } => {
                bbox.hit(ray, inv_dir, ray_t).is_some()
                    && (self.occluded_node(left, ray, inv_dir, ray_t)
                        || self.occluded_node(right, ray, inv_dir, ray_t))
            }
        }
    }
}

/// Order two children by the distance at which the ray enters their
/// bounds. A child the ray misses goes last.
fn nearer_first<'a>(
    left: &'a BvhNode,
    right: &'a BvhNode,
    ray: &Ray,
    inv_dir: Vec3,
    search: Interval,
) -> (&'a BvhNode, &'a BvhNode) {
    let t_left = left.bbox().hit(ray, inv_dir, search);
    let t_right = right.bbox().hit(ray, inv_dir, search);
    match (t_left, t_right) {
        (Some(l), Some(r)) if r < l => (right, left),
        (None, Some(_)) => (right, left),
        _ => (left, right),
    }
}

/// Parameter range still worth searching. Extends past the current best
/// hit by the tie tolerance so an equal-t hit on a lower primitive index
/// can still replace it.
#[inline]
fn search_interval(ray: &Ray, best: &Option<Hit>) -> Interval {
    match best {
        Some(hit) => ray
            .interval()
            .with_max((hit.t + tie_tolerance(hit.t)).min(ray.t_max)),
        None => ray.interval(),
    }
}

impl Accelerator for Bvh {
    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let inv_dir = ray.direction.recip();
        let mut best = None;
        self.intersect_node(&self.root, ray, inv_dir, &mut best);
        best
    }

    fn occluded(&self, ray: &Ray, max_t: f32) -> bool {
        let ray_t = ray.interval().with_max(ray.t_max.min(max_t));
        if ray_t.is_empty() {
            return false;
        }
        self.occluded_node(&self.root, ray, ray.direction.recip(), ray_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::{Camera, Material, Mesh, SceneBuilder};
    use lumen_math::Mat4;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn camera() -> Camera {
        Camera::new()
            .with_resolution(4, 4)
            .with_position(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
    }

    fn triangle_scene(triangles: &[[Vec3; 3]]) -> Scene {
        let engine = Engine::new(2).unwrap();
        let mut builder = SceneBuilder::new(camera());
        let mat = builder.add_material(Material::default());
        for tri in triangles {
            builder.add_primitive(Mesh::new(tri.to_vec(), vec![0, 1, 2], None), Mat4::IDENTITY, mat);
        }
        builder.build(&engine).unwrap()
    }

    #[test]
    fn test_single_triangle_analytic_hit() {
        // Triangle in the z = -2 plane
        let scene = triangle_scene(&[[
            Vec3::new(-1.0, -1.0, -2.0),
            Vec3::new(1.0, -1.0, -2.0),
            Vec3::new(0.0, 1.0, -2.0),
        ]]);
        let bvh = Bvh::build(&scene, &Engine::new(1).unwrap());

        let dir = Vec3::new(0.05, 0.1, -1.0).normalize();
        let ray = Ray::new(Vec3::new(0.0, 0.0, 1.0), dir);
        let hit = bvh.intersect(&ray).unwrap();

        // Plane z = -2 reached after travelling 3 units along z
        let analytic_t = 3.0 / -dir.z;
        assert!((hit.t - analytic_t).abs() < 1e-5);
        assert_eq!(hit.primitive, 0);
        assert_eq!(hit.triangle, 0);
        assert!((hit.geometric_normal - Vec3::Z).length() < 1e-6);

        let p = ray.at(hit.t);
        let [v0, v1, v2] = scene.primitive(0).triangle(0);
        let interpolated = v0 * (1.0 - hit.uv.x - hit.uv.y) + v1 * hit.uv.x + v2 * hit.uv.y;
        assert!((interpolated - p).length() < 1e-5);

        // Pointing away and passing beside the triangle
        assert!(bvh.intersect(&Ray::new(Vec3::new(0.0, 0.0, 1.0), Vec3::Z)).is_none());
        assert!(bvh
            .intersect(&Ray::new(Vec3::new(5.0, 0.0, 1.0), Vec3::NEG_Z))
            .is_none());
    }

    #[test]
    fn test_respects_ray_bounds() {
        let scene = triangle_scene(&[[
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]]);
        let bvh = Bvh::build(&scene, &Engine::new(1).unwrap());

        let short = Ray::with_bounds(Vec3::new(0.0, 0.0, 2.0), Vec3::NEG_Z, 0.0, 1.5);
        assert!(bvh.intersect(&short).is_none());
        assert!(!bvh.occluded(&short, f32::INFINITY));

        let long = Ray::new(Vec3::new(0.0, 0.0, 2.0), Vec3::NEG_Z);
        assert!(bvh.occluded(&long, 2.5));
        assert!(!bvh.occluded(&long, 1.9));
    }

    #[test]
    fn test_equal_t_resolves_to_lowest_primitive() {
        let tri = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        // Same triangle inserted three times, plus one behind it
        let behind = tri.map(|v| v - Vec3::Z);
        let scene = triangle_scene(&[behind, tri, tri, tri]);
        let bvh = Bvh::build(&scene, &Engine::new(1).unwrap());

        for origin in [Vec3::new(0.0, 0.0, 3.0), Vec3::new(0.2, -0.3, 1.0)] {
            let hit = bvh.intersect(&Ray::new(origin, Vec3::NEG_Z)).unwrap();
            assert_eq!(hit.primitive, 1);
        }
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(17);
        let mut rand_vec = |scale: f32| {
            Vec3::new(
                rng.gen_range(-scale..scale),
                rng.gen_range(-scale..scale),
                rng.gen_range(-scale..scale),
            )
        };

        let triangles: Vec<[Vec3; 3]> = (0..200)
            .map(|_| {
                let c = rand_vec(5.0);
                [c + rand_vec(0.5), c + rand_vec(0.5), c + rand_vec(0.5)]
            })
            .collect();
        let rays: Vec<Ray> = (0..500)
            .map(|_| Ray::new(rand_vec(8.0), rand_vec(1.0).normalize()))
            .collect();

        let scene = triangle_scene(&triangles);
        let bvh = Bvh::build(&scene, &Engine::new(4).unwrap());
        assert_eq!(bvh.triangle_count(), 200);

        let mut hits = 0;
        for ray in &rays {
            let mut expected: Option<Hit> = None;
            for (i, tri) in triangles.iter().enumerate() {
                let candidate = BvhTriangle::new(*tri, i, 0);
                if let Some((t, uv)) = candidate.intersect(ray, ray.interval()) {
                    if expected.map_or(true, |best| is_closer(t, i, &best)) {
                        expected = Some(candidate.to_hit(t, uv));
                    }
                }
            }

            let actual = bvh.intersect(ray);
            assert_eq!(actual.map(|h| h.primitive), expected.map(|h| h.primitive));
            if let (Some(a), Some(e)) = (actual, expected) {
                hits += 1;
                assert!((a.t - e.t).abs() < 1e-5);
            }
            assert_eq!(bvh.occluded(ray, f32::INFINITY), expected.is_some());
        }
        assert!(hits > 10, "only {hits} rays hit anything");
    }

    #[test]
    fn test_nearer_child_visited_first() {
        let leaf = |x: f32| BvhNode::Leaf {
            start: 0,
            end: 0,
            bbox: Aabb::from_points(Vec3::new(x, -1.0, -1.0), Vec3::new(x + 1.0, 1.0, 1.0)),
        };
        let (low, high) = (leaf(0.0), leaf(4.0));
        let from_left = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let from_right = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::NEG_X);

        for ray in [from_left, from_right] {
            let inv_dir = ray.direction.recip();
            let (near, _) = nearer_first(&low, &high, &ray, inv_dir, ray.interval());
            let entry = near.bbox().hit(&ray, inv_dir, ray.interval()).unwrap();
            assert!((entry - 5.0).abs() < 1e-5, "entered nearest child at {entry}");
        }

        // A child the ray misses is never visited first
        let above = Ray::new(Vec3::new(0.5, 5.0, 0.0), Vec3::NEG_Y);
        let inv_dir = above.direction.recip();
        let (near, _) = nearer_first(&high, &low, &above, inv_dir, above.interval());
        assert!(std::ptr::eq(near, &low));
    }

    #[test]
    fn test_accelerator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Bvh>();
    }
}
