//! Embree 4 backend.
//!
//! Manual FFI bindings to Intel Embree 4, avoiding a bindgen dependency.
//! Only the calls needed for a single-level triangle scene are declared.
//! Each scene primitive becomes one Embree geometry whose ID is the
//! primitive index.

use std::ffi::c_void;

use lumen_core::Scene;
use lumen_math::{Ray, Vec2, Vec3};

use super::{AccelerationError, Accelerator, Hit};

// ============================================================================
// Embree FFI Bindings
// ============================================================================

#[allow(non_camel_case_types)]
type RTCDevice = *mut c_void;

#[allow(non_camel_case_types)]
type RTCScene = *mut c_void;

#[allow(non_camel_case_types)]
type RTCGeometry = *mut c_void;

// rtcore_geometry.h
const RTC_GEOMETRY_TYPE_TRIANGLE: u32 = 0;

// rtcore_buffer.h
const RTC_BUFFER_TYPE_INDEX: u32 = 0;
const RTC_BUFFER_TYPE_VERTEX: u32 = 1;

// rtcore_common.h
const RTC_FORMAT_UINT3: u32 = 0x5003;
const RTC_FORMAT_FLOAT3: u32 = 0x9003;

const RTC_INVALID_GEOMETRY_ID: u32 = 0xFFFF_FFFF;

// Ray structure matching Embree's RTCRay
#[repr(C, align(16))]
#[derive(Debug, Copy, Clone)]
struct RTCRay {
    org_x: f32,
    org_y: f32,
    org_z: f32,
    tnear: f32,

    dir_x: f32,
    dir_y: f32,
    dir_z: f32,
    time: f32,

    tfar: f32,
    mask: u32,
    id: u32,
    flags: u32,
}

// Hit structure matching Embree's RTCHit
#[repr(C, align(16))]
#[derive(Debug, Copy, Clone)]
struct RTCHit {
    ng_x: f32,
    ng_y: f32,
    ng_z: f32,

    u: f32,
    v: f32,

    prim_id: u32,
    geom_id: u32,
    inst_id: [u32; 1],
}

// Combined ray-hit structure for rtcIntersect1
#[repr(C, align(16))]
#[derive(Debug, Copy, Clone)]
struct RTCRayHit {
    ray: RTCRay,
    hit: RTCHit,
}

#[link(name = "embree4")]
extern "C" {
    fn rtcNewDevice(config: *const std::ffi::c_char) -> RTCDevice;
    fn rtcReleaseDevice(device: RTCDevice);
    fn rtcGetDeviceError(device: RTCDevice) -> i32;

    fn rtcNewScene(device: RTCDevice) -> RTCScene;
    fn rtcReleaseScene(scene: RTCScene);
    fn rtcCommitScene(scene: RTCScene);

    fn rtcNewGeometry(device: RTCDevice, geom_type: u32) -> RTCGeometry;
    fn rtcReleaseGeometry(geom: RTCGeometry);
    fn rtcCommitGeometry(geom: RTCGeometry);
    fn rtcAttachGeometryByID(scene: RTCScene, geom: RTCGeometry, geom_id: u32);

    fn rtcSetSharedGeometryBuffer(
        geom: RTCGeometry,
        buffer_type: u32,
        slot: u32,
        format: u32,
        ptr: *const c_void,
        byte_offset: usize,
        byte_stride: usize,
        item_count: usize,
    );

    fn rtcIntersect1(scene: RTCScene, rayhit: *mut RTCRayHit, args: *const c_void);
    fn rtcOccluded1(scene: RTCScene, ray: *mut RTCRay, args: *const c_void);
}

fn error_name(code: i32) -> &'static str {
    match code {
        1 => "RTC_ERROR_UNKNOWN",
        2 => "RTC_ERROR_INVALID_ARGUMENT",
        3 => "RTC_ERROR_INVALID_OPERATION",
        4 => "RTC_ERROR_OUT_OF_MEMORY",
        5 => "RTC_ERROR_UNSUPPORTED_CPU",
        6 => "RTC_ERROR_CANCELLED",
        _ => "UNKNOWN_ERROR",
    }
}

impl RTCRay {
    fn new(ray: &Ray, tfar: f32) -> Self {
        Self {
            org_x: ray.origin.x,
            org_y: ray.origin.y,
            org_z: ray.origin.z,
            tnear: ray.t_min,

            dir_x: ray.direction.x,
            dir_y: ray.direction.y,
            dir_z: ray.direction.z,
            time: 0.0,

            tfar,
            mask: 0xFFFF_FFFF,
            id: 0,
            flags: 0,
        }
    }
}

// ============================================================================
// EmbreeScene
// ============================================================================

/// Scene index built by Embree.
///
/// Nearest hits come straight from Embree's traversal, which does not
/// order exactly coincident hits by primitive index the way [`super::Bvh`]
/// does.
pub struct EmbreeScene {
    device: RTCDevice,
    scene: RTCScene,

    // Embree holds pointers into these buffers until the scene is released
    _vertex_data: Vec<Vec<[f32; 4]>>,
    _index_data: Vec<Vec<[u32; 3]>>,

    // Geometric normals per primitive and triangle, in winding order
    normals: Vec<Vec<Vec3>>,
}

impl EmbreeScene {
    /// Create an Embree device and commit one triangle geometry per
    /// primitive.
    pub fn build(scene: &Scene) -> Result<Self, AccelerationError> {
        // SAFETY: every handle is checked before use, and the buffers shared
        // with Embree are moved into the returned value, which releases the
        // scene before they are dropped.
        unsafe {
            let device = rtcNewDevice(std::ptr::null());
            if device.is_null() {
                return Err(AccelerationError::Backend(
                    "failed to create Embree device".to_string(),
                ));
            }
            let rtc_scene = rtcNewScene(device);
            if rtc_scene.is_null() {
                rtcReleaseDevice(device);
                return Err(AccelerationError::Backend(
                    "failed to create Embree scene".to_string(),
                ));
            }

            let mut this = Self {
                device,
                scene: rtc_scene,
                _vertex_data: Vec::with_capacity(scene.primitive_count()),
                _index_data: Vec::with_capacity(scene.primitive_count()),
                normals: Vec::with_capacity(scene.primitive_count()),
            };

            for (id, primitive) in scene.primitives().iter().enumerate() {
                // 16-byte stride keeps the last vertex readable with SSE loads.
                let vertices: Vec<[f32; 4]> = primitive
                    .positions()
                    .iter()
                    .map(|p| [p.x, p.y, p.z, 0.0])
                    .collect();
                let indices: Vec<[u32; 3]> = primitive
                    .mesh
                    .indices
                    .chunks_exact(3)
                    .map(|tri| [tri[0], tri[1], tri[2]])
                    .collect();

                let geom = rtcNewGeometry(device, RTC_GEOMETRY_TYPE_TRIANGLE);
                if geom.is_null() {
                    return Err(this.device_error("creating geometry"));
                }
                rtcSetSharedGeometryBuffer(
                    geom,
                    RTC_BUFFER_TYPE_VERTEX,
                    0,
                    RTC_FORMAT_FLOAT3,
                    vertices.as_ptr() as *const c_void,
                    0,
                    std::mem::size_of::<[f32; 4]>(),
                    vertices.len(),
                );
                rtcSetSharedGeometryBuffer(
                    geom,
                    RTC_BUFFER_TYPE_INDEX,
                    0,
                    RTC_FORMAT_UINT3,
                    indices.as_ptr() as *const c_void,
                    0,
                    std::mem::size_of::<[u32; 3]>(),
                    indices.len(),
                );
                rtcCommitGeometry(geom);
                rtcAttachGeometryByID(this.scene, geom, id as u32);
                rtcReleaseGeometry(geom);

                if rtcGetDeviceError(device) != 0 {
                    return Err(this.device_error("attaching geometry"));
                }

                this.normals.push(
                    (0..primitive.triangle_count())
                        .map(|t| primitive.geometric_normal(t))
                        .collect(),
                );
                this._vertex_data.push(vertices);
                this._index_data.push(indices);
            }

            rtcCommitScene(this.scene);
            if rtcGetDeviceError(device) != 0 {
                return Err(this.device_error("committing scene"));
            }

            log::info!(
                "Built Embree scene: {} geometries, {} triangles",
                scene.primitive_count(),
                scene.triangle_count()
            );
            Ok(this)
        }
    }

    fn device_error(&self, stage: &str) -> AccelerationError {
        // SAFETY: the device handle is valid for the lifetime of self.
        let code = unsafe { rtcGetDeviceError(self.device) };
        AccelerationError::Backend(format!("Embree error {} while {}", error_name(code), stage))
    }
}

impl Accelerator for EmbreeScene {
    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let mut rayhit = RTCRayHit {
            ray: RTCRay::new(ray, ray.t_max),
            hit: RTCHit {
                ng_x: 0.0,
                ng_y: 0.0,
                ng_z: 0.0,
                u: 0.0,
                v: 0.0,
                prim_id: RTC_INVALID_GEOMETRY_ID,
                geom_id: RTC_INVALID_GEOMETRY_ID,
                inst_id: [RTC_INVALID_GEOMETRY_ID],
            },
        };

        // SAFETY: the scene is committed and read-only; rtcIntersect1 is
        // thread-safe on committed scenes.
        unsafe { rtcIntersect1(self.scene, &mut rayhit, std::ptr::null()) };

        if rayhit.hit.geom_id == RTC_INVALID_GEOMETRY_ID {
            return None;
        }
        let primitive = rayhit.hit.geom_id as usize;
        let triangle = rayhit.hit.prim_id as usize;
        Some(Hit {
            primitive,
            triangle,
            t: rayhit.ray.tfar,
            uv: Vec2::new(rayhit.hit.u, rayhit.hit.v),
            geometric_normal: self.normals[primitive][triangle],
        })
    }

    fn occluded(&self, ray: &Ray, max_t: f32) -> bool {
        let mut rtc_ray = RTCRay::new(ray, ray.t_max.min(max_t));
        // SAFETY: as for intersect.
        unsafe { rtcOccluded1(self.scene, &mut rtc_ray, std::ptr::null()) };
        // Embree sets tfar to -inf when anything was hit.
        rtc_ray.tfar == f32::NEG_INFINITY
    }
}

impl Drop for EmbreeScene {
    fn drop(&mut self) {
        // SAFETY: handles were created in build and are released exactly once.
        unsafe {
            rtcReleaseScene(self.scene);
            rtcReleaseDevice(self.device);
        }
    }
}

// SAFETY: Embree scenes are safe to query concurrently after commit, and
// the shared buffers are never mutated after build.
unsafe impl Send for EmbreeScene {}
unsafe impl Sync for EmbreeScene {}
