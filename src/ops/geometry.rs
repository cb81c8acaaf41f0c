use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, warn};

use crate::types::modes::{Eye, VideoMode};

pub const SPHERE_RADIUS: f32 = 1000.0;
/// Distance from the camera to the flat-video plane.
pub const PLANE_DISTANCE: f32 = 500.0;
/// How far a mono source may drift from 2:1 before its UVs are rescaled.
pub const MONO_ASPECT_TOLERANCE: f32 = 0.1;

/// Subdivision presets for the projection sphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SphereDetail {
    #[default]
    Primary,
    Fallback,
}

impl SphereDetail {
    /// (longitude segments, latitude segments)
    pub fn segments(&self) -> (u32, u32) {
        match self {
            SphereDetail::Primary => (500, 300),
            SphereDetail::Fallback => (300, 150),
        }
    }
}

impl std::str::FromStr for SphereDetail {
    type Err = crate::types::error::PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" | "high" => Ok(SphereDetail::Primary),
            "fallback" | "low" => Ok(SphereDetail::Fallback),
            _ => Err(crate::types::error::PlayerError::InvalidEnumValue {
                kind: "sphere detail",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeshKind {
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Plane {
        width: f32,
        height: f32,
        distance: f32,
    },
}

/// Interleaved layout uploaded to the GPU vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// The single mesh the video is projected onto.
///
/// `canonical_uvs` is the mode-independent mapping captured at construction;
/// [`remap_uv`] always starts from it, so switching modes never accumulates
/// error.
#[derive(Debug)]
pub struct ProjectionMesh {
    kind: MeshKind,
    positions: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    canonical_uvs: Vec<[f32; 2]>,
    indices: Vec<u32>,
    origin: [f32; 3],
}

impl ProjectionMesh {
    /// Inside-out UV sphere centred on the camera.
    ///
    /// X is mirrored so the equirectangular image reads correctly from the
    /// inside; that mirroring also flips the triangle winding.
    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let w = width_segments.max(3);
        let h = height_segments.max(2);
        let row = (w + 1) as usize;
        let count = row * (h + 1) as usize;

        let mut positions = Vec::with_capacity(count);
        let mut uvs = Vec::with_capacity(count);
        for iy in 0..=h {
            let v = iy as f32 / h as f32;
            let theta = v * PI;
            for ix in 0..=w {
                let u = ix as f32 / w as f32;
                let phi = u * 2.0 * PI;
                positions.push([
                    radius * phi.cos() * theta.sin(),
                    radius * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                ]);
                uvs.push([u, 1.0 - v]);
            }
        }

        let mut indices = Vec::with_capacity((w * h * 6) as usize);
        for iy in 0..h {
            for ix in 0..w {
                let a = iy * (w + 1) + ix + 1;
                let b = iy * (w + 1) + ix;
                let c = (iy + 1) * (w + 1) + ix;
                let d = (iy + 1) * (w + 1) + ix + 1;
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != h - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self {
            kind: MeshKind::Sphere {
                radius,
                width_segments: w,
                height_segments: h,
            },
            canonical_uvs: uvs.clone(),
            positions,
            uvs,
            indices,
            origin: [0.0, 0.0, 0.0],
        }
    }

    /// Single quad facing the camera at `distance` along -Z.
    pub fn plane(width: f32, height: f32, distance: f32) -> Self {
        let (hw, hh, z) = (width / 2.0, height / 2.0, -distance);
        let positions = vec![[-hw, hh, z], [hw, hh, z], [-hw, -hh, z], [hw, -hh, z]];
        let uvs = vec![[0.0, 1.0], [1.0, 1.0], [0.0, 0.0], [1.0, 0.0]];
        Self {
            kind: MeshKind::Plane {
                width,
                height,
                distance,
            },
            canonical_uvs: uvs.clone(),
            positions,
            uvs,
            indices: vec![0, 2, 1, 2, 3, 1],
            origin: [0.0, 0.0, z],
        }
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn is_plane(&self) -> bool {
        matches!(self.kind, MeshKind::Plane { .. })
    }

    /// World-space centre of the mesh; the flat-mode camera looks here.
    pub fn origin(&self) -> [f32; 3] {
        self.origin
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn uvs(&self) -> &[[f32; 2]] {
        &self.uvs
    }

    pub fn canonical_uvs(&self) -> &[[f32; 2]] {
        &self.canonical_uvs
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertices(&self) -> Vec<Vertex> {
        self.positions
            .iter()
            .zip(&self.uvs)
            .map(|(p, uv)| Vertex {
                position: *p,
                uv: *uv,
            })
            .collect()
    }

    fn restore_canonical_uvs(&mut self) {
        self.uvs.copy_from_slice(&self.canonical_uvs);
    }

    /// Releases the geometry. Consuming `self` makes a second release impossible.
    pub fn release(self) {
        debug!(
            kind = ?self.kind,
            vertices = self.positions.len(),
            "released projection mesh"
        );
    }
}

/// Plane size that fills the frustum at [`PLANE_DISTANCE`] without
/// distorting the source aspect ratio.
pub fn plane_size(video_aspect: f32, fov_deg: f32, viewport_aspect: f32) -> (f32, f32) {
    let frustum_height = 2.0 * PLANE_DISTANCE * (fov_deg.to_radians() / 2.0).tan();
    if video_aspect > viewport_aspect {
        let width = frustum_height * viewport_aspect;
        (width, width / video_aspect)
    } else {
        (frustum_height * video_aspect, frustum_height)
    }
}

/// Builds the canonical mesh for `mode`. Call [`remap_uv`] afterwards.
pub fn build_mesh(
    mode: VideoMode,
    video_aspect: f32,
    fov_deg: f32,
    viewport_aspect: f32,
    detail: SphereDetail,
) -> ProjectionMesh {
    match mode {
        VideoMode::Flat => {
            let (width, height) = plane_size(video_aspect, fov_deg, viewport_aspect);
            debug!(width, height, "building video plane");
            ProjectionMesh::plane(width, height, PLANE_DISTANCE)
        }
        _ => {
            let (w, h) = detail.segments();
            debug!(w, h, "building video sphere");
            ProjectionMesh::sphere(SPHERE_RADIUS, w, h)
        }
    }
}

/// Rewrites the mesh UVs from the canonical set for the given layout.
/// Returns true when a non-2:1 mono source forced a rescale.
pub fn remap_uv(mesh: &mut ProjectionMesh, mode: VideoMode, video_aspect: f32, eye: Eye) -> bool {
    if mode == VideoMode::Flat {
        return false;
    }
    mesh.restore_canonical_uvs();

    match mode {
        VideoMode::Mono => {
            if (video_aspect - 2.0).abs() <= MONO_ASPECT_TOLERANCE {
                return false;
            }
            warn!(
                aspect = format!("{video_aspect:.2}"),
                "video aspect ratio is not 2:1, adjusting UVs"
            );
            let su = if video_aspect > 2.0 { 2.0 / video_aspect } else { 1.0 };
            let sv = if video_aspect < 2.0 { video_aspect / 2.0 } else { 1.0 };
            for uv in &mut mesh.uvs {
                uv[0] *= su;
                uv[1] *= sv;
            }
            true
        }
        VideoMode::StereoLR => {
            for uv in &mut mesh.uvs {
                uv[0] = uv[0] * 0.5 + eye.offset();
            }
            false
        }
        VideoMode::StereoTB => {
            for uv in &mut mesh.uvs {
                uv[1] = uv[1] * 0.5 + eye.offset();
            }
            false
        }
        VideoMode::Flat => false,
    }
}

/// Holds at most one live mesh and remembers which generations were retired
/// so the GPU side can free exactly those buffers.
#[derive(Debug, Default)]
pub struct Scene {
    mesh: Option<ProjectionMesh>,
    generation: u64,
    retired: Vec<u64>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and releases the current mesh, then installs `mesh`.
    pub fn replace(&mut self, mesh: ProjectionMesh) -> u64 {
        self.clear();
        self.generation += 1;
        self.mesh = Some(mesh);
        self.generation
    }

    pub fn clear(&mut self) {
        if let Some(old) = self.mesh.take() {
            self.retired.push(self.generation);
            old.release();
        }
    }

    pub fn mesh(&self) -> Option<&ProjectionMesh> {
        self.mesh.as_ref()
    }

    pub fn mesh_mut(&mut self) -> Option<&mut ProjectionMesh> {
        self.mesh.as_mut()
    }

    /// Generation of the live mesh, if any.
    pub fn generation(&self) -> Option<u64> {
        self.mesh.as_ref().map(|_| self.generation)
    }

    pub fn take_retired(&mut self) -> Vec<u64> {
        std::mem::take(&mut self.retired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_sphere() -> ProjectionMesh {
        ProjectionMesh::sphere(SPHERE_RADIUS, 24, 12)
    }

    #[test]
    fn test_sphere_vertices_lie_on_radius() {
        let mesh = small_sphere();
        assert_eq!(mesh.positions().len(), 25 * 13);
        for p in mesh.positions() {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - SPHERE_RADIUS).abs() < 0.1, "radius {r}");
        }
        // Pole rows drop their degenerate triangles.
        assert_eq!(mesh.indices().len(), (24 * 12 * 6 - 2 * 24 * 3) as usize);
    }

    #[test]
    fn test_sphere_is_mirrored_for_inside_view() {
        let mesh = small_sphere();
        // u = 0 on the equator points at +X after mirroring.
        let equator = 6 * 25;
        let p = mesh.positions()[equator];
        assert!(p[0] > 999.0);
        assert_eq!(mesh.canonical_uvs()[equator], [0.0, 0.5]);
    }

    #[test]
    fn test_primary_detail_is_denser_than_fallback() {
        let (pw, ph) = SphereDetail::Primary.segments();
        let (fw, fh) = SphereDetail::Fallback.segments();
        assert!(pw * ph > fw * fh);
    }

    #[test]
    fn test_remap_round_trips_to_canonical_for_every_mode() {
        for mode in VideoMode::ALL {
            let mut mesh = small_sphere();
            let canonical = mesh.canonical_uvs().to_vec();
            remap_uv(&mut mesh, mode, 16.0 / 9.0, Eye::Right);
            remap_uv(&mut mesh, VideoMode::Mono, 2.0, Eye::Left);
            assert_eq!(mesh.uvs(), canonical.as_slice(), "mode {mode}");
        }
    }

    #[test]
    fn test_equirectangular_mono_keeps_canonical_uvs() {
        let mut mesh = small_sphere();
        let aspect = 3840.0 / 1920.0;
        let rescaled = remap_uv(&mut mesh, VideoMode::Mono, aspect, Eye::Left);
        assert!(!rescaled);
        assert_eq!(mesh.uvs(), mesh.canonical_uvs());
    }

    #[test]
    fn test_mono_rescales_non_equirectangular_sources() {
        let mut mesh = small_sphere();
        let aspect = 16.0 / 9.0;
        assert!(remap_uv(&mut mesh, VideoMode::Mono, aspect, Eye::Left));
        for (uv, c) in mesh.uvs().iter().zip(mesh.canonical_uvs()) {
            assert_eq!(uv[0], c[0]);
            assert!((uv[1] - c[1] * aspect / 2.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_stereo_lr_splits_u_per_eye() {
        let aspect = 1920.0 / 1080.0;
        for (eye, lo, hi) in [(Eye::Left, 0.0, 0.5), (Eye::Right, 0.5, 1.0)] {
            let mut mesh = small_sphere();
            remap_uv(&mut mesh, VideoMode::StereoLR, aspect, eye);
            let min_u = mesh.uvs().iter().map(|uv| uv[0]).fold(f32::MAX, f32::min);
            let max_u = mesh.uvs().iter().map(|uv| uv[0]).fold(f32::MIN, f32::max);
            assert_eq!((min_u, max_u), (lo, hi));
            for (uv, c) in mesh.uvs().iter().zip(mesh.canonical_uvs()) {
                assert_eq!(uv[1], c[1]);
            }
        }
    }

    #[test]
    fn test_stereo_tb_splits_v_per_eye() {
        let mut mesh = small_sphere();
        remap_uv(&mut mesh, VideoMode::StereoTB, 1.0, Eye::Right);
        for (uv, c) in mesh.uvs().iter().zip(mesh.canonical_uvs()) {
            assert_eq!(uv[0], c[0]);
            assert!(uv[1] >= 0.5 && uv[1] <= 1.0);
        }
    }

    #[test]
    fn test_flat_mode_leaves_plane_uvs_alone() {
        let mut mesh = build_mesh(VideoMode::Flat, 16.0 / 9.0, 90.0, 16.0 / 9.0, SphereDetail::Fallback);
        assert!(mesh.is_plane());
        assert!(!remap_uv(&mut mesh, VideoMode::Flat, 16.0 / 9.0, Eye::Left));
        assert_eq!(mesh.uvs(), mesh.canonical_uvs());
        assert_eq!(mesh.origin(), [0.0, 0.0, -PLANE_DISTANCE]);
    }

    #[test]
    fn test_plane_size_preserves_video_aspect() {
        // Wide video in a narrow window: width bound by the window.
        let (w, h) = plane_size(2.35, 90.0, 4.0 / 3.0);
        assert!((w - 1000.0 * 4.0 / 3.0).abs() < 0.01);
        assert!((w / h - 2.35).abs() < 1e-4);

        // Narrow video in a wide window: height bound by the frustum.
        let (w, h) = plane_size(4.0 / 3.0, 90.0, 16.0 / 9.0);
        assert!((h - 1000.0).abs() < 0.01);
        assert!((w / h - 4.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_scene_keeps_one_mesh_and_retires_old_generations() {
        let mut scene = Scene::new();
        assert_eq!(scene.generation(), None);

        let g1 = scene.replace(small_sphere());
        let g2 = scene.replace(ProjectionMesh::plane(10.0, 5.0, PLANE_DISTANCE));
        assert_ne!(g1, g2);
        assert!(scene.mesh().unwrap().is_plane());
        assert_eq!(scene.take_retired(), vec![g1]);

        scene.clear();
        assert!(scene.mesh().is_none());
        assert_eq!(scene.take_retired(), vec![g2]);
        scene.clear();
        assert!(scene.take_retired().is_empty());
    }
}
