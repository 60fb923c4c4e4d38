//! Collision shape generation from part meshes.

use armature_ir::{MeshData, Transform3D};
use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use parry3d::shape::{ConvexPolyhedron, SharedShape, TriMesh};

use crate::error::ShapeError;

/// Fewest vertices a usable mesh can have.
pub const MIN_MESH_VERTICES: usize = 3;

/// Triangles with a smaller area (m^2) are dropped as degenerate.
const DEGENERATE_AREA: f32 = 1e-12;

/// A part mesh that passed validation.
///
/// Points are in the part's frame with the instance scale already applied;
/// `placement` carries the rest of the global transform.
#[derive(Debug, Clone)]
pub struct PartGeometry {
    /// Scaled part-local vertex positions.
    pub points: Vec<Point3<f32>>,
    /// Non-degenerate triangles.
    pub triangles: Vec<[u32; 3]>,
    /// Rotation and translation of the part in world space.
    pub placement: Isometry3<f32>,
    /// Total surface area (m^2).
    pub area: f32,
}

/// Rigid part of a global transform (scale excluded).
pub fn placement(transform: &Transform3D) -> Isometry3<f32> {
    let t = transform.translation;
    let r = transform.rotation;
    let rotation = UnitQuaternion::from_quaternion(Quaternion::new(
        r.w as f32, r.x as f32, r.y as f32, r.z as f32,
    ));
    Isometry3::from_parts(
        Translation3::new(t.x as f32, t.y as f32, t.z as f32),
        rotation,
    )
}

fn triangle_area(a: &Point3<f32>, b: &Point3<f32>, c: &Point3<f32>) -> f32 {
    (b - a).cross(&(c - a)).norm() * 0.5
}

/// Validate a mesh and drop its degenerate triangles.
pub fn sanitize(mesh: &MeshData, transform: &Transform3D) -> Result<PartGeometry, ShapeError> {
    let vertices = mesh.num_vertices();
    let triangles = mesh.num_triangles();
    if vertices < MIN_MESH_VERTICES || triangles == 0 {
        return Err(ShapeError::TooSmall {
            vertices,
            triangles,
        });
    }

    if let Some(&index) = mesh
        .indices
        .iter()
        .take(triangles * 3)
        .find(|&&i| i as usize >= vertices)
    {
        return Err(ShapeError::IndexOutOfRange { index, vertices });
    }

    let scale = transform.scale;
    let points: Vec<Point3<f32>> = mesh
        .vertices
        .chunks_exact(3)
        .map(|v| {
            Point3::new(
                v[0] * scale.x as f32,
                v[1] * scale.y as f32,
                v[2] * scale.z as f32,
            )
        })
        .collect();

    let mut area = 0.0;
    let kept: Vec<[u32; 3]> = mesh
        .indices
        .chunks_exact(3)
        .map(|t| [t[0], t[1], t[2]])
        .filter(|&[a, b, c]| {
            if a == b || b == c || a == c {
                return false;
            }
            let tri_area = triangle_area(
                &points[a as usize],
                &points[b as usize],
                &points[c as usize],
            );
            if tri_area <= DEGENERATE_AREA {
                return false;
            }
            area += tri_area;
            true
        })
        .collect();

    if kept.is_empty() {
        return Err(ShapeError::Degenerate);
    }

    Ok(PartGeometry {
        points,
        triangles: kept,
        placement: placement(transform),
        area,
    })
}

impl PartGeometry {
    /// Vertex positions in world space.
    pub fn world_points(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
        self.points.iter().map(move |p| self.placement * p)
    }

    /// Convex hull in the part frame, for use as a compound sub-shape.
    pub fn convex_hull(&self) -> Result<SharedShape, ShapeError> {
        if self.points.len() < 4 {
            return Err(ShapeError::Backend {
                kind: "convex hull",
                reason: "need at least 4 points".to_string(),
            });
        }
        ConvexPolyhedron::from_convex_hull(&self.points)
            .map(SharedShape::new)
            .ok_or_else(|| ShapeError::Backend {
                kind: "convex hull",
                reason: "points are coplanar".to_string(),
            })
    }
}

/// Compound of per-part convex hulls, each placed at its part transform.
pub fn convex_compound(hulls: Vec<(Isometry3<f32>, SharedShape)>) -> SharedShape {
    SharedShape::compound(hulls)
}

/// One concave mesh concatenating every part's world-space triangles.
///
/// Parry compounds cannot contain triangle meshes, so static nodes merge
/// their parts into a single mesh instead.
pub fn merged_trimesh(parts: &[&PartGeometry]) -> Result<SharedShape, ShapeError> {
    let mut vertices: Vec<Point3<f32>> = Vec::new();
    let mut indices: Vec<[u32; 3]> = Vec::new();

    for part in parts {
        let base = vertices.len() as u32;
        vertices.extend(part.world_points());
        indices.extend(
            part.triangles
                .iter()
                .map(|t| [t[0] + base, t[1] + base, t[2] + base]),
        );
    }

    match TriMesh::new(vertices, indices) {
        Ok(trimesh) => Ok(SharedShape::new(trimesh)),
        Err(e) => Err(ShapeError::Backend {
            kind: "trimesh",
            reason: format!("{:?}", e),
        }),
    }
}

/// Largest distance of any point from the line through `origin` along `axis`.
pub fn max_distance_from_axis(
    points: impl IntoIterator<Item = Point3<f32>>,
    origin: &Point3<f32>,
    axis: &Vector3<f32>,
) -> Option<f32> {
    points
        .into_iter()
        .map(|p| {
            let offset = p - origin;
            (offset - axis * offset.dot(axis)).norm()
        })
        .reduce(f32::max)
}
