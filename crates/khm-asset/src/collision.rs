use std::f32::consts::PI;

use glam::{Mat4, Vec3};

use crate::loader::khm::format::{CollisionPolygon, CollisionShapeType, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct ConvexMesh {
    pub polygons: Vec<CollisionPolygon>,
    pub indices: Vec<u16>,
    pub vertices: Vec<Vector3>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    pub indices: Vec<u16>,
    pub vertices: Vec<Vector3>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollisionGeometry {
    Sphere {
        radius: f32,
    },
    /// Half extents along each local axis.
    Box {
        extents: Vec3,
    },
    Capsule {
        radius: f32,
        half_height: f32,
    },
    ConvexMesh(ConvexMesh),
    /// Declared by the format but never produced by the KHM 101 reader.
    Mesh(TriangleMesh),
    /// Declared by the format but never produced by the KHM 101 reader.
    Plane,
}

impl CollisionGeometry {
    pub fn shape_type(&self) -> CollisionShapeType {
        match self {
            CollisionGeometry::Sphere { .. } => CollisionShapeType::Sphere,
            CollisionGeometry::Box { .. } => CollisionShapeType::Box,
            CollisionGeometry::Capsule { .. } => CollisionShapeType::Capsule,
            CollisionGeometry::ConvexMesh(_) => CollisionShapeType::ConvexMesh,
            CollisionGeometry::Mesh(_) => CollisionShapeType::Mesh,
            CollisionGeometry::Plane => CollisionShapeType::Plane,
        }
    }

    /// Mesh-like shapes carry their own vertex data and may be shared
    /// between physics actors.
    pub fn is_shared(&self) -> bool {
        matches!(
            self,
            CollisionGeometry::ConvexMesh(_) | CollisionGeometry::Mesh(_)
        )
    }

    /// Closed-form volume of primitive shapes, `None` for mesh-like shapes.
    pub fn volume(&self) -> Option<f32> {
        match self {
            CollisionGeometry::Sphere { radius } => Some(sphere_volume(*radius)),
            CollisionGeometry::Box { extents } => Some(8.0 * extents.x * extents.y * extents.z),
            CollisionGeometry::Capsule {
                radius,
                half_height,
            } => Some(PI * radius * radius * 2.0 * half_height + sphere_volume(*radius)),
            CollisionGeometry::Plane => Some(0.0),
            CollisionGeometry::ConvexMesh(_) | CollisionGeometry::Mesh(_) => None,
        }
    }
}

fn sphere_volume(radius: f32) -> f32 {
    4.0 / 3.0 * PI * radius.powi(3)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionShape {
    pub transform: Mat4,
    pub geometry: CollisionGeometry,
}

impl CollisionShape {
    pub fn shape_type(&self) -> CollisionShapeType {
        self.geometry.shape_type()
    }

    pub fn is_shared(&self) -> bool {
        self.geometry.is_shared()
    }

    pub fn volume(&self) -> Option<f32> {
        self.geometry.volume()
    }
}

/// Volume estimate of a mesh from its collision shapes.
///
/// Mesh-like shapes have no closed form here, so each of them contributes the
/// volume of the whole mesh's bounding box instead of its own.
pub fn estimate_mesh_volume(shapes: &[CollisionShape], bounds_min: Vec3, bounds_max: Vec3) -> f32 {
    let size = bounds_max - bounds_min;
    let bounds_volume = size.x * size.y * size.z;
    shapes
        .iter()
        .map(|shape| shape.volume().unwrap_or(bounds_volume))
        .sum()
}
