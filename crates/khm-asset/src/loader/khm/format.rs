//! On-disk records of the KHM model format.
//!
//! Fixed-size records are `#[repr(C)]` plain-old-data so array sections can be
//! viewed in place. Small headers are decoded with `binrw`.

use std::{
    borrow::Cow,
    fmt::{self, Debug, Formatter},
    mem::size_of,
};

use binrw::prelude::*;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

pub const KHM_SIGNATURE: [u8; 3] = *b"KHM";
pub const KHM_VERSION: u32 = 101;
pub const KHM_MAX_OBJECT_NAME: usize = 48;
pub const KHM_MAX_BONE_INFLUENCES: usize = 4;

/// Parent id of an object at the root of the hierarchy.
pub const NO_PARENT: u32 = u32::MAX;
/// Largest object id the runtime can index.
pub const MAX_OBJECT_ID: u32 = 255;

pub type Vector2 = [f32; 2];
pub type Vector3 = [f32; 3];
pub type Vector4 = [f32; 4];
pub type Matrix = [f32; 16];
pub type BoneIndices = [u8; KHM_MAX_BONE_INFLUENCES];
pub type PackedColor = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
pub struct KhmHeader {
    pub signature: [u8; 4],
    pub version: u32,
}

impl KhmHeader {
    pub const SIZE: usize = 8;
}

fn name_bytes(name: &[u8; KHM_MAX_OBJECT_NAME]) -> &[u8] {
    let len = name.iter().position(|&c| c == 0).unwrap_or(name.len());
    &name[..len]
}

/// Common record of bones, helpers and the mesh object.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ObjectRecord {
    pub name: [u8; KHM_MAX_OBJECT_NAME],
    pub id: u32,
    pub parent_id: u32,
    pub local: Matrix,
    pub global: Matrix,
}

impl ObjectRecord {
    pub const SIZE: usize = KHM_MAX_OBJECT_NAME + 4 + 4 + 64 + 64;

    /// Name bytes up to the first NUL.
    pub fn name_bytes(&self) -> &[u8] {
        name_bytes(&self.name)
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    pub fn parent(&self) -> Option<u32> {
        (self.parent_id != NO_PARENT).then_some(self.parent_id)
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.local)
    }

    pub fn global_matrix(&self) -> Mat4 {
        Mat4::from_cols_array(&self.global)
    }
}

impl Debug for ObjectRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRecord")
            .field("name", &self.name())
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("local", &self.local_matrix())
            .field("global", &self.global_matrix())
            .finish()
    }
}

impl PartialEq for ObjectRecord {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.id == other.id
            && self.parent_id == other.parent_id
            && self.local == other.local
            && self.global == other.global
    }
}

/// One animation sample for one node.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TransformRecord {
    pub rotation: Vector4,
    pub translation: Vector3,
    pub scale: Vector3,
}

impl TransformRecord {
    pub const SIZE: usize = 40;

    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.rotation)
    }

    pub fn translation(&self) -> Vec3 {
        Vec3::from_array(self.translation)
    }

    pub fn scale(&self) -> Vec3 {
        Vec3::from_array(self.scale)
    }
}

/// Per-node metadata still written by the exporter. Only its size matters.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LegacyNodeAnimation {
    pub node_id: u32,
    pub node_name: [u8; KHM_MAX_OBJECT_NAME],
}

impl LegacyNodeAnimation {
    pub const SIZE: usize = 4 + KHM_MAX_OBJECT_NAME;
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct AnimationMaskEntry {
    pub object_name: [u8; KHM_MAX_OBJECT_NAME],
    pub mask: i32,
}

impl AnimationMaskEntry {
    pub const SIZE: usize = KHM_MAX_OBJECT_NAME + 4;

    pub fn object_name_bytes(&self) -> &[u8] {
        name_bytes(&self.object_name)
    }

    pub fn object_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.object_name_bytes())
    }

    /// `true` when animation applies to the object.
    pub fn enabled(&self) -> bool {
        self.mask != 0
    }
}

impl Debug for AnimationMaskEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationMaskEntry")
            .field("object_name", &self.object_name())
            .field("mask", &self.mask)
            .finish()
    }
}

/// Face of a convex collision hull.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CollisionPolygon {
    pub plane: Vector4,
    pub vertex_count: u16,
    pub index_base: u16,
}

impl CollisionPolygon {
    pub const SIZE: usize = 20;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionShapeType {
    Sphere,
    Box,
    Capsule,
    ConvexMesh,
    Mesh,
    Plane,
}

impl CollisionShapeType {
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            0 => Self::Sphere,
            1 => Self::Box,
            2 => Self::Capsule,
            3 => Self::ConvexMesh,
            4 => Self::Mesh,
            5 => Self::Plane,
            _ => return None,
        })
    }

    pub fn tag(self) -> u32 {
        match self {
            Self::Sphere => 0,
            Self::Box => 1,
            Self::Capsule => 2,
            Self::ConvexMesh => 3,
            Self::Mesh => 4,
            Self::Plane => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct CollisionShapeHeader {
    pub shape_type: u32,
    pub transform: Matrix,
}

impl CollisionShapeHeader {
    pub const SIZE: usize = 4 + 64;
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct SphereParams {
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct BoxParams {
    pub extents: Vector3,
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct CapsuleParams {
    pub radius: f32,
    pub half_height: f32,
}

#[derive(Debug, Clone, Copy, BinRead)]
pub struct AnimationHeader {
    pub node_count: i32,
    pub start_time: f32,
    pub end_time: f32,
    pub frame_count: i32,
}

// Keep the Pod records in sync with the exporter layout.
const _: () = {
    assert!(size_of::<ObjectRecord>() == ObjectRecord::SIZE);
    assert!(size_of::<TransformRecord>() == TransformRecord::SIZE);
    assert!(size_of::<LegacyNodeAnimation>() == LegacyNodeAnimation::SIZE);
    assert!(size_of::<AnimationMaskEntry>() == AnimationMaskEntry::SIZE);
    assert!(size_of::<CollisionPolygon>() == CollisionPolygon::SIZE);
};

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ObjectRecord {
        let mut record = ObjectRecord::zeroed();
        record.name[..name.len()].copy_from_slice(name.as_bytes());
        record.parent_id = NO_PARENT;
        record
    }

    #[test]
    fn test_object_name_stops_at_nul() {
        let mut object = record("spine_01");
        object.name[20] = b'x';
        assert_eq!(object.name(), "spine_01");
        assert!(object.is_named("spine_01"));
        assert!(!object.is_named("spine"));
        assert_eq!(object.parent(), None);
    }

    #[test]
    fn test_full_length_name() {
        let object = record(&"a".repeat(KHM_MAX_OBJECT_NAME));
        assert_eq!(object.name_bytes().len(), KHM_MAX_OBJECT_NAME);
    }

    #[test]
    fn test_shape_tags() {
        for tag in 0..6 {
            let shape = CollisionShapeType::from_tag(tag).unwrap();
            assert_eq!(shape.tag(), tag);
        }
        assert_eq!(CollisionShapeType::from_tag(99), None);
    }
}
