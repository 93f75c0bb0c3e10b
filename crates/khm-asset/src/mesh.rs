use glam::Vec3;

use crate::{
    collision::CollisionShape,
    loader::khm::format::{BoneIndices, ObjectRecord, PackedColor, Vector2, Vector3, Vector4},
    storage::{Owned, RecordArray, Storage},
};

/// Per-vertex bone influences; `weights[i]` pairs with `bone_indices[i]`.
#[derive(Debug, Clone)]
pub struct MeshSkin<S: Storage> {
    pub weights: S::Array<Vector4>,
    pub bone_indices: S::Array<BoneIndices>,
}

impl<S: Storage> MeshSkin<S> {
    pub fn to_owned_skin(&self) -> MeshSkin<Owned> {
        MeshSkin {
            weights: self.weights.to_vec(),
            bone_indices: self.bone_indices.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MeshObject<S: Storage> {
    pub object: ObjectRecord,
    /// Positions in global space.
    pub positions: S::Array<Vector3>,
    pub normals: S::Array<Vector3>,
    pub colors: Option<S::Array<PackedColor>>,
    /// Slot 1 stays empty unless secondary coordinates were requested.
    pub tex_coords: [Option<S::Array<Vector2>>; 2],
    pub indices: S::Array<u16>,
    pub face_normals: S::Array<Vector3>,
    pub skin: Option<MeshSkin<S>>,
    pub collisions: Vec<CollisionShape>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
    pub volume: f32,
}

impl<S: Storage> MeshObject<S> {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangle(&self, index: usize) -> Option<[u16; 3]> {
        if index >= self.triangle_count() {
            return None;
        }
        let base = index * 3;
        Some([
            self.indices.get(base)?,
            self.indices.get(base + 1)?,
            self.indices.get(base + 2)?,
        ])
    }

    pub fn has_skin(&self) -> bool {
        self.skin.is_some()
    }

    pub fn bounds(&self) -> (Vec3, Vec3) {
        (self.bounds_min, self.bounds_max)
    }

    pub fn extents(&self) -> Vec3 {
        self.bounds_max - self.bounds_min
    }

    pub fn to_owned_mesh(&self) -> MeshObject<Owned> {
        MeshObject {
            object: self.object,
            positions: self.positions.to_vec(),
            normals: self.normals.to_vec(),
            colors: self.colors.as_ref().map(|colors| colors.to_vec()),
            tex_coords: [
                self.tex_coords[0].as_ref().map(|coords| coords.to_vec()),
                self.tex_coords[1].as_ref().map(|coords| coords.to_vec()),
            ],
            indices: self.indices.to_vec(),
            face_normals: self.face_normals.to_vec(),
            skin: self.skin.as_ref().map(MeshSkin::to_owned_skin),
            collisions: self.collisions.clone(),
            bounds_min: self.bounds_min,
            bounds_max: self.bounds_max,
            volume: self.volume,
        }
    }
}
