use log::warn;

use crate::{
    animation::{Animation, AnimationMask},
    loader::khm::format::ObjectRecord,
    mesh::MeshObject,
    storage::{Owned, Ownership, RecordArray, Storage},
};

/// A decoded KHM model.
///
/// The storage mode `S` decides whether arrays alias the source buffer or
/// own copies of it; see [`crate::storage`].
#[derive(Debug, Clone)]
pub struct ModelDefinition<S: Storage> {
    /// Where the model was loaded from, for diagnostics only.
    pub source: Option<String>,
    pub mesh: Option<MeshObject<S>>,
    pub bones: S::Array<ObjectRecord>,
    pub helpers: S::Array<ObjectRecord>,
    pub animation: Option<Animation<S>>,
    pub animation_mask: Option<AnimationMask<S>>,
}

impl<S: Storage> ModelDefinition<S> {
    pub fn ownership(&self) -> Ownership {
        S::OWNERSHIP
    }

    /// Find an object by name.
    ///
    /// Helpers are searched before bones and the mesh comes last, so a helper
    /// wins when several objects share a name.
    pub fn object_by_name(&self, name: &str) -> Option<ObjectRecord> {
        self.helpers
            .iter()
            .find(|helper| helper.is_named(name))
            .or_else(|| self.bones.iter().find(|bone| bone.is_named(name)))
            .or_else(|| {
                self.mesh
                    .as_ref()
                    .map(|mesh| mesh.object)
                    .filter(|object| object.is_named(name))
            })
    }

    /// Find a bone or helper by id.
    ///
    /// Ids index bones first and continue into the helpers. The mesh object is
    /// not reachable by id.
    pub fn object_by_id(&self, id: u32) -> Option<ObjectRecord> {
        let index = usize::try_from(id).ok()?;
        let bone_count = self.bones.len();
        let object = if index < bone_count {
            self.bones.get(index)?
        } else {
            self.helpers.get(index - bone_count)?
        };
        if object.id != id {
            warn!(
                "Object {:?} at index {} has id {}, expected {}",
                object.name(),
                index,
                object.id,
                id
            );
        }
        Some(object)
    }

    pub fn object_count(&self) -> usize {
        self.bones.len() + self.helpers.len() + usize::from(self.mesh.is_some())
    }

    /// Copy every array into its own allocation.
    pub fn to_owned_model(&self) -> ModelDefinition<Owned> {
        ModelDefinition {
            source: self.source.clone(),
            mesh: self.mesh.as_ref().map(MeshObject::to_owned_mesh),
            bones: self.bones.to_vec(),
            helpers: self.helpers.to_vec(),
            animation: self.animation.as_ref().map(Animation::to_owned_animation),
            animation_mask: self
                .animation_mask
                .as_ref()
                .map(AnimationMask::to_owned_mask),
        }
    }

    pub fn into_owned(self) -> ModelDefinition<Owned> {
        self.to_owned_model()
    }
}
