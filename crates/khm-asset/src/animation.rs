use glam::{Mat4, Quat, Vec3};

use crate::{
    loader::khm::format::{AnimationMaskEntry, TransformRecord},
    storage::{Owned, RecordArray, Storage},
};

/// What to do with an animation whose authored start time is not zero.
///
/// Such clips come from exporting a sub-range of the timeline; their frames do
/// not start at time 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartTimePolicy {
    /// Drop the animation section and keep loading the rest of the model.
    #[default]
    Discard,
    /// Fail the whole load.
    Reject,
    /// Keep the animation, shifting its time range to start at 0.
    Shift,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeTransform {
    pub rotation: Quat,
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl From<TransformRecord> for NodeTransform {
    fn from(value: TransformRecord) -> Self {
        Self {
            rotation: value.rotation(),
            translation: value.translation(),
            scale: value.scale(),
        }
    }
}

impl From<NodeTransform> for Mat4 {
    fn from(value: NodeTransform) -> Self {
        Mat4::from_scale_rotation_translation(value.scale, value.rotation, value.translation)
    }
}

/// Duration of one frame when `frame_count` samples span `start..end` seconds.
pub fn frame_duration_ms(start_time: f32, end_time: f32, frame_count: usize) -> f32 {
    (end_time - start_time) * 1000.0 / frame_count.saturating_sub(1).max(1) as f32
}

/// Sampled transform tracks, stored frame-major: all nodes of frame 0, then
/// all nodes of frame 1 and so on.
#[derive(Debug, Clone)]
pub struct Animation<S: Storage> {
    pub node_count: usize,
    pub frame_count: usize,
    pub frame_duration_ms: f32,
    pub transforms: S::Array<TransformRecord>,
}

impl<S: Storage> Animation<S> {
    pub fn transform(&self, frame: usize, node: usize) -> Option<NodeTransform> {
        if node >= self.node_count || frame >= self.frame_count {
            return None;
        }
        let index = frame.checked_mul(self.node_count)?.checked_add(node)?;
        self.transforms.get(index).map(NodeTransform::from)
    }

    pub fn duration_ms(&self) -> f32 {
        self.frame_duration_ms * self.frame_count.saturating_sub(1) as f32
    }

    /// Index of the frame shown at `time_ms`, clamped to the clip.
    pub fn frame_at(&self, time_ms: f32) -> usize {
        if self.frame_count == 0 || self.frame_duration_ms <= 0.0 {
            return 0;
        }
        let frame = (time_ms / self.frame_duration_ms).floor();
        if frame <= 0.0 {
            0
        } else {
            (frame as usize).min(self.frame_count - 1)
        }
    }

    pub fn to_owned_animation(&self) -> Animation<Owned> {
        Animation {
            node_count: self.node_count,
            frame_count: self.frame_count,
            frame_duration_ms: self.frame_duration_ms,
            transforms: self.transforms.to_vec(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnimationMask<S: Storage> {
    pub entries: S::Array<AnimationMaskEntry>,
}

impl<S: Storage> AnimationMask<S> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mask flag of the named object, `None` if the mask does not list it.
    pub fn mask_for(&self, object_name: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|entry| entry.object_name_bytes() == object_name.as_bytes())
            .map(|entry| entry.enabled())
    }

    /// `true` when the mask explicitly disables animation for the object.
    pub fn is_masked(&self, object_name: &str) -> bool {
        self.mask_for(object_name) == Some(false)
    }

    pub fn to_owned_mask(&self) -> AnimationMask<Owned> {
        AnimationMask {
            entries: self.entries.to_vec(),
        }
    }
}
