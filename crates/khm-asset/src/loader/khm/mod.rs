use std::fmt::{self, Display, Formatter};

use glam::{Mat4, Vec3};
use log::{debug, error, trace, warn};

use crate::{
    animation::{frame_duration_ms, Animation, AnimationMask, StartTimePolicy},
    collision::{estimate_mesh_volume, CollisionGeometry, CollisionShape, ConvexMesh},
    mesh::{MeshObject, MeshSkin},
    model::ModelDefinition,
    storage::{Assembler, Storage},
};

use self::format::{
    AnimationHeader, AnimationMaskEntry, BoneIndices, BoxParams, CapsuleParams, CollisionPolygon,
    CollisionShapeHeader, CollisionShapeType, KhmHeader, LegacyNodeAnimation, ObjectRecord,
    PackedColor, SphereParams, TransformRecord, Vector2, Vector3, Vector4, KHM_SIGNATURE,
    KHM_VERSION, MAX_OBJECT_ID, NO_PARENT,
};

use super::LoadParams;

pub mod format;
mod reader;


pub use self::reader::KhmReader;

#[derive(Debug)]
pub enum KhmLoadError {
    /// The first three bytes are not `KHM`. Bytes past the end of a short
    /// buffer are reported as zero.
    BadSignature { found: [u8; 3] },
    UnsupportedVersion { found: u32, expected: u32 },
    /// A read starting at `offset` needs more than the `remaining` bytes.
    TruncatedBuffer { offset: usize, remaining: usize },
    UnknownCollisionShapeType { tag: u32, offset: usize },
    InvalidAnimationStartTime { start_time: f32 },
    NegativeCount {
        what: &'static str,
        count: i32,
        offset: usize,
    },
    Format(binrw::Error),
}

/// Error returned by every KHM entry point.
pub type DecodeError = KhmLoadError;

impl KhmLoadError {
    pub(crate) fn from_binrw(err: binrw::Error, offset: usize, remaining: usize) -> Self {
        if err.is_eof() {
            KhmLoadError::TruncatedBuffer { offset, remaining }
        } else {
            KhmLoadError::Format(err)
        }
    }
}

impl Display for KhmLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            KhmLoadError::BadSignature { found } => {
                write!(f, "KHM header mismatch: found signature {:02x?}", found)
            }
            KhmLoadError::UnsupportedVersion { found, expected } => {
                write!(f, "Wrong file version {}, expected {}", found, expected)
            }
            KhmLoadError::TruncatedBuffer { offset, remaining } => write!(
                f,
                "Read at offset {} runs past the end of the buffer ({} bytes left)",
                offset, remaining
            ),
            KhmLoadError::UnknownCollisionShapeType { tag, offset } => write!(
                f,
                "Unsupported collision shape type {} at offset {}",
                tag, offset
            ),
            KhmLoadError::InvalidAnimationStartTime { start_time } => write!(
                f,
                "Animation starts at {}s instead of 0, was it exported from a clip?",
                start_time
            ),
            KhmLoadError::NegativeCount {
                what,
                count,
                offset,
            } => write!(f, "Bad {} count {} at offset {}", what, count, offset),
            KhmLoadError::Format(format) => Display::fmt(format, f),
        }
    }
}

impl std::error::Error for KhmLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            KhmLoadError::Format(format) => Some(format),
            _ => None,
        }
    }
}

impl From<binrw::Error> for KhmLoadError {
    fn from(value: binrw::Error) -> Self {
        Self::Format(value)
    }
}

type Array<'a, A, T> = <<A as Assembler<'a>>::Storage as Storage>::Array<T>;

/// Reads the sections of one KHM buffer in file order.
pub(crate) struct KhmLoader<'p, A> {
    params: &'p LoadParams,
    assembler: A,
}

impl<'a, 'p, A: Assembler<'a>> KhmLoader<'p, A> {
    pub(crate) fn new(params: &'p LoadParams, assembler: A) -> Self {
        Self { params, assembler }
    }

    fn source(&self) -> &str {
        self.params.source_name.as_deref().unwrap_or("<memory>")
    }

    fn read_header(&self, reader: &mut KhmReader<'a>) -> Result<KhmHeader, KhmLoadError> {
        // Compare whatever part of the signature exists before asking for a
        // full header, so short garbage is still reported as a bad signature.
        let prefix = reader.peek(KHM_SIGNATURE.len());
        if prefix.iter().zip(KHM_SIGNATURE).any(|(found, expected)| *found != expected) {
            let mut found = [0u8; 3];
            found[..prefix.len()].copy_from_slice(prefix);
            error!("KHM header mismatch in {}", self.source());
            return Err(KhmLoadError::BadSignature { found });
        }

        let header: KhmHeader = reader.read_le()?;
        if header.version != KHM_VERSION {
            error!(
                "Wrong file version {} in {}, expected {}",
                header.version,
                self.source(),
                KHM_VERSION
            );
            return Err(KhmLoadError::UnsupportedVersion {
                found: header.version,
                expected: KHM_VERSION,
            });
        }
        Ok(header)
    }

    fn read_objects(
        &self,
        reader: &mut KhmReader<'a>,
        what: &str,
    ) -> Result<Array<'a, A, ObjectRecord>, KhmLoadError> {
        let count = reader.read_u8()? as usize;
        let span = reader.read_span::<ObjectRecord>(count)?;
        let objects = self.assembler.array::<ObjectRecord>(span);
        trace!("Read {} {}", count, what);
        Ok(objects)
    }

    fn read_skin(
        &self,
        reader: &mut KhmReader<'a>,
        vertex_count: usize,
    ) -> Result<Option<MeshSkin<A::Storage>>, KhmLoadError> {
        if !reader.read_flag()? {
            return Ok(None);
        }
        let weights = reader.read_span::<Vector4>(vertex_count)?;
        let bone_indices = reader.read_span::<BoneIndices>(vertex_count)?;
        Ok(Some(MeshSkin {
            weights: self.assembler.array::<Vector4>(weights),
            bone_indices: self.assembler.array::<BoneIndices>(bone_indices),
        }))
    }

    fn read_convex_mesh(&self, reader: &mut KhmReader<'a>) -> Result<ConvexMesh, KhmLoadError> {
        // Hull data is copied out in every storage mode.
        let polygon_count = reader.read_count("collision polygon")?;
        let polygons = bytemuck::pod_collect_to_vec::<u8, CollisionPolygon>(
            reader.read_span::<CollisionPolygon>(polygon_count)?,
        );
        let index_count = reader.read_count("collision index")?;
        let indices = bytemuck::pod_collect_to_vec::<u8, u16>(reader.read_span::<u16>(index_count)?);
        let vertex_count = reader.read_count("collision vertex")?;
        let vertices =
            bytemuck::pod_collect_to_vec::<u8, Vector3>(reader.read_span::<Vector3>(vertex_count)?);
        Ok(ConvexMesh {
            polygons,
            indices,
            vertices,
        })
    }

    fn read_collision_data(
        &self,
        reader: &mut KhmReader<'a>,
    ) -> Result<Vec<CollisionShape>, KhmLoadError> {
        let count = reader.read_count("collision shape")?;
        let mut shapes =
            Vec::with_capacity(count.min(reader.remaining() / CollisionShapeHeader::SIZE));
        for _ in 0..count {
            let offset = reader.position();
            let header: CollisionShapeHeader = reader.read_le()?;
            let transform = Mat4::from_cols_array(&header.transform);
            let geometry = match CollisionShapeType::from_tag(header.shape_type) {
                Some(CollisionShapeType::Sphere) => {
                    let params: SphereParams = reader.read_le()?;
                    CollisionGeometry::Sphere {
                        radius: params.radius,
                    }
                }
                Some(CollisionShapeType::Box) => {
                    let params: BoxParams = reader.read_le()?;
                    CollisionGeometry::Box {
                        extents: Vec3::from_array(params.extents),
                    }
                }
                Some(CollisionShapeType::Capsule) => {
                    let params: CapsuleParams = reader.read_le()?;
                    CollisionGeometry::Capsule {
                        radius: params.radius,
                        half_height: params.half_height,
                    }
                }
                Some(CollisionShapeType::ConvexMesh) => {
                    CollisionGeometry::ConvexMesh(self.read_convex_mesh(reader)?)
                }
                // Triangle meshes and planes have no payload layout, so there
                // is no way to step over them.
                Some(CollisionShapeType::Mesh | CollisionShapeType::Plane) | None => {
                    error!(
                        "Unsupported collision shape type {} in {}",
                        header.shape_type,
                        self.source()
                    );
                    return Err(KhmLoadError::UnknownCollisionShapeType {
                        tag: header.shape_type,
                        offset,
                    });
                }
            };
            shapes.push(CollisionShape {
                transform,
                geometry,
            });
        }
        Ok(shapes)
    }

    fn read_tex_coords(
        &self,
        reader: &mut KhmReader<'a>,
        vertex_count: usize,
    ) -> Result<[Option<Array<'a, A, Vector2>>; 2], KhmLoadError> {
        let mut tex_coords = [None, None];
        let channel_count = reader.read_u32()? as usize;
        for channel in 0..channel_count.min(tex_coords.len()) {
            let span = reader.read_span::<Vector2>(vertex_count)?;
            if channel == 0 || self.params.retain_secondary_tex_coords {
                tex_coords[channel] = Some(self.assembler.array::<Vector2>(span));
            }
        }

        // Channels past the second have no slot; step over all of them at once.
        let extra_channels = channel_count.saturating_sub(tex_coords.len());
        if extra_channels > 0 {
            let offset = reader.position();
            let extra_coords = extra_channels.checked_mul(vertex_count).ok_or(
                KhmLoadError::TruncatedBuffer {
                    offset,
                    remaining: reader.remaining(),
                },
            )?;
            reader.skip_records::<Vector2>(extra_coords)?;
            warn!(
                "Skipping {} extra texture coordinate channels in {}",
                extra_channels,
                self.source()
            );
        }
        Ok(tex_coords)
    }

    fn read_geometry(
        &self,
        reader: &mut KhmReader<'a>,
        object: ObjectRecord,
    ) -> Result<MeshObject<A::Storage>, KhmLoadError> {
        let vertex_count = reader.read_count("vertex")?;
        let positions = self.assembler.array::<Vector3>(reader.read_span::<Vector3>(vertex_count)?);
        let normals = self.assembler.array::<Vector3>(reader.read_span::<Vector3>(vertex_count)?);

        let index_count = reader.read_count("index")?;
        let indices = self.assembler.array::<u16>(reader.read_span::<u16>(index_count)?);
        let face_normals = self
            .assembler
            .array::<Vector3>(reader.read_span::<Vector3>(index_count / 3)?);

        let colors = if reader.read_flag()? {
            Some(
                self.assembler
                    .array::<PackedColor>(reader.read_span::<PackedColor>(vertex_count)?),
            )
        } else {
            None
        };

        let tex_coords = self.read_tex_coords(reader, vertex_count)?;
        let skin = self.read_skin(reader, vertex_count)?;
        let collisions = self.read_collision_data(reader)?;

        let bounds_min = Vec3::from_array(reader.read_fixed::<Vector3>()?);
        let bounds_max = Vec3::from_array(reader.read_fixed::<Vector3>()?);
        let volume = estimate_mesh_volume(&collisions, bounds_min, bounds_max);

        debug!(
            "Mesh {:?}: {} vertices, {} triangles, {} collision shapes, volume {}",
            object.name(),
            vertex_count,
            index_count / 3,
            collisions.len(),
            volume
        );

        Ok(MeshObject {
            object,
            positions,
            normals,
            colors,
            tex_coords,
            indices,
            face_normals,
            skin,
            collisions,
            bounds_min,
            bounds_max,
            volume,
        })
    }

    fn read_mesh(
        &self,
        reader: &mut KhmReader<'a>,
    ) -> Result<Option<MeshObject<A::Storage>>, KhmLoadError> {
        if !reader.read_flag()? {
            return Ok(None);
        }

        let mut object: ObjectRecord = reader.read_fixed()?;
        if object.id > MAX_OBJECT_ID {
            warn!(
                "Mesh {:?} in {} has id {}, clamping to {}",
                object.name(),
                self.source(),
                object.id,
                MAX_OBJECT_ID
            );
            object.id = MAX_OBJECT_ID;
        }
        if object.parent_id > MAX_OBJECT_ID + 1 && object.parent_id != NO_PARENT {
            warn!(
                "Mesh {:?} in {} has parent id {}, clamping to {}",
                object.name(),
                self.source(),
                object.parent_id,
                MAX_OBJECT_ID
            );
            object.parent_id = MAX_OBJECT_ID;
        }

        self.read_geometry(reader, object).map(Some)
    }

    fn read_animation(
        &self,
        reader: &mut KhmReader<'a>,
    ) -> Result<Option<Animation<A::Storage>>, KhmLoadError> {
        if !reader.read_flag()? {
            return Ok(None);
        }

        let offset = reader.position();
        let header: AnimationHeader = reader.read_le()?;
        let node_count = usize::try_from(header.node_count).map_err(|_| {
            KhmLoadError::NegativeCount {
                what: "animation node",
                count: header.node_count,
                offset,
            }
        })?;
        let frame_count = usize::try_from(header.frame_count).map_err(|_| {
            KhmLoadError::NegativeCount {
                what: "animation frame",
                count: header.frame_count,
                offset: offset + 12,
            }
        })?;

        if header.start_time != 0.0 && self.params.start_time_policy == StartTimePolicy::Reject {
            error!(
                "Animation in {} starts at {}s",
                self.source(),
                header.start_time
            );
            return Err(KhmLoadError::InvalidAnimationStartTime {
                start_time: header.start_time,
            });
        }

        // Per-node names and ids are no longer used at runtime.
        reader.skip_records::<LegacyNodeAnimation>(node_count)?;

        let sample_count = frame_count
            .checked_mul(node_count)
            .ok_or(KhmLoadError::TruncatedBuffer {
                offset: reader.position(),
                remaining: reader.remaining(),
            })?;
        let transforms = reader.read_span::<TransformRecord>(sample_count)?;

        if header.start_time != 0.0 {
            if self.params.start_time_policy == StartTimePolicy::Discard {
                warn!(
                    "Animation in {} starts at {}s, dropping it",
                    self.source(),
                    header.start_time
                );
                return Ok(None);
            }
            debug!(
                "Shifting animation in {} to start at 0 (was {}s)",
                self.source(),
                header.start_time
            );
        }

        let frame_duration_ms = frame_duration_ms(header.start_time, header.end_time, frame_count);
        debug!(
            "Animation: {} nodes, {} frames, {}ms per frame",
            node_count, frame_count, frame_duration_ms
        );

        Ok(Some(Animation {
            node_count,
            frame_count,
            frame_duration_ms,
            transforms: self.assembler.array::<TransformRecord>(transforms),
        }))
    }

    fn read_animation_mask(
        &self,
        reader: &mut KhmReader<'a>,
    ) -> Result<Option<AnimationMask<A::Storage>>, KhmLoadError> {
        if !reader.read_flag()? {
            return Ok(None);
        }
        let count = reader.read_u32()? as usize;
        let entries = reader.read_span::<AnimationMaskEntry>(count)?;
        trace!("Read {} animation mask entries", count);
        Ok(Some(AnimationMask {
            entries: self.assembler.array::<AnimationMaskEntry>(entries),
        }))
    }

    pub(crate) fn load_model(
        &self,
        reader: &mut KhmReader<'a>,
    ) -> Result<ModelDefinition<A::Storage>, KhmLoadError> {
        self.read_header(reader)?;

        let bones = self.read_objects(reader, "bones")?;
        let helpers = self.read_objects(reader, "helpers")?;
        let mesh = self.read_mesh(reader)?;
        let animation = self.read_animation(reader)?;
        let animation_mask = self.read_animation_mask(reader)?;

        if reader.remaining() > 0 {
            debug!(
                "{} trailing bytes after the last section of {}",
                reader.remaining(),
                self.source()
            );
        }

        Ok(ModelDefinition {
            source: self.params.source_name.clone(),
            mesh,
            bones,
            helpers,
            animation,
            animation_mask,
        })
    }
}
