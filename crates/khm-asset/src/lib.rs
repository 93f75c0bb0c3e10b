//! Decode KHM binary models.
//!
//! A KHM file holds a skeleton (bones and helper attachment points), an
//! optional skinned mesh with collision shapes, a sampled animation and an
//! animation mask. Decoding is a single pass over an in-memory buffer; file
//! access is left to the caller.
//!
//! The same decoder produces three ownership modes, picked by entry point:
//! [`parse`] borrows the buffer, [`parse_shared`] keeps a [`bytes::Bytes`]
//! handle to it and [`parse_owned`] copies every array out.

pub mod animation;
pub mod collision;
/// Model loaders and load parameters.
pub mod loader;
pub mod mesh;
pub mod model;
pub mod storage;

pub use loader::{
    khm::{DecodeError, KhmLoadError},
    parse, parse_owned, parse_shared, LoadParams, ModelLoader,
};
pub use model::ModelDefinition;
