use bytes::Bytes;

use crate::{
    animation::StartTimePolicy,
    model::ModelDefinition,
    storage::{BorrowAssembler, Borrowed, CopyAssembler, Owned, Shared, SharedAssembler},
};

use self::khm::{DecodeError, KhmLoader, KhmReader};

/// KHM 101 binary model loader.
pub mod khm;

#[derive(Debug, Clone, Default)]
pub struct LoadParams {
    /// Name used in log messages, usually the file the buffer came from.
    pub source_name: Option<String>,
    pub start_time_policy: StartTimePolicy,
    /// Keep texture coordinate channel 1 instead of dropping it.
    pub retain_secondary_tex_coords: bool,
}

impl LoadParams {
    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }
}

/// Decodes KHM buffers with a fixed set of [`LoadParams`].
#[derive(Debug, Clone, Default)]
pub struct ModelLoader {
    params: LoadParams,
}

impl ModelLoader {
    pub fn new(params: LoadParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LoadParams {
        &self.params
    }

    /// Parse `buffer` into a model whose arrays borrow from it.
    pub fn load<'a>(&self, buffer: &'a [u8]) -> Result<ModelDefinition<Borrowed<'a>>, DecodeError> {
        let mut reader = KhmReader::new(buffer);
        KhmLoader::new(&self.params, BorrowAssembler).load_model(&mut reader)
    }

    /// Parse `buffer` into a model that keeps the buffer alive itself.
    ///
    /// Every array is a slice of `buffer`; no array is copied.
    pub fn load_shared(&self, buffer: Bytes) -> Result<ModelDefinition<Shared>, DecodeError> {
        let assembler = SharedAssembler {
            buffer: buffer.clone(),
        };
        let mut reader = KhmReader::new(&buffer);
        KhmLoader::new(&self.params, assembler).load_model(&mut reader)
    }

    /// Parse `buffer` into a model that copies every array out of it.
    pub fn load_owned(&self, buffer: &[u8]) -> Result<ModelDefinition<Owned>, DecodeError> {
        let mut reader = KhmReader::new(buffer);
        KhmLoader::new(&self.params, CopyAssembler).load_model(&mut reader)
    }
}

/// Parse with default parameters, borrowing from `buffer`.
pub fn parse(buffer: &[u8]) -> Result<ModelDefinition<Borrowed<'_>>, DecodeError> {
    ModelLoader::default().load(buffer)
}

pub fn parse_shared(buffer: Bytes) -> Result<ModelDefinition<Shared>, DecodeError> {
    ModelLoader::default().load_shared(buffer)
}

pub fn parse_owned(buffer: &[u8]) -> Result<ModelDefinition<Owned>, DecodeError> {
    ModelLoader::default().load_owned(buffer)
}
