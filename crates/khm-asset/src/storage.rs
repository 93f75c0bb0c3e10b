//! Ownership modes of a parsed model.
//!
//! Every array member of a [`ModelDefinition`](crate::model::ModelDefinition)
//! is stored as `S::Array<T>`, where `S` is one of the [`Storage`] markers:
//!
//! - [`Borrowed`]: views into the caller's buffer, bound to its lifetime.
//! - [`Shared`]: views into one reference-counted buffer owned by the model.
//! - [`Owned`]: one independently allocated `Vec` per array.
//!
//! The mode is part of the model's type, so releasing a model is plain `Drop`
//! of whichever representation was chosen at parse time.

use std::{
    fmt::{self, Debug, Formatter},
    iter::FusedIterator,
    marker::PhantomData,
    mem::size_of,
};

use bytemuck::{pod_collect_to_vec, pod_read_unaligned, Pod};
use bytes::Bytes;

/// Element type that can be stored in any ownership mode.
pub trait Record: Pod + Debug {}

impl<T: Pod + Debug> Record for T {}

/// Read access common to views and owned arrays.
///
/// Elements are returned by value: views decode them from possibly unaligned
/// bytes on access.
pub trait RecordArray<T: Record> {
    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Option<T>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Records<'_, T, Self>
    where
        Self: Sized,
    {
        Records {
            array: self,
            front: 0,
            back: self.len(),
            _marker: PhantomData,
        }
    }

    fn to_vec(&self) -> Vec<T>
    where
        Self: Sized,
    {
        self.iter().collect()
    }
}

pub struct Records<'a, T: Record, A: RecordArray<T>> {
    array: &'a A,
    front: usize,
    back: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record, A: RecordArray<T>> Iterator for Records<'_, T, A> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front >= self.back {
            return None;
        }
        let item = self.array.get(self.front);
        self.front += 1;
        item
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T: Record, A: RecordArray<T>> DoubleEndedIterator for Records<'_, T, A> {
    fn next_back(&mut self) -> Option<T> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.array.get(self.back)
    }
}

impl<T: Record, A: RecordArray<T>> ExactSizeIterator for Records<'_, T, A> {}

impl<T: Record, A: RecordArray<T>> FusedIterator for Records<'_, T, A> {}

/// A typed, non-owning view over a run of packed records.
///
/// `B` is the byte container the view aliases: a plain borrowed slice or a
/// [`Bytes`] handle that keeps the source buffer alive.
#[derive(Clone)]
pub struct RecordView<B, T> {
    bytes: B,
    _marker: PhantomData<fn() -> T>,
}

impl<B: AsRef<[u8]>, T: Record> RecordView<B, T> {
    pub(crate) fn new(bytes: B) -> Self {
        debug_assert_eq!(bytes.as_ref().len() % size_of::<T>(), 0);
        Self {
            bytes,
            _marker: PhantomData,
        }
    }

    /// The raw bytes this view aliases.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_ref()
    }
}

impl<B: AsRef<[u8]>, T: Record> RecordArray<T> for RecordView<B, T> {
    fn len(&self) -> usize {
        self.bytes.as_ref().len() / size_of::<T>()
    }

    fn get(&self, index: usize) -> Option<T> {
        let size = size_of::<T>();
        let start = index.checked_mul(size)?;
        let bytes = self.bytes.as_ref().get(start..start.checked_add(size)?)?;
        Some(pod_read_unaligned(bytes))
    }
}

impl<B: AsRef<[u8]>, T: Record> Debug for RecordView<B, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Record> RecordArray<T> for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Borrowed,
    Shared,
    Owned,
}

/// Selects how the arrays of a parsed model are held.
pub trait Storage {
    type Array<T: Record>: RecordArray<T> + Clone + Debug;

    const OWNERSHIP: Ownership;
}

/// Arrays alias a buffer borrowed for `'a`.
#[derive(Debug, Clone, Copy)]
pub struct Borrowed<'a>(PhantomData<&'a [u8]>);

impl<'a> Storage for Borrowed<'a> {
    type Array<T: Record> = RecordView<&'a [u8], T>;

    const OWNERSHIP: Ownership = Ownership::Borrowed;
}

/// Arrays alias a single buffer the model keeps alive by reference count.
#[derive(Debug, Clone, Copy)]
pub struct Shared;

impl Storage for Shared {
    type Array<T: Record> = RecordView<Bytes, T>;

    const OWNERSHIP: Ownership = Ownership::Shared;
}

/// Arrays are copied into their own allocations.
#[derive(Debug, Clone, Copy)]
pub struct Owned;

impl Storage for Owned {
    type Array<T: Record> = Vec<T>;

    const OWNERSHIP: Ownership = Ownership::Owned;
}

/// Turns spans of the source buffer into arrays of one storage mode.
///
/// This is the only place where the modes differ during a parse.
pub(crate) trait Assembler<'a> {
    type Storage: Storage;

    fn array<T: Record>(&self, span: &'a [u8]) -> <Self::Storage as Storage>::Array<T>;
}

pub(crate) struct BorrowAssembler;

impl<'a> Assembler<'a> for BorrowAssembler {
    type Storage = Borrowed<'a>;

    fn array<T: Record>(&self, span: &'a [u8]) -> RecordView<&'a [u8], T> {
        RecordView::new(span)
    }
}

/// `span` must be a subslice of `buffer`.
pub(crate) struct SharedAssembler {
    pub(crate) buffer: Bytes,
}

impl<'a> Assembler<'a> for SharedAssembler {
    type Storage = Shared;

    fn array<T: Record>(&self, span: &'a [u8]) -> RecordView<Bytes, T> {
        RecordView::new(self.buffer.slice_ref(span))
    }
}

pub(crate) struct CopyAssembler;

impl<'a> Assembler<'a> for CopyAssembler {
    type Storage = Owned;

    fn array<T: Record>(&self, span: &'a [u8]) -> Vec<T> {
        pod_collect_to_vec(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_reads_unaligned_records() {
        let mut bytes = vec![0xAAu8];
        for value in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        let view: RecordView<&[u8], [f32; 3]> = RecordView::new(&bytes[1..]);
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(0), Some([1.0, 2.0, 3.0]));
        assert_eq!(view.get(1), Some([4.0, 5.0, 6.0]));
        assert_eq!(view.get(2), None);
        assert_eq!(view.get(usize::MAX), None);
    }

    #[test]
    fn test_records_iterate_both_ways() {
        let values: Vec<u16> = vec![1, 2, 3, 4];
        let forward: Vec<u16> = RecordArray::iter(&values).collect();
        let backward: Vec<u16> = RecordArray::iter(&values).rev().collect();
        assert_eq!(forward, [1, 2, 3, 4]);
        assert_eq!(backward, [4, 3, 2, 1]);
        assert_eq!(RecordArray::iter(&values).len(), 4);
    }

    #[test]
    fn test_assemblers_agree() {
        let raw: Vec<u8> = [7u16, 8, 9].iter().flat_map(|v| v.to_le_bytes()).collect();
        let shared = Bytes::from(raw.clone());

        let borrowed = BorrowAssembler.array::<u16>(&raw);
        let owned = CopyAssembler.array::<u16>(&raw);
        let assembler = SharedAssembler {
            buffer: shared.clone(),
        };
        let view = assembler.array::<u16>(&shared[2..]);

        assert_eq!(borrowed.to_vec(), [7, 8, 9]);
        assert_eq!(owned, [7, 8, 9]);
        assert_eq!(view.to_vec(), [8, 9]);
    }
}
