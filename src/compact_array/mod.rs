// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod plain;

pub use plain::PlainArray;

use crate::coding::{DecodeError, EncodeError};

/// Append-only integer sequence with indexed random access.
///
/// Stores the per-bucket displacement indices of a built map. The default
/// implementation is [`PlainArray`]; denser encodings can be plugged in, as
/// long as building and reading a map use the *same* encoding. The chosen
/// encoding is persisted in the serialized map as a one-byte tag, so
/// deserialization restores it.
///
/// Implementations must not share mutable state: a value returned by
/// [`CompactArray::get`] equals the value passed to [`CompactArray::push`]
/// at the same index, and a built array is immutable and freely shareable.
pub trait CompactArray: std::fmt::Debug + Send + Sync {
    /// Appends a value.
    fn push(&mut self, value: u64);

    /// Returns the value at the given index.
    ///
    /// # Panics
    ///
    /// May panic if the index is out of bounds.
    fn get(&self, index: usize) -> u64;

    /// Returns the number of stored values.
    fn len(&self) -> usize;

    /// Returns `true` if no values are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the encoded size in bytes.
    fn size_in_bytes(&self) -> usize;

    /// Returns the encoding discriminator persisted alongside the map.
    fn kind(&self) -> CompactArrayKind;

    /// Serializes the stored values into the writer.
    fn encode_into(&self, writer: &mut dyn std::io::Write) -> Result<(), EncodeError>;
}

/// Discriminator for the displacement array encoding of a map
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum CompactArrayKind {
    /// Fixed 8-byte cells, see [`PlainArray`]
    #[default]
    Plain,
}

impl From<CompactArrayKind> for u8 {
    fn from(value: CompactArrayKind) -> Self {
        match value {
            CompactArrayKind::Plain => 0,
        }
    }
}

impl TryFrom<u8> for CompactArrayKind {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Plain),
            _ => Err(()),
        }
    }
}

impl CompactArrayKind {
    /// Creates an empty array of this encoding.
    pub(crate) fn new_array(self) -> Box<dyn CompactArray> {
        match self {
            Self::Plain => Box::new(PlainArray::default()),
        }
    }

    /// Deserializes `len` values of this encoding from the reader.
    pub(crate) fn decode_from(
        self,
        reader: &mut dyn std::io::Read,
        len: usize,
    ) -> Result<Box<dyn CompactArray>, DecodeError> {
        match self {
            Self::Plain => Ok(Box::new(PlainArray::decode_from(reader, len)?)),
        }
    }
}
