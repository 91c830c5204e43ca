// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{CompactArray, CompactArrayKind};
use crate::coding::{DecodeError, EncodeError};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const CELL_SIZE: usize = std::mem::size_of::<u64>();

/// The default displacement array: fixed 8-byte little-endian cells
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PlainArray(Vec<u64>);

impl PlainArray {
    /// Creates an empty array with space for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub(crate) fn decode_from(
        reader: &mut dyn std::io::Read,
        len: usize,
    ) -> Result<Self, DecodeError> {
        // NOTE: The length comes from the stream, so clamp the preallocation
        const PREALLOC_CAP: usize = 2 * 1_024 * 1_024;

        let mut values = Vec::with_capacity(len.min(PREALLOC_CAP));

        for _ in 0..len {
            values.push(reader.read_u64::<LittleEndian>()?);
        }

        Ok(Self(values))
    }
}

impl CompactArray for PlainArray {
    fn push(&mut self, value: u64) {
        self.0.push(value);
    }

    fn get(&self, index: usize) -> u64 {
        // NOTE: Lookups always index by (h1 % len), so this is in bounds
        *self.0.get(index).expect("index should be in bounds")
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn size_in_bytes(&self) -> usize {
        self.0.len() * CELL_SIZE
    }

    fn kind(&self) -> CompactArrayKind {
        CompactArrayKind::Plain
    }

    fn encode_into(&self, writer: &mut dyn std::io::Write) -> Result<(), EncodeError> {
        for value in &self.0 {
            writer.write_u64::<LittleEndian>(*value)?;
        }
        Ok(())
    }
}
