// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use crate::compact_array::{CompactArray, CompactArrayKind};
use crate::hash::spooky_short;
use crate::payload::PayloadStore;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Stream header: magic bytes + format version
pub const MAP_HEADER_MAGIC: &[u8] = &[b'F', b'J', b'L', b'L', b'C', b'H', b'D', b'1'];

/// An immutable map built with the CHD minimal perfect hash algorithm.
///
/// Lookups are O(1) worst case: one hash of the key, one displacement
/// array access and one payload access. The map is frozen after build and
/// freely shareable across threads.
///
/// See <http://cmph.sourceforge.net/papers/esa09.pdf> for more details.
#[derive(Debug)]
pub struct Map {
    seed: [u64; 2],
    table_size: u64,
    len: u64,
    displacement: Box<dyn CompactArray>,
    payload: PayloadStore,
}

impl Map {
    pub(crate) fn new(
        seed: [u64; 2],
        table_size: u64,
        len: u64,
        displacement: Box<dyn CompactArray>,
        payload: PayloadStore,
    ) -> Self {
        Self {
            seed,
            table_size,
            len,
            displacement,
            payload,
        }
    }

    pub(crate) fn empty(array_kind: CompactArrayKind) -> Self {
        Self {
            seed: [0, 0],
            table_size: 0,
            len: 0,
            displacement: array_kind.new_array(),
            payload: PayloadStore::empty(),
        }
    }

    /// Returns the value of a key, or `None` if the key is not contained.
    ///
    /// Absence is decided by comparing the stored key bytes, so there are
    /// no false positives. The lookup path does not allocate.
    #[must_use]
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> Option<&[u8]> {
        let key = key.as_ref();

        if self.len == 0 {
            return None;
        }

        let slot = self.slot_of(key);
        let (stored_key, value) = self.payload.record(slot as usize)?;

        if stored_key == key {
            Some(value)
        } else {
            None
        }
    }

    /// Returns the slot index of a key.
    ///
    /// This always returns a value in `[0, table_size)` even if the key is
    /// not contained; it is up to the caller to validate the returned
    /// index. Returns 0 on an empty map.
    #[must_use]
    pub fn get_index<K: AsRef<[u8]>>(&self, key: K) -> u64 {
        if self.len == 0 {
            return 0;
        }

        self.slot_of(key.as_ref())
    }

    /// The lookup rule; must agree bit for bit with the builder.
    fn slot_of(&self, key: &[u8]) -> u64 {
        let (h1, h2, h3, _) = spooky_short(key, self.seed[0], self.seed[1]);

        let nbuckets = self.displacement.len() as u64;
        let hidx = self.displacement.get((h1 % nbuckets) as usize);

        let table_size = self.table_size;
        let h2 = h2 % table_size;
        let h3 = h3 % table_size;
        let d0 = hidx / table_size;
        let d1 = hidx % table_size;

        // NOTE: The product may wrap; the reduction modulo the table size
        // absorbs it, on both the build and the lookup side
        h2.wrapping_add(d0.wrapping_mul(h3)).wrapping_add(d1) % table_size
    }

    /// Returns the number of keys in the map.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if the map contains no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the slot table size.
    #[must_use]
    pub fn table_size(&self) -> u64 {
        self.table_size
    }

    /// Returns the in-memory size of the payload and the auxiliary index
    /// in bytes.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.displacement.size_in_bytes() + self.payload.size_in_bytes()
    }

    /// Iterates over all key-value pairs, in slot order (not key order).
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        (0..self.payload.slot_count()).filter_map(|slot| self.payload.record(slot))
    }
}

impl Encode for Map {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_all(MAP_HEADER_MAGIC)?;

        writer.write_u64::<LittleEndian>(self.seed[0])?;
        writer.write_u64::<LittleEndian>(self.seed[1])?;
        writer.write_u64::<LittleEndian>(self.table_size)?;
        writer.write_u64::<LittleEndian>(self.displacement.len() as u64)?;
        writer.write_u64::<LittleEndian>(self.len)?;

        self.payload.encode_into(writer)?;

        writer.write_u8(u8::from(self.displacement.kind()))?;
        self.displacement.encode_into(writer)?;

        Ok(())
    }
}

impl Decode for Map {
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut magic = [0u8; MAP_HEADER_MAGIC.len()];
        reader.read_exact(&mut magic)?;

        if magic != MAP_HEADER_MAGIC {
            return Err(DecodeError::InvalidHeader("Map"));
        }

        let seed1 = reader.read_u64::<LittleEndian>()?;
        let seed2 = reader.read_u64::<LittleEndian>()?;
        let table_size = reader.read_u64::<LittleEndian>()?;
        let nbuckets = reader.read_u64::<LittleEndian>()?;
        let len = reader.read_u64::<LittleEndian>()?;

        // A non-empty map needs a table and a displacement vector to hash
        // into
        if len > 0 && (table_size == 0 || nbuckets == 0 || len > table_size) {
            return Err(DecodeError::InvalidHeader("Map"));
        }

        let payload = PayloadStore::decode_from(reader, table_size as usize)?;

        let tag = reader.read_u8()?;
        let kind = CompactArrayKind::try_from(tag)
            .map_err(|()| DecodeError::InvalidTag(("CompactArrayKind", tag)))?;
        let displacement = kind.decode_from(reader, nbuckets as usize)?;

        Ok(Self {
            seed: [seed1, seed2],
            table_size,
            len,
            displacement,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn map_empty() -> Result<(), DecodeError> {
        let map = Map::empty(CompactArrayKind::Plain);

        assert_eq!(0, map.len());
        assert!(map.is_empty());
        assert_eq!(None, map.get("anything"));
        assert_eq!(None, map.get(""));
        assert_eq!(0, map.get_index("anything"));
        assert_eq!(0, map.iter().count());

        let bytes = map.encode_into_vec();
        let copy = Map::decode_from(&mut &bytes[..])?;

        assert_eq!(0, copy.len());
        assert_eq!(None, copy.get("anything"));
        assert_eq!(map.size_in_bytes(), copy.size_in_bytes());

        Ok(())
    }

    #[test]
    fn map_decode_invalid_magic() {
        let mut bytes = Map::empty(CompactArrayKind::Plain).encode_into_vec();
        *bytes.first_mut().expect("is not empty") = b'X';

        assert!(matches!(
            Map::decode_from(&mut &bytes[..]),
            Err(DecodeError::InvalidHeader("Map")),
        ));
    }

    #[test]
    fn map_decode_truncated() {
        let bytes = Map::empty(CompactArrayKind::Plain).encode_into_vec();

        for prefix_len in 0..bytes.len() {
            let prefix = bytes.get(0..prefix_len).expect("is in bounds");
            assert!(
                Map::decode_from(&mut &*prefix).is_err(),
                "prefix of {prefix_len} bytes should not decode",
            );
        }
    }
}
