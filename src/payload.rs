// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{decode_byte_string, encode_byte_string, DecodeError, EncodeError};
use crate::item::Item;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::RngCore;
use std::io::{Read, Write};

/// Item size marking an empty slot in the variable-item regimes
const EMPTY_SLOT: u64 = u64::MAX;

/// Storage regime of a payload store.
///
/// Chosen once at build time from the observed key and item sizes. The more
/// that is constant across the input, the less per-slot metadata is kept:
/// with a fixed item size, offsets are directly computable; with a fixed key
/// size, no per-slot key length is needed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Regime {
    /// Fixed key size, fixed item size: no per-slot metadata
    FixedKeyFixedItem,

    /// Variable key size, fixed item size: per-slot key size
    VariableKeyFixedItem,

    /// Fixed key size, variable item size: per-slot item size and offset
    FixedKeyVariableItem,

    /// Variable key size, variable item size: per-slot item size, offset and key size
    VariableKeyVariableItem,
}

impl Regime {
    fn has_fixed_item_size(self) -> bool {
        matches!(self, Self::FixedKeyFixedItem | Self::VariableKeyFixedItem)
    }
}

impl From<Regime> for u8 {
    fn from(value: Regime) -> Self {
        match value {
            Regime::FixedKeyFixedItem => 0,
            Regime::VariableKeyFixedItem => 1,
            Regime::FixedKeyVariableItem => 2,
            Regime::VariableKeyVariableItem => 3,
        }
    }
}

impl TryFrom<u8> for Regime {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::FixedKeyFixedItem),
            1 => Ok(Self::VariableKeyFixedItem),
            2 => Ok(Self::FixedKeyVariableItem),
            3 => Ok(Self::VariableKeyVariableItem),
            _ => Err(()),
        }
    }
}

/// Key and item size extrema, gathered in one linear pass over the
/// deduplicated items
#[derive(Copy, Clone, Debug)]
pub(crate) struct SizeStats {
    pub item_count: usize,
    pub min_key_size: usize,
    pub max_key_size: usize,
    pub min_item_size: usize,
    pub max_item_size: usize,
}

impl SizeStats {
    pub fn gather(items: &[Item]) -> Self {
        let mut stats = Self {
            item_count: items.len(),
            min_key_size: usize::MAX,
            max_key_size: 0,
            min_item_size: usize::MAX,
            max_item_size: 0,
        };

        for item in items {
            stats.min_key_size = stats.min_key_size.min(item.key.len());
            stats.max_key_size = stats.max_key_size.max(item.key.len());
            stats.min_item_size = stats.min_item_size.min(item.size());
            stats.max_item_size = stats.max_item_size.max(item.size());
        }

        stats
    }

    pub fn regime(&self) -> Regime {
        let fixed_key = self.min_key_size == self.max_key_size;

        // NOTE: When every possible key of the sentinel length is taken
        // (in particular, when keys have length zero), no sentinel can be
        // drawn, so explicit per-slot item sizes are required
        let saturated = self.max_key_size < 8
            && self.item_count as u64 >= 1 << (8 * self.max_key_size as u32);

        let fixed_item = self.min_item_size == self.max_item_size && !saturated;

        match (fixed_key, fixed_item) {
            (true, true) => Regime::FixedKeyFixedItem,
            (false, true) => Regime::VariableKeyFixedItem,
            (true, false) => Regime::FixedKeyVariableItem,
            (false, false) => Regime::VariableKeyVariableItem,
        }
    }
}

/// Key/value bytes of a built map, packed by slot.
///
/// Immutable once built. Empty slots are marked by [`EMPTY_SLOT`] in the
/// item size metadata, or, in the fixed-item regimes, by a random key
/// sentinel that collides with no real key.
#[derive(Debug)]
pub(crate) struct PayloadStore {
    regime: Regime,
    slot_count: usize,

    /// Key size (and sentinel length) in the fixed-key regimes
    fixed_key_size: u64,

    /// Record stride in the fixed-item regimes
    fixed_item_size: u64,

    /// Marks empty slots in the fixed-item regimes; empty otherwise
    key_sentinel: Box<[u8]>,

    data: Box<[u8]>,
    offsets: Box<[u64]>,
    item_sizes: Box<[u64]>,
    key_sizes: Box<[u64]>,
}

impl PayloadStore {
    /// The store of the empty map.
    pub fn empty() -> Self {
        Self {
            regime: Regime::VariableKeyVariableItem,
            slot_count: 0,
            fixed_key_size: 0,
            fixed_item_size: 0,
            key_sentinel: Box::default(),
            data: Box::default(),
            offsets: Box::default(),
            item_sizes: Box::default(),
            key_sizes: Box::default(),
        }
    }

    /// Packs the slot assignment into a store.
    ///
    /// `slots` has one entry per table slot, `None` for unoccupied ones.
    pub fn build<R: RngCore + ?Sized>(
        slots: &[Option<(&[u8], &[u8])>],
        stats: SizeStats,
        rng: &mut R,
    ) -> Self {
        let regime = stats.regime();
        log::debug!("packing payload for {} slots, regime={regime:?}", slots.len());

        if regime.has_fixed_item_size() {
            Self::build_fixed_item(slots, stats, regime, rng)
        } else {
            Self::build_variable_item(slots, stats, regime)
        }
    }

    #[allow(clippy::indexing_slicing)]
    fn build_fixed_item<R: RngCore + ?Sized>(
        slots: &[Option<(&[u8], &[u8])>],
        stats: SizeStats,
        regime: Regime,
        rng: &mut R,
    ) -> Self {
        let stride = stats.max_item_size;
        let sentinel = draw_sentinel(slots, stats.max_key_size, rng);

        let mut data = vec![0; slots.len() * stride];
        let mut key_sizes = if regime == Regime::VariableKeyFixedItem {
            vec![stats.max_key_size as u64; slots.len()]
        } else {
            vec![]
        };

        for (slot, record) in slots.iter().enumerate() {
            let offset = slot * stride;

            if let Some((key, value)) = record {
                data[offset..(offset + key.len())].copy_from_slice(key);
                data[(offset + key.len())..(offset + key.len() + value.len())]
                    .copy_from_slice(value);

                if let Some(key_size) = key_sizes.get_mut(slot) {
                    *key_size = key.len() as u64;
                }
            } else {
                // An unoccupied slot holds the sentinel, padded with zeroes
                data[offset..(offset + sentinel.len())].copy_from_slice(&sentinel);
            }
        }

        Self {
            regime,
            slot_count: slots.len(),
            fixed_key_size: stats.max_key_size as u64,
            fixed_item_size: stride as u64,
            key_sentinel: sentinel,
            data: data.into_boxed_slice(),
            offsets: Box::default(),
            item_sizes: Box::default(),
            key_sizes: key_sizes.into_boxed_slice(),
        }
    }

    fn build_variable_item(
        slots: &[Option<(&[u8], &[u8])>],
        stats: SizeStats,
        regime: Regime,
    ) -> Self {
        let mut data = vec![];
        let mut offsets = vec![0; slots.len()];
        let mut item_sizes = vec![EMPTY_SLOT; slots.len()];
        let mut key_sizes = if regime == Regime::VariableKeyVariableItem {
            vec![0; slots.len()]
        } else {
            vec![]
        };

        for (slot, record) in slots.iter().enumerate() {
            if let Some(offset) = offsets.get_mut(slot) {
                *offset = data.len() as u64;
            }

            let Some((key, value)) = record else {
                continue;
            };

            if let Some(item_size) = item_sizes.get_mut(slot) {
                *item_size = (key.len() + value.len()) as u64;
            }
            if let Some(key_size) = key_sizes.get_mut(slot) {
                *key_size = key.len() as u64;
            }

            data.extend_from_slice(key);
            data.extend_from_slice(value);
        }

        Self {
            regime,
            slot_count: slots.len(),
            fixed_key_size: stats.max_key_size as u64,
            fixed_item_size: 0,
            key_sentinel: Box::default(),
            data: data.into_boxed_slice(),
            offsets: offsets.into_boxed_slice(),
            item_sizes: item_sizes.into_boxed_slice(),
            key_sizes: key_sizes.into_boxed_slice(),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Returns the (key, value) stored in a slot, or `None` for empty slots.
    ///
    /// Does not panic on malformed metadata; an out-of-bounds record reads
    /// as empty.
    pub fn record(&self, slot: usize) -> Option<(&[u8], &[u8])> {
        let (offset, item_size, key_size) = match self.regime {
            Regime::FixedKeyFixedItem => (
                slot as u64 * self.fixed_item_size,
                self.fixed_item_size,
                self.fixed_key_size,
            ),
            Regime::VariableKeyFixedItem => (
                slot as u64 * self.fixed_item_size,
                self.fixed_item_size,
                self.key_sizes.get(slot).copied()?,
            ),
            Regime::FixedKeyVariableItem => {
                let item_size = self.item_sizes.get(slot).copied()?;
                if item_size == EMPTY_SLOT {
                    return None;
                }
                (
                    self.offsets.get(slot).copied()?,
                    item_size,
                    self.fixed_key_size,
                )
            }
            Regime::VariableKeyVariableItem => {
                let item_size = self.item_sizes.get(slot).copied()?;
                if item_size == EMPTY_SLOT {
                    return None;
                }
                (
                    self.offsets.get(slot).copied()?,
                    item_size,
                    self.key_sizes.get(slot).copied()?,
                )
            }
        };

        if key_size > item_size {
            return None;
        }

        let record = self
            .data
            .get((offset as usize)..((offset + item_size) as usize))?;

        let (key, value) = record.split_at(key_size as usize);

        if !self.key_sentinel.is_empty() && *key == *self.key_sentinel {
            return None;
        }

        Some((key, value))
    }

    /// Payload and metadata size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
            + (self.offsets.len() + self.item_sizes.len() + self.key_sizes.len())
                * std::mem::size_of::<u64>()
            + self.key_sentinel.len()
    }

    pub fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_u8(u8::from(self.regime))?;
        writer.write_u64::<LittleEndian>(self.fixed_key_size)?;
        writer.write_u64::<LittleEndian>(self.fixed_item_size)?;
        encode_byte_string(writer, &self.key_sentinel)?;
        encode_byte_string(writer, &self.data)?;

        // Per-slot metadata; the counts are implied by the slot count
        for column in [&self.item_sizes, &self.offsets, &self.key_sizes] {
            for value in column.iter() {
                writer.write_u64::<LittleEndian>(*value)?;
            }
        }

        Ok(())
    }

    pub fn decode_from<R: Read>(reader: &mut R, slot_count: usize) -> Result<Self, DecodeError> {
        let tag = reader.read_u8()?;
        let regime = Regime::try_from(tag).map_err(|()| DecodeError::InvalidTag(("Regime", tag)))?;

        let fixed_key_size = reader.read_u64::<LittleEndian>()?;
        let fixed_item_size = reader.read_u64::<LittleEndian>()?;
        let key_sentinel = decode_byte_string(reader)?.into_boxed_slice();
        let data = decode_byte_string(reader)?.into_boxed_slice();

        let mut column = |present: bool| -> Result<Box<[u64]>, DecodeError> {
            // NOTE: The slot count comes from the stream, so clamp the
            // preallocation
            const PREALLOC_CAP: usize = 2 * 1_024 * 1_024;

            if !present {
                return Ok(Box::default());
            }

            let mut values = Vec::with_capacity(slot_count.min(PREALLOC_CAP));
            for _ in 0..slot_count {
                values.push(reader.read_u64::<LittleEndian>()?);
            }
            Ok(values.into_boxed_slice())
        };

        let item_sizes = column(!regime.has_fixed_item_size())?;
        let offsets = column(!regime.has_fixed_item_size())?;
        let key_sizes = column(matches!(
            regime,
            Regime::VariableKeyFixedItem | Regime::VariableKeyVariableItem
        ))?;

        let store = Self {
            regime,
            slot_count,
            fixed_key_size,
            fixed_item_size,
            key_sentinel,
            data,
            offsets,
            item_sizes,
            key_sizes,
        };

        if !store.is_coherent() {
            return Err(DecodeError::InvalidHeader("PayloadStore"));
        }

        Ok(store)
    }

    /// Cheap structural checks so a garbled stream is rejected at decode
    /// time instead of surfacing as bogus lookups.
    fn is_coherent(&self) -> bool {
        match self.regime {
            Regime::FixedKeyFixedItem | Regime::VariableKeyFixedItem => {
                self.data.len() as u64 == self.slot_count as u64 * self.fixed_item_size
                    && self.fixed_key_size <= self.fixed_item_size
                    && self.key_sentinel.len() as u64 == self.fixed_key_size
                    && (self.slot_count == 0 || self.fixed_item_size > 0)
            }
            Regime::FixedKeyVariableItem | Regime::VariableKeyVariableItem => self
                .item_sizes
                .iter()
                .zip(self.offsets.iter())
                .all(|(&item_size, &offset)| {
                    item_size == EMPTY_SLOT
                        || offset
                            .checked_add(item_size)
                            .is_some_and(|end| end <= self.data.len() as u64)
                }),
        }
    }
}

fn draw_sentinel<R: RngCore + ?Sized>(
    slots: &[Option<(&[u8], &[u8])>],
    len: usize,
    rng: &mut R,
) -> Box<[u8]> {
    // Only keys of exactly the sentinel length can collide with it
    let keys = slots
        .iter()
        .flatten()
        .map(|(key, _)| *key)
        .filter(|key| key.len() == len)
        .collect::<crate::HashSet<_>>();

    let mut sentinel = vec![0; len];

    loop {
        rng.fill_bytes(&mut sentinel);

        if !keys.contains(&sentinel[..]) {
            return sentinel.into_boxed_slice();
        }
    }
}
