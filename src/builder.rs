// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::compact_array::CompactArrayKind;
use crate::hash::spooky_short;
use crate::item::Item;
use crate::map::Map;
use crate::payload::{PayloadStore, SizeStats};
use crate::prime::next_prime;
use crate::{UserKey, UserValue};
use rand::RngCore;

/// Fresh seed pairs tried per parameter set before relaxing the parameters
const NUM_TRIES: usize = 3;

/// Map builder configuration
#[derive(Copy, Clone, Debug)]
pub struct BuildOptions {
    pub(crate) load_factor: f64,
    pub(crate) bucket_size: usize,
    pub(crate) force_build: bool,
    pub(crate) max_displacement: u64,
    pub(crate) array_kind: CompactArrayKind,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            load_factor: 1.0,
            bucket_size: 5,
            force_build: true,
            max_displacement: 1 << 20,
            array_kind: CompactArrayKind::default(),
        }
    }
}

impl BuildOptions {
    /// Sets the load factor (number of keys divided by table size).
    ///
    /// Must be in `(0.0, 1.0]`. Lower values build faster, but make the
    /// resulting map larger.
    ///
    /// Default = 1.0
    #[must_use]
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Sets the average number of keys per bucket.
    ///
    /// Default = 5
    #[must_use]
    pub fn bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Sets whether [`Builder::build`] is allowed to fail.
    ///
    /// When enabled, failed builds relax the bucket size and load factor
    /// until a build succeeds, so the effective load factor may end up
    /// lower than the configured one. When disabled, the first exhausted
    /// set of attempts surfaces [`crate::Error::BuildExhausted`].
    ///
    /// Default = true
    #[must_use]
    pub fn force_build(mut self, force_build: bool) -> Self {
        self.force_build = force_build;
        self
    }

    /// Caps the displacement indices tried per bucket.
    ///
    /// The effective bound is `min(table_size², max_displacement)`.
    ///
    /// Default = 2^20
    #[must_use]
    pub fn max_displacement(mut self, max_displacement: u64) -> Self {
        self.max_displacement = max_displacement;
        self
    }

    /// Sets the displacement array encoding.
    ///
    /// The encoding is persisted in the serialized map, so readers restore
    /// the same one.
    ///
    /// Default = [`CompactArrayKind::Plain`]
    #[must_use]
    pub fn compact_array(mut self, kind: CompactArrayKind) -> Self {
        self.array_kind = kind;
        self
    }
}

/// Manages adding of items and map creation.
///
/// Keys may be added, overwritten and deleted freely; the pending
/// operations are deduplicated when [`Builder::build`] is called, keeping
/// the latest operation per key. Building consumes the builder.
///
/// # Example usage
///
/// ```
/// # use chd_map::Builder;
/// let mut builder = Builder::new();
/// builder.add("drink", "water");
/// builder.add("eat", "bread");
///
/// let map = builder.build()?;
/// assert_eq!(Some(b"water" as &[u8]), map.get("drink"));
/// # Ok::<(), chd_map::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct Builder {
    items: Vec<Item>,
    counter: u64,
    opts: BuildOptions,
}

impl Builder {
    /// Creates a builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder with the given options.
    ///
    /// # Errors
    ///
    /// Will return [`crate::Error::InvalidOption`] if the load factor is
    /// outside `(0.0, 1.0]`, or the bucket size or displacement cap is zero.
    pub fn with_options(opts: BuildOptions) -> crate::Result<Self> {
        if !opts.load_factor.is_finite() || opts.load_factor <= 0.0 || opts.load_factor > 1.0 {
            return Err(crate::Error::InvalidOption(
                "load_factor must be in (0.0, 1.0]",
            ));
        }
        if opts.bucket_size == 0 {
            return Err(crate::Error::InvalidOption("bucket_size must be positive"));
        }
        if opts.max_displacement == 0 {
            return Err(crate::Error::InvalidOption(
                "max_displacement must be positive",
            ));
        }

        Ok(Self {
            items: vec![],
            counter: 0,
            opts,
        })
    }

    /// Queues a key-value pair for insertion.
    pub fn add<K: Into<UserKey>, V: Into<UserValue>>(&mut self, key: K, value: V) {
        self.items.push(Item::new(key.into(), value.into(), self.counter));
        self.counter += 1;
    }

    /// Queues a key for deletion, shadowing earlier insertions of the key.
    pub fn delete<K: Into<UserKey>>(&mut self, key: K) {
        self.items.push(Item::new_tombstone(key.into(), self.counter));
        self.counter += 1;
    }

    /// Returns the number of pending operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no operations are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Builds the map, drawing seeds from the thread-local RNG.
    ///
    /// # Errors
    ///
    /// Will return [`crate::Error::BuildExhausted`] if `force_build` is
    /// disabled and no collision-free assignment was found.
    pub fn build(self) -> crate::Result<Map> {
        let mut rng = rand::rng();
        self.build_with_rng(&mut rng)
    }

    /// Builds the map, drawing seeds from the given RNG.
    ///
    /// For a fixed RNG and insertion sequence, the resulting map is
    /// reproducible bit for bit.
    ///
    /// # Errors
    ///
    /// Will return [`crate::Error::BuildExhausted`] if `force_build` is
    /// disabled and no collision-free assignment was found.
    pub fn build_with_rng<R: RngCore>(mut self, rng: &mut R) -> crate::Result<Map> {
        let items = Self::deduplicate(std::mem::take(&mut self.items));

        if items.is_empty() {
            return Ok(Map::empty(self.opts.array_kind));
        }

        let stats = SizeStats::gather(&items);

        let mut bucket_size = self.opts.bucket_size;
        let mut load_factor = self.opts.load_factor;
        let mut table_size = table_size_for(items.len(), load_factor);

        log::debug!(
            "building map, len={}, table_size={table_size}, bucket_size={bucket_size}",
            items.len(),
        );

        loop {
            for _ in 0..NUM_TRIES {
                let seed = [rng.next_u64(), rng.next_u64()];

                let Some((displacement, slots)) = attempt(
                    &items,
                    seed,
                    bucket_size,
                    table_size,
                    self.opts.max_displacement,
                ) else {
                    log::trace!("no collision-free assignment for seed {seed:?}");
                    continue;
                };

                return Ok(Self::freeze(
                    &items,
                    stats,
                    seed,
                    table_size,
                    &displacement,
                    &slots,
                    self.opts.array_kind,
                    rng,
                ));
            }

            if !self.opts.force_build {
                return Err(crate::Error::BuildExhausted);
            }

            // Relax the parameters: first shrink the buckets, then give up
            // on the configured load factor
            if bucket_size > 1 {
                bucket_size -= 1;
            } else {
                bucket_size = self.opts.bucket_size;
                load_factor *= 0.9;
                table_size = table_size_for(items.len(), load_factor);
            }

            log::debug!(
                "relaxing build parameters, bucket_size={bucket_size}, load_factor={load_factor}, table_size={table_size}",
            );
        }
    }

    /// Sorts pending operations and keeps the latest per key, dropping
    /// keys whose latest operation is a deletion.
    fn deduplicate(mut items: Vec<Item>) -> Vec<Item> {
        items.sort_unstable();

        let mut deduped: Vec<Item> = Vec::with_capacity(items.len());

        for item in items {
            if deduped
                .last()
                .is_some_and(|kept| kept.key == item.key)
            {
                continue;
            }
            deduped.push(item);
        }

        deduped.retain(|item| !item.tombstone);
        deduped
    }

    #[allow(clippy::too_many_arguments)]
    fn freeze<R: RngCore>(
        items: &[Item],
        stats: SizeStats,
        seed: [u64; 2],
        table_size: u64,
        displacement: &[u64],
        slots: &[usize],
        array_kind: CompactArrayKind,
        rng: &mut R,
    ) -> Map {
        let mut records: Vec<Option<(&[u8], &[u8])>> = vec![None; table_size as usize];

        for (item, &slot) in items.iter().zip(slots) {
            if let Some(record) = records.get_mut(slot) {
                *record = Some((&item.key, &item.value));
            }
        }

        let payload = PayloadStore::build(&records, stats, rng);

        let mut array = array_kind.new_array();
        for &hidx in displacement {
            array.push(hidx);
        }

        log::debug!(
            "built map, len={}, table_size={table_size}, nbuckets={}",
            items.len(),
            displacement.len(),
        );

        Map::new(seed, table_size, items.len() as u64, array, payload)
    }
}

fn table_size_for(len: usize, load_factor: f64) -> u64 {
    next_prime(((len as f64) / load_factor).ceil() as u64)
}

struct Bucket {
    index: usize,
    members: Vec<BucketMember>,
}

/// Secondary hashes of a key, already reduced modulo the table size
struct BucketMember {
    h2: u64,
    h3: u64,
    item: usize,
}

/// Tries to find a collision-free displacement assignment for one seed pair.
///
/// Returns the displacement vector and the slot of every item, or `None`
/// if some bucket exhausted the displacement cap.
#[allow(clippy::indexing_slicing)] // NOTE: All slots are reduced modulo the table size
fn attempt(
    items: &[Item],
    seed: [u64; 2],
    bucket_size: usize,
    table_size: u64,
    max_displacement: u64,
) -> Option<(Vec<u64>, Vec<usize>)> {
    let nbuckets = items.len() / bucket_size + 1;

    let mut buckets: Vec<Bucket> = (0..nbuckets)
        .map(|index| Bucket {
            index,
            members: vec![],
        })
        .collect();

    for (idx, item) in items.iter().enumerate() {
        let (h1, h2, h3, _) = spooky_short(&item.key, seed[0], seed[1]);

        buckets[(h1 % nbuckets as u64) as usize]
            .members
            .push(BucketMember {
                h2: h2 % table_size,
                h3: h3 % table_size,
                item: idx,
            });
    }

    // Process the most constrained buckets first, while the table is still
    // mostly free; this is what makes the greedy search converge.
    // The sort is stable, so attempts are reproducible for a fixed seed.
    buckets.sort_by_key(|bucket| std::cmp::Reverse(bucket.members.len()));

    let max_hidx = table_size.saturating_mul(table_size).min(max_displacement);

    let mut occupied = vec![false; table_size as usize];
    let mut displacement = vec![0; nbuckets];
    let mut slots = vec![0; items.len()];
    let mut claimed: Vec<usize> = Vec::with_capacity(buckets.first().map_or(0, |bucket| bucket.members.len()));

    for bucket in &buckets {
        if bucket.members.is_empty() {
            continue;
        }

        let mut hidx = 0;

        'search: loop {
            if hidx == max_hidx {
                return None;
            }

            let d0 = hidx / table_size;
            let d1 = hidx % table_size;

            claimed.clear();

            for member in &bucket.members {
                let slot = member
                    .h2
                    .wrapping_add(d0.wrapping_mul(member.h3))
                    .wrapping_add(d1)
                    % table_size;

                if occupied[slot as usize] {
                    // Collision, release the slots claimed for this hidx
                    for &claimed_slot in &claimed {
                        occupied[claimed_slot] = false;
                    }

                    hidx += 1;
                    continue 'search;
                }

                occupied[slot as usize] = true;
                claimed.push(slot as usize);
                slots[member.item] = slot as usize;
            }

            displacement[bucket.index] = hidx;
            break;
        }
    }

    Some((displacement, slots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use test_log::test;

    #[test]
    fn builder_rejects_invalid_options() {
        assert!(Builder::with_options(BuildOptions::default()).is_ok());
        assert!(Builder::with_options(BuildOptions::default().load_factor(0.0)).is_err());
        assert!(Builder::with_options(BuildOptions::default().load_factor(-1.0)).is_err());
        assert!(Builder::with_options(BuildOptions::default().load_factor(1.5)).is_err());
        assert!(Builder::with_options(BuildOptions::default().load_factor(f64::NAN)).is_err());
        assert!(Builder::with_options(BuildOptions::default().bucket_size(0)).is_err());
        assert!(Builder::with_options(BuildOptions::default().max_displacement(0)).is_err());
    }

    #[test]
    fn builder_dedup_keeps_latest() {
        let mut builder = Builder::new();
        builder.add(*b"a", *b"1");
        builder.add(*b"b", *b"2");
        builder.add(*b"a", *b"3");

        let items = Builder::deduplicate(builder.items);
        assert_eq!(2, items.len());
        assert_eq!(b"3", &*items.first().expect("should exist").value);
    }

    #[test]
    fn builder_dedup_drops_tombstones() {
        let mut builder = Builder::new();
        builder.add(*b"a", *b"1");
        builder.delete(*b"a");
        builder.delete(*b"b");
        builder.add(*b"c", *b"2");

        let items = Builder::deduplicate(builder.items);
        assert_eq!(1, items.len());
        assert_eq!(b"c", &*items.first().expect("should exist").key);
    }

    #[test]
    fn builder_reinsert_after_delete() {
        let mut builder = Builder::new();
        builder.add(*b"a", *b"1");
        builder.delete(*b"a");
        builder.add(*b"a", *b"2");

        let items = Builder::deduplicate(builder.items);
        assert_eq!(1, items.len());
        assert_eq!(b"2", &*items.first().expect("should exist").value);
    }

    #[test]
    fn builder_attempt_assigns_distinct_slots() {
        let items = (0u64..100)
            .map(|idx| {
                Item::new(
                    crate::UserKey::from(idx.to_le_bytes()),
                    crate::UserValue::from(vec![]),
                    idx,
                )
            })
            .collect::<Vec<_>>();

        let table_size = table_size_for(items.len(), 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        // Some seed within a few tries must yield an assignment
        let (displacement, slots) = std::iter::repeat_with(|| [rng.next_u64(), rng.next_u64()])
            .take(10)
            .find_map(|seed| attempt(&items, seed, 5, table_size, 1 << 20))
            .expect("should find an assignment");

        assert_eq!(items.len() / 5 + 1, displacement.len());

        let mut seen = vec![false; table_size as usize];
        for slot in slots {
            assert!(!seen[slot], "slot {slot} assigned twice");
            seen[slot] = true;
        }
    }

    #[test]
    fn builder_deterministic_for_fixed_rng() {
        let mut builder = Builder::new();
        for idx in 0u64..500 {
            builder.add(idx.to_le_bytes(), idx.to_be_bytes());
        }

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let map_a = builder
            .clone()
            .build_with_rng(&mut rng)
            .expect("should build");

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let map_b = builder.build_with_rng(&mut rng).expect("should build");

        use crate::coding::Encode;
        assert_eq!(map_a.encode_into_vec(), map_b.encode_into_vec());
    }
}
