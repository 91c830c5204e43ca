// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! An immutable key-value map using the CHD ("compress, hash and displace")
//! minimal perfect hash algorithm.
//!
//! ##### NOTE
//!
//! > This crate provides a frozen dictionary, not a general-purpose hash
//! > map. The key set is fixed at build time; there is no insertion or
//! > deletion into a built map.
//!
//! ##### About
//!
//! A [`Builder`] collects key-value pairs and constructs a [`Map`] offline:
//! keys are partitioned into buckets by a first hash, then every bucket
//! greedily receives a displacement index so that a secondary double-hash
//! maps each key to a distinct slot of a prime-sized table. The
//! displacement vector costs a few bits per key, and lookups are O(1)
//! worst case: one hash, one displacement access, one payload access.
//!
//! A built map is read-only and freely shareable across threads, and can be
//! serialized into a self-describing stream that restores it byte for byte.
//!
//! See <http://cmph.sourceforge.net/papers/esa09.pdf> for more details.
//!
//! # Example usage
//!
//! ```
//! use chd_map::{Builder, Decode, Encode, Map};
//!
//! let mut builder = Builder::new();
//!
//! builder.add("berries", "blue");
//! builder.add("lemons", "yellow");
//! builder.add("oranges", "orange");
//! builder.delete("lemons");
//!
//! let map = builder.build()?;
//!
//! assert_eq!(2, map.len());
//! assert_eq!(Some(b"blue" as &[u8]), map.get("berries"));
//! assert_eq!(None, map.get("lemons"));
//!
//! // Maps serialize into any writer and come back behaviorally identical
//! let bytes = map.encode_into_vec();
//! let copy = Map::decode_from(&mut &bytes[..])?;
//!
//! assert_eq!(Some(b"orange" as &[u8]), copy.get("oranges"));
//! #
//! # Ok::<(), chd_map::Error>(())
//! ```

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

pub(crate) type HashSet<K> = std::collections::HashSet<K, rustc_hash::FxBuildHasher>;

mod builder;

#[doc(hidden)]
pub mod coding;

mod compact_array;
mod error;
mod hash;
mod item;
mod map;
mod payload;
mod prime;
mod slice;

pub use {
    builder::{BuildOptions, Builder},
    coding::{Decode, DecodeError, Encode, EncodeError},
    compact_array::{CompactArray, CompactArrayKind, PlainArray},
    error::{Error, Result},
    hash::spooky_short,
    map::Map,
    slice::Slice,
};

/// User defined key
pub type UserKey = Slice;

/// User defined data (byte array)
pub type UserValue = Slice;

/// KV-tuple, typically returned by an iterator
pub type KvPair = (UserKey, UserValue);
