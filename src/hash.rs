// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Port of Bob Jenkins' `SpookyHash` V2 short variant, widened to return
//! all four 64-bit lanes instead of two.
//!
//! The output is fixed: the same (message, seed pair) yields the same
//! quadruple on every platform, as whole words are consumed little-endian.

/// Internal mixing constant ("a constant which is not a power of two and
/// not otherwise particularly magic")
const SC_CONST: u64 = 0xdead_beef_dead_beef;

#[allow(clippy::many_single_char_names)]
fn short_mix(mut h0: u64, mut h1: u64, mut h2: u64, mut h3: u64) -> (u64, u64, u64, u64) {
    h2 = h2.rotate_left(50);
    h2 = h2.wrapping_add(h3);
    h0 ^= h2;
    h3 = h3.rotate_left(52);
    h3 = h3.wrapping_add(h0);
    h1 ^= h3;
    h0 = h0.rotate_left(30);
    h0 = h0.wrapping_add(h1);
    h2 ^= h0;
    h1 = h1.rotate_left(41);
    h1 = h1.wrapping_add(h2);
    h3 ^= h1;
    h2 = h2.rotate_left(54);
    h2 = h2.wrapping_add(h3);
    h0 ^= h2;
    h3 = h3.rotate_left(48);
    h3 = h3.wrapping_add(h0);
    h1 ^= h3;
    h0 = h0.rotate_left(38);
    h0 = h0.wrapping_add(h1);
    h2 ^= h0;
    h1 = h1.rotate_left(37);
    h1 = h1.wrapping_add(h2);
    h3 ^= h1;
    h2 = h2.rotate_left(62);
    h2 = h2.wrapping_add(h3);
    h0 ^= h2;
    h3 = h3.rotate_left(34);
    h3 = h3.wrapping_add(h0);
    h1 ^= h3;
    h0 = h0.rotate_left(5);
    h0 = h0.wrapping_add(h1);
    h2 ^= h0;
    h1 = h1.rotate_left(36);
    h1 = h1.wrapping_add(h2);
    h3 ^= h1;
    (h0, h1, h2, h3)
}

#[allow(clippy::many_single_char_names)]
fn short_end(mut h0: u64, mut h1: u64, mut h2: u64, mut h3: u64) -> (u64, u64, u64, u64) {
    h3 ^= h2;
    h2 = h2.rotate_left(15);
    h3 = h3.wrapping_add(h2);
    h0 ^= h3;
    h3 = h3.rotate_left(52);
    h0 = h0.wrapping_add(h3);
    h1 ^= h0;
    h0 = h0.rotate_left(26);
    h1 = h1.wrapping_add(h0);
    h2 ^= h1;
    h1 = h1.rotate_left(51);
    h2 = h2.wrapping_add(h1);
    h3 ^= h2;
    h2 = h2.rotate_left(28);
    h3 = h3.wrapping_add(h2);
    h0 ^= h3;
    h3 = h3.rotate_left(9);
    h0 = h0.wrapping_add(h3);
    h1 ^= h0;
    h0 = h0.rotate_left(47);
    h1 = h1.wrapping_add(h0);
    h2 ^= h1;
    h1 = h1.rotate_left(54);
    h2 = h2.wrapping_add(h1);
    h3 ^= h2;
    h2 = h2.rotate_left(32);
    h3 = h3.wrapping_add(h2);
    h0 ^= h3;
    h3 = h3.rotate_left(25);
    h0 = h0.wrapping_add(h3);
    h1 ^= h0;
    h0 = h0.rotate_left(63);
    h1 = h1.wrapping_add(h0);
    (h0, h1, h2, h3)
}

#[inline]
fn load_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0; 8];

    // NOTE: All callers guard the offset by the surrounding length checks
    #[allow(clippy::indexing_slicing)]
    buf.copy_from_slice(&bytes[offset..(offset + 8)]);

    u64::from_le_bytes(buf)
}

#[inline]
fn load_u32(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0; 4];

    // NOTE: All callers guard the offset by the surrounding length checks
    #[allow(clippy::indexing_slicing)]
    buf.copy_from_slice(&bytes[offset..(offset + 4)]);

    u64::from(u32::from_le_bytes(buf))
}

/// Hashes a message with a pair of 64-bit seeds, yielding four 64-bit lanes.
#[must_use]
#[allow(clippy::indexing_slicing, clippy::many_single_char_names)]
pub fn spooky_short(message: &[u8], seed1: u64, seed2: u64) -> (u64, u64, u64, u64) {
    let length = message.len();

    let mut a = seed1;
    let mut b = seed2;
    let mut c = SC_CONST;
    let mut d = SC_CONST;

    let mut rest = message;

    if length > 15 {
        // Handle all complete sets of 32 bytes
        while rest.len() >= 32 {
            let (block, tail) = rest.split_at(32);
            c = c.wrapping_add(load_u64(block, 0));
            d = d.wrapping_add(load_u64(block, 8));
            (a, b, c, d) = short_mix(a, b, c, d);
            a = a.wrapping_add(load_u64(block, 16));
            b = b.wrapping_add(load_u64(block, 24));
            rest = tail;
        }

        // Handle the case of 16+ remaining bytes
        if rest.len() >= 16 {
            let (block, tail) = rest.split_at(16);
            c = c.wrapping_add(load_u64(block, 0));
            d = d.wrapping_add(load_u64(block, 8));
            (a, b, c, d) = short_mix(a, b, c, d);
            rest = tail;
        }
    }

    // Handle the last 0..15 bytes, and their length
    let remainder = rest.len();
    d = d.wrapping_add((length as u64) << 56);

    if remainder >= 12 {
        if remainder == 15 {
            d = d.wrapping_add(u64::from(rest[14]) << 48);
        }
        if remainder >= 14 {
            d = d.wrapping_add(u64::from(rest[13]) << 40);
        }
        if remainder >= 13 {
            d = d.wrapping_add(u64::from(rest[12]) << 32);
        }
        d = d.wrapping_add(load_u32(rest, 8));
        c = c.wrapping_add(load_u64(rest, 0));
    } else if remainder >= 8 {
        if remainder == 11 {
            d = d.wrapping_add(u64::from(rest[10]) << 16);
        }
        if remainder >= 10 {
            d = d.wrapping_add(u64::from(rest[9]) << 8);
        }
        if remainder >= 9 {
            d = d.wrapping_add(u64::from(rest[8]));
        }
        c = c.wrapping_add(load_u64(rest, 0));
    } else if remainder >= 4 {
        if remainder == 7 {
            c = c.wrapping_add(u64::from(rest[6]) << 48);
        }
        if remainder >= 6 {
            c = c.wrapping_add(u64::from(rest[5]) << 40);
        }
        if remainder >= 5 {
            c = c.wrapping_add(u64::from(rest[4]) << 32);
        }
        c = c.wrapping_add(load_u32(rest, 0));
    } else if remainder >= 1 {
        if remainder == 3 {
            c = c.wrapping_add(u64::from(rest[2]) << 16);
        }
        if remainder >= 2 {
            c = c.wrapping_add(u64::from(rest[1]) << 8);
        }
        c = c.wrapping_add(u64::from(rest[0]));
    } else {
        c = c.wrapping_add(SC_CONST);
        d = d.wrapping_add(SC_CONST);
    }

    short_end(a, b, c, d)
}
