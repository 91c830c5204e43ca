use chd_map::{Builder, Decode, Encode, Map};
use nanoid::nanoid;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use test_log::test;

#[test]
fn map_fixed_key_variable_value() -> chd_map::Result<()> {
    const ITEM_COUNT: u64 = 100_000;

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut builder = Builder::new();
    let mut values = Vec::with_capacity(ITEM_COUNT as usize);

    for x in 0..ITEM_COUNT {
        let len = rng.random_range(0..10);
        let mut value = vec![0u8; len];
        rng.fill(&mut value[..]);

        builder.add(x.to_le_bytes(), value.clone());
        values.push(value);
    }

    let map = builder.build()?;
    assert_eq!(ITEM_COUNT, map.len());

    for (x, value) in values.iter().enumerate() {
        assert_eq!(
            Some(&value[..]),
            map.get((x as u64).to_le_bytes()),
            "wrong value for key {x}",
        );
    }

    Ok(())
}

#[test]
fn map_variable_keys_and_values() -> chd_map::Result<()> {
    const ITEM_COUNT: usize = 100_000;

    let mut rng = ChaCha8Rng::seed_from_u64(2);
    let mut builder = Builder::new();

    // Keys are 1..=20 characters; duplicates are resolved by
    // last-writer-wins, mirrored by the HashMap inserts
    let mut expected = std::collections::HashMap::new();

    for _ in 0..ITEM_COUNT {
        let key = nanoid!({ rng.random_range(1..=20) });

        let len = rng.random_range(0..32);
        let mut value = vec![0u8; len];
        rng.fill(&mut value[..]);

        builder.add(key.clone(), value.clone());
        expected.insert(key, value);
    }

    let map = builder.build()?;
    assert_eq!(expected.len() as u64, map.len());

    for (key, value) in &expected {
        assert_eq!(Some(&value[..]), map.get(key), "wrong value for key {key:?}");
    }

    // All built keys are at most 20 characters, so a disjoint probe set
    // is easy to come by
    for _ in 0..10_000 {
        let probe = nanoid!(25);
        assert_eq!(None, map.get(&probe), "false positive for {probe:?}");
    }

    Ok(())
}

#[test]
fn map_single_byte_keys() -> chd_map::Result<()> {
    // Saturates the key space, so no empty-slot sentinel can exist
    let mut builder = Builder::new();

    for byte in 0..=255u8 {
        builder.add([byte], [byte, byte]);
    }

    let map = builder.build()?;
    assert_eq!(256, map.len());

    for byte in 0..=255u8 {
        assert_eq!(Some(&[byte, byte] as &[u8]), map.get([byte]));
    }

    assert_eq!(None, map.get("no such key"));

    Ok(())
}

#[test]
fn map_empty_keys_and_values() -> chd_map::Result<()> {
    let mut builder = Builder::new();

    builder.add("", "empty key");
    builder.add("empty value", "");
    builder.add("", "still an empty key");

    let map = builder.build()?;
    assert_eq!(2, map.len());

    assert_eq!(Some(b"still an empty key" as &[u8]), map.get(""));
    assert_eq!(Some(b"" as &[u8]), map.get("empty value"));
    assert_eq!(None, map.get("missing"));

    let bytes = map.encode_into_vec();
    let copy = Map::decode_from(&mut &bytes[..])?;
    assert_eq!(Some(b"still an empty key" as &[u8]), copy.get(""));

    Ok(())
}

#[test]
fn map_round_trip_all_regimes() -> chd_map::Result<()> {
    // (keys, values) chosen to hit all four storage regimes
    let scenarios: [(&[&[u8]], &[&[u8]]); 4] = [
        // Fixed key size, fixed item size
        (&[b"aaaa", b"bbbb", b"cccc"], &[b"1111", b"2222", b"3333"]),
        // Variable key size, fixed item size
        (&[b"aaaa", b"bb", b"c"], &[b"1111", b"222222", b"3333333"]),
        // Fixed key size, variable item size
        (&[b"aaaa", b"bbbb", b"cccc"], &[b"1", b"22", b""]),
        // Variable key size, variable item size
        (&[b"aaaa", b"bb", b"c"], &[b"1", b"", b"333"]),
    ];

    for (keys, values) in scenarios {
        let mut builder = Builder::new();

        for (key, value) in keys.iter().zip(values) {
            builder.add(*key, *value);
        }

        let map = builder.build()?;
        let bytes = map.encode_into_vec();
        let copy = Map::decode_from(&mut &bytes[..])?;

        for (key, value) in keys.iter().zip(values) {
            assert_eq!(Some(*value), map.get(key), "key {key:?}");
            assert_eq!(Some(*value), copy.get(key), "key {key:?} after round trip");
        }

        assert_eq!(None, map.get("zzzz"));
        assert_eq!(None, copy.get("zzzz"));
    }

    Ok(())
}
