use chd_map::{Builder, Decode, Encode, Map};
use test_log::test;

#[test]
fn map_empty_build() -> chd_map::Result<()> {
    let map = Builder::new().build()?;

    assert_eq!(0, map.len());
    assert!(map.is_empty());
    assert_eq!(None, map.get("anything"));
    assert_eq!(None, map.get(""));
    assert_eq!(0, map.iter().count());

    Ok(())
}

#[test]
fn map_empty_after_deletes() -> chd_map::Result<()> {
    let mut builder = Builder::new();

    // Deleting keys that were never added is fine
    for x in 0u64..100 {
        builder.delete(x.to_le_bytes());
    }

    let map = builder.build()?;

    assert_eq!(0, map.len());
    assert_eq!(None, map.get(0u64.to_le_bytes()));

    Ok(())
}

#[test]
fn map_empty_round_trip() -> chd_map::Result<()> {
    let map = Builder::new().build()?;

    let bytes = map.encode_into_vec();
    let copy = Map::decode_from(&mut &bytes[..])?;

    assert_eq!(0, copy.len());
    assert_eq!(None, copy.get("anything"));
    assert_eq!(map.size_in_bytes(), copy.size_in_bytes());

    Ok(())
}
