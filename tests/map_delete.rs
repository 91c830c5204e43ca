use chd_map::Builder;
use test_log::test;

#[test]
fn map_dedup_keeps_latest_value() -> chd_map::Result<()> {
    let mut builder = Builder::new();

    builder.add("a", "old");
    builder.add("b", "old");
    builder.add("a", "new");

    let map = builder.build()?;

    assert_eq!(2, map.len());
    assert_eq!(Some(b"new" as &[u8]), map.get("a"));
    assert_eq!(Some(b"old" as &[u8]), map.get("b"));

    Ok(())
}

#[test]
fn map_delete_shadows_add() -> chd_map::Result<()> {
    let mut builder = Builder::new();

    for x in 0u64..100 {
        builder.add(x.to_le_bytes(), x.to_le_bytes());
    }

    let previous_len = 100;

    builder.add("extra", "value");
    builder.delete("extra");

    let map = builder.build()?;

    assert_eq!(previous_len, map.len());
    assert_eq!(None, map.get("extra"));

    Ok(())
}

#[test]
fn map_delete_and_reinsert() -> chd_map::Result<()> {
    const ITEM_COUNT: u64 = 10_000;

    let mut builder = Builder::new();

    // Delete items that weren't added
    for x in 0..100u64 {
        builder.delete(x.to_le_bytes());
    }

    // Add items
    for x in 0..ITEM_COUNT {
        builder.add(x.to_le_bytes(), x.to_le_bytes());
    }

    // Delete some added items
    for x in 0..1_000u64 {
        builder.delete(x.to_le_bytes());
    }

    // Reinsert half of the deleted items
    for x in 0..500u64 {
        builder.add(x.to_le_bytes(), (x + 1).to_le_bytes());
    }

    let map = builder.build()?;
    assert_eq!(ITEM_COUNT - 1_000 + 500, map.len());

    for x in 0..500u64 {
        assert_eq!(Some(&(x + 1).to_le_bytes() as &[u8]), map.get(x.to_le_bytes()));
    }
    for x in 500..1_000u64 {
        assert_eq!(None, map.get(x.to_le_bytes()), "key {x} should be deleted");
    }
    for x in 1_000..ITEM_COUNT {
        assert_eq!(Some(&x.to_le_bytes() as &[u8]), map.get(x.to_le_bytes()));
    }

    Ok(())
}
