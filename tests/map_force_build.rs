use chd_map::{BuildOptions, Builder, Error};
use test_log::test;

#[test]
fn build_options_are_validated() {
    assert!(matches!(
        Builder::with_options(BuildOptions::default().load_factor(0.0)),
        Err(Error::InvalidOption(_)),
    ));
    assert!(matches!(
        Builder::with_options(BuildOptions::default().load_factor(1.1)),
        Err(Error::InvalidOption(_)),
    ));
    assert!(matches!(
        Builder::with_options(BuildOptions::default().bucket_size(0)),
        Err(Error::InvalidOption(_)),
    ));
    assert!(Builder::with_options(BuildOptions::default().load_factor(0.5)).is_ok());
}

#[test]
fn build_without_force_either_succeeds_or_exhausts() -> chd_map::Result<()> {
    // A tiny key set at full load; every outcome must be well-defined
    for _ in 0..50 {
        let mut builder = Builder::with_options(
            BuildOptions::default()
                .load_factor(1.0)
                .force_build(false)
                .max_displacement(4),
        )?;

        for x in 0u64..16 {
            builder.add(x.to_le_bytes(), x.to_le_bytes());
        }

        match builder.build() {
            Ok(map) => assert_eq!(16, map.len()),
            Err(Error::BuildExhausted) => {}
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    Ok(())
}

#[test]
fn build_with_force_always_succeeds() -> chd_map::Result<()> {
    for run in 0..20 {
        let mut builder = Builder::with_options(
            BuildOptions::default()
                .load_factor(1.0)
                .max_displacement(2),
        )?;

        for x in 0u64..(run * 7 + 1) {
            builder.add(x.to_le_bytes(), x.to_le_bytes());
        }

        let map = builder.build()?;
        assert_eq!(run * 7 + 1, map.len());
    }

    Ok(())
}

#[test]
fn build_with_small_buckets() -> chd_map::Result<()> {
    let mut builder = Builder::with_options(BuildOptions::default().bucket_size(1))?;

    for x in 0u64..1_000 {
        builder.add(x.to_le_bytes(), x.to_le_bytes());
    }

    let map = builder.build()?;
    assert_eq!(1_000, map.len());

    for x in 0u64..1_000 {
        assert_eq!(Some(&x.to_le_bytes() as &[u8]), map.get(x.to_le_bytes()));
    }

    Ok(())
}

#[test]
fn build_with_low_load_factor() -> chd_map::Result<()> {
    let mut builder = Builder::with_options(BuildOptions::default().load_factor(0.5))?;

    for x in 0u64..1_000 {
        builder.add(x.to_le_bytes(), x.to_le_bytes());
    }

    let map = builder.build()?;

    assert_eq!(1_000, map.len());
    assert!(map.table_size() >= 2_000);

    Ok(())
}
