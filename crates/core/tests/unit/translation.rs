use std::io::Write as _;

use busarb_core::Arbiter;
use busarb_core::arbiter::translation::AddressTranslator;
use busarb_core::bus::Request;
use busarb_core::common::ConfigError;
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

use crate::common::builder::ArbiterBuilder;
use crate::common::harness::Bench;

fn script(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn translation_file_remaps_dispatched_addresses() {
    let file = script(
        "# low    high    new_base\n\
         0x1000 0x1fff 0x8000 // boot ROM alias\n\
         0x4000 0x40ff 0x0\n",
    );
    let config = ArbiterBuilder::new()
        .with(|c| c.translation_file = Some(file.path().to_path_buf()))
        .build();
    let mut bench = Bench::new(config);
    assert!(bench.submit(0, &Request::read(0x1004, 4)).is_accepted());
    assert!(bench.submit(1, &Request::read(0x4010, 4)).is_accepted());
    assert!(bench.submit(0, &Request::read(0x3000, 4)).is_accepted());
    bench.run_cycles(8);
    assert_eq!(bench.target.addresses(), vec![0x8004, 0x10, 0x3000]);
}

#[test]
fn overlapping_ranges_fail_construction() {
    let file = script("0x0 0xfff 0x10000\n\n0x800 0x17ff 0x20000\n");
    let config = ArbiterBuilder::new()
        .with(|c| c.translation_file = Some(file.path().to_path_buf()))
        .build();
    assert!(matches!(
        Arbiter::new(config),
        Err(ConfigError::Translation { line: 3, .. })
    ));
}

#[test]
fn missing_translation_file_is_an_io_error() {
    let config = ArbiterBuilder::new()
        .with(|c| c.translation_file = Some("/nonexistent/busarb/map.txt".into()))
        .build();
    assert!(matches!(Arbiter::new(config), Err(ConfigError::Io { .. })));
}

#[test]
fn window_bounds_the_containing_range() {
    let translator = AddressTranslator::parse("0x1000 0x1fff 0x8000").unwrap();
    assert_eq!(translator.translate(0x1fff), 0x8fff);
    assert_eq!(translator.translate(0x2000), 0x2000);
    assert_eq!(translator.window(0x1800), (0x1000, 0x1fff, 0x8000));
    assert!(AddressTranslator::parse("0x10 0x0 0x0").is_err());
    assert!(AddressTranslator::parse("0x10 0x20").is_err());
}
