//! Client identity resolution tests

use raspi_off::identity::{
    IdentityResolver, SysfsInterfaces, IDENTITY_PREFIX, UNKNOWN_IDENTITY,
};
use raspi_off::testing::{FixedRandom, StaticInterfaces};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_interface(root: &Path, name: &str, index: u32, flags: &str, address: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("ifindex"), format!("{index}\n")).unwrap();
    fs::write(dir.join("flags"), format!("{flags}\n")).unwrap();
    fs::write(dir.join("address"), format!("{address}\n")).unwrap();
}

#[test]
fn test_first_up_interface_hardware_address() {
    let interfaces = StaticInterfaces::new(vec![
        StaticInterfaces::interface("lo", 1, true, &[0, 0, 0, 0, 0, 0]),
        StaticInterfaces::interface("eth0", 2, false, &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]),
        StaticInterfaces::interface("wlan0", 3, true, &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
    ]);

    let identity = IdentityResolver::new(interfaces, FixedRandom::new(&[9])).resolve();
    assert_eq!(identity, "raspi-off-aabbccddeeff");
}

#[test]
fn test_random_identity_without_up_interfaces() {
    let interfaces = StaticInterfaces::new(vec![StaticInterfaces::interface(
        "eth0",
        2,
        false,
        &[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
    )]);
    let random = FixedRandom::new(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

    let identity = IdentityResolver::new(interfaces, random).resolve();
    assert_eq!(identity, "raspi-off-010203040506");
}

#[test]
fn test_unknown_identity_when_randomness_fails() {
    let identity =
        IdentityResolver::new(StaticInterfaces::new(vec![]), FixedRandom::failing()).resolve();
    assert_eq!(identity, UNKNOWN_IDENTITY);
}

#[test]
fn test_enumeration_failure_falls_back_to_random() {
    let random = FixedRandom::new(&[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
    let identity = IdentityResolver::new(StaticInterfaces::failing(), random).resolve();
    assert_eq!(identity, "raspi-off-deadbeef0001");
}

#[test]
fn test_sysfs_interfaces_ordered_by_index() {
    let root = TempDir::new().unwrap();
    write_interface(root.path(), "wlan0", 3, "0x1003", "b8:27:eb:00:00:03");
    write_interface(root.path(), "lo", 1, "0x9", "00:00:00:00:00:00");
    write_interface(root.path(), "eth0", 2, "0x1003", "b8:27:eb:00:00:02");

    let identity =
        IdentityResolver::new(SysfsInterfaces::with_root(root.path()), FixedRandom::failing())
            .resolve();
    assert_eq!(identity, "raspi-off-b827eb000002");
}

#[test]
fn test_sysfs_missing_root_falls_back() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("does-not-exist");

    let identity = IdentityResolver::new(
        SysfsInterfaces::with_root(missing),
        FixedRandom::new(&[0xff]),
    )
    .resolve();
    assert_eq!(identity, "raspi-off-ffffffffffff");
}

#[test]
fn test_live_identity_is_prefixed() {
    let identity = raspi_off::resolve_identity();
    assert!(identity.starts_with(IDENTITY_PREFIX));
    assert!(identity.len() > IDENTITY_PREFIX.len());
}
