//! Client identity derivation
//!
//! The broker session is identified by `raspi-off-` followed by the hardware address
//! of the first interface that is up. Hosts without one get a random suffix so two
//! daemons never collide on the broker.

use rand::rngs::OsRng;
use rand::TryRngCore;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const IDENTITY_PREFIX: &str = "raspi-off-";
pub const UNKNOWN_IDENTITY: &str = "raspi-off-unknown";

/// IFF_UP from `<net/if.h>`
const IFF_UP: u32 = 0x1;

/// Identity resolution failures. These are logged and degrade; they never reach the caller.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to enumerate network interfaces: {0}")]
    InterfaceEnumeration(#[source] std::io::Error),
    #[error("Random source failed: {0}")]
    RandomSource(String),
}

/// A network interface as seen by the identity resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub index: u32,
    pub is_up: bool,
    pub hardware_addr: Vec<u8>,
}

impl NetworkInterface {
    /// Usable for identity: administratively up with a non-zero hardware address
    pub fn is_candidate(&self) -> bool {
        self.is_up && self.hardware_addr.iter().any(|&b| b != 0)
    }
}

/// Source of network interfaces, ordered by interface index
pub trait InterfaceSource {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, IdentityError>;
}

/// Source of random bytes for the fallback identity
pub trait RandomSource {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), IdentityError>;
}

/// Linux sysfs interface source (`/sys/class/net`)
#[derive(Debug, Clone)]
pub struct SysfsInterfaces {
    root: PathBuf,
}

impl SysfsInterfaces {
    pub fn new() -> Self {
        Self::with_root("/sys/class/net")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_interface(dir: &Path, name: String) -> Option<NetworkInterface> {
        let index = read_trimmed(&dir.join("ifindex"))?.parse().ok()?;
        let flags = read_trimmed(&dir.join("flags"))
            .and_then(|f| parse_hex_flags(&f))
            .unwrap_or(0);
        let hardware_addr = read_trimmed(&dir.join("address"))
            .map(|a| parse_hardware_addr(&a))
            .unwrap_or_default();

        Some(NetworkInterface {
            name,
            index,
            is_up: flags & IFF_UP != 0,
            hardware_addr,
        })
    }
}

impl Default for SysfsInterfaces {
    fn default() -> Self {
        Self::new()
    }
}

impl InterfaceSource for SysfsInterfaces {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>, IdentityError> {
        let entries = fs::read_dir(&self.root).map_err(IdentityError::InterfaceEnumeration)?;

        let mut interfaces: Vec<NetworkInterface> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                Self::read_interface(&entry.path(), name)
            })
            .collect();
        interfaces.sort_by_key(|i| i.index);
        Ok(interfaces)
    }
}

/// Operating system random source
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), IdentityError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| IdentityError::RandomSource(e.to_string()))
    }
}

/// Resolve the client identity from the live system
pub fn resolve_identity() -> String {
    IdentityResolver::new(SysfsInterfaces::new(), OsRandom).resolve()
}

/// Derives the client identity from injected interface and random sources
pub struct IdentityResolver<I, R> {
    interfaces: I,
    random: R,
}

impl<I: InterfaceSource, R: RandomSource> IdentityResolver<I, R> {
    pub fn new(interfaces: I, random: R) -> Self {
        Self { interfaces, random }
    }

    pub fn resolve(&mut self) -> String {
        if let Some(mac) = self.first_hardware_addr() {
            return format_identity(&mac);
        }

        let mut bytes = [0u8; 6];
        match self.random.fill(&mut bytes) {
            Ok(()) => {
                debug!("No usable hardware address, using random client identity");
                format_identity(&bytes)
            }
            Err(e) => {
                warn!("Error reading random bytes: {}", e);
                UNKNOWN_IDENTITY.to_string()
            }
        }
    }

    fn first_hardware_addr(&self) -> Option<Vec<u8>> {
        match self.interfaces.interfaces() {
            Ok(interfaces) => interfaces
                .into_iter()
                .find(NetworkInterface::is_candidate)
                .map(|i| {
                    debug!(interface = %i.name, "Using hardware address for client identity");
                    i.hardware_addr
                }),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }
}

/// `raspi-off-` followed by the bytes as lowercase hex without separators
pub fn format_identity(bytes: &[u8]) -> String {
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("{IDENTITY_PREFIX}{hex}")
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn parse_hex_flags(flags: &str) -> Option<u32> {
    u32::from_str_radix(flags.trim_start_matches("0x"), 16).ok()
}

/// Parse `aa:bb:cc:dd:ee:ff`. Anything malformed is treated as no address.
fn parse_hardware_addr(addr: &str) -> Vec<u8> {
    if addr.is_empty() {
        return Vec::new();
    }
    addr.split(':')
        .map(|octet| u8::from_str_radix(octet, 16))
        .collect::<Result<Vec<u8>, _>>()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_iface(root: &Path, name: &str, index: u32, flags: &str, address: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("ifindex"), format!("{index}\n")).unwrap();
        fs::write(dir.join("flags"), format!("{flags}\n")).unwrap();
        fs::write(dir.join("address"), format!("{address}\n")).unwrap();
    }

    #[test]
    fn test_format_identity() {
        assert_eq!(
            format_identity(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
            "raspi-off-aabbccddeeff"
        );
        assert_eq!(format_identity(&[0, 1, 2, 0x0f]), "raspi-off-0001020f");
    }

    #[test]
    fn test_parse_hardware_addr() {
        assert_eq!(
            parse_hardware_addr("dc:a6:32:01:02:03"),
            vec![0xdc, 0xa6, 0x32, 0x01, 0x02, 0x03]
        );
        assert!(parse_hardware_addr("").is_empty());
        assert!(parse_hardware_addr("zz:00").is_empty());
    }

    #[test]
    fn test_parse_hex_flags() {
        assert_eq!(parse_hex_flags("0x1003"), Some(0x1003));
        assert_eq!(parse_hex_flags("0x1002"), Some(0x1002));
        assert_eq!(parse_hex_flags("garbage"), None);
    }

    #[test]
    fn test_loopback_is_not_a_candidate() {
        let lo = NetworkInterface {
            name: "lo".to_string(),
            index: 1,
            is_up: true,
            hardware_addr: vec![0; 6],
        };
        assert!(!lo.is_candidate());
    }

    #[test]
    fn test_sysfs_interfaces_sorted_by_index() {
        let root = TempDir::new().unwrap();
        write_iface(root.path(), "wlan0", 3, "0x1003", "aa:bb:cc:dd:ee:ff");
        write_iface(root.path(), "lo", 1, "0x9", "00:00:00:00:00:00");
        write_iface(root.path(), "eth0", 2, "0x1002", "11:22:33:44:55:66");

        let interfaces = SysfsInterfaces::with_root(root.path()).interfaces().unwrap();
        let names: Vec<_> = interfaces.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["lo", "eth0", "wlan0"]);
        assert!(interfaces[0].is_up);
        assert!(!interfaces[1].is_up);
        assert!(interfaces[2].is_up);
    }

    #[test]
    fn test_sysfs_resolution_skips_down_and_loopback() {
        let root = TempDir::new().unwrap();
        write_iface(root.path(), "lo", 1, "0x9", "00:00:00:00:00:00");
        write_iface(root.path(), "eth0", 2, "0x1002", "11:22:33:44:55:66");
        write_iface(root.path(), "wlan0", 3, "0x1003", "aa:bb:cc:dd:ee:ff");

        let mut resolver =
            IdentityResolver::new(SysfsInterfaces::with_root(root.path()), OsRandom);
        assert_eq!(resolver.resolve(), "raspi-off-aabbccddeeff");
    }

    #[test]
    fn test_missing_sysfs_falls_back_to_random() {
        let root = TempDir::new().unwrap();
        let mut resolver =
            IdentityResolver::new(SysfsInterfaces::with_root(root.path().join("nope")), OsRandom);
        let id = resolver.resolve();
        assert!(id.starts_with(IDENTITY_PREFIX));
        assert_eq!(id.len(), IDENTITY_PREFIX.len() + 12);
    }

    #[test]
    fn test_os_random_fills_buffer() {
        let mut buf = [0u8; 32];
        OsRandom.fill(&mut buf).unwrap();
        assert!(buf.iter().any(|&b| b != 0));
    }
}
