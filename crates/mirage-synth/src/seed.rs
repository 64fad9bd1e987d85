//! Identity seed derivation.
//!
//! One stable external identifier (first line of `/etc/machine-id` by
//! default) is reduced to a 32-bit seed with a polynomial rolling hash.
//! Independent sub-derivations re-hash the identifier bytes with distinct
//! multipliers so that MAC address, serial numbers, version selection and
//! mount-id distribution do not correlate trivially.

use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Primary seed multiplier
pub const MULT_PRIMARY: u32 = 31;
/// Hardware (MAC) address derivation
pub const MULT_MAC: u32 = 37;
/// Battery serial number derivation
pub const MULT_SERIAL: u32 = 7;
/// Kernel version pool selection
pub const MULT_VERSION: u32 = 13;
/// Mount-id bucket distribution
pub const MULT_MOUNT: u32 = 17;
/// Per-core calibration offsets
pub const MULT_CALIB: u32 = 19;
/// Battery cycle count
pub const MULT_CYCLES: u32 = 23;

/// The deterministic numeric root of the synthesized identity.
///
/// Computed at most once per process and immutable thereafter; the shim
/// keeps it inside its interposition context.
#[derive(Debug, Clone)]
pub struct IdentitySeed {
    /// Raw identifier bytes; empty when the fallback path was taken
    ident: Vec<u8>,
    primary: u32,
}

impl IdentitySeed {
    /// Read the identifier file and derive the primary seed.
    ///
    /// An unreadable or empty identifier degrades to a pid/time fallback
    /// rather than failing: determinism across restarts is lost, but the
    /// caller always gets a usable seed.
    pub fn load(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let line = contents.lines().next().unwrap_or("").trim();
                if line.is_empty() {
                    Self::fallback()
                } else {
                    Self::from_identifier(line.as_bytes())
                }
            }
            Err(err) => {
                debug!(path = %path, error = %err, "identifier unreadable, using fallback seed");
                Self::fallback()
            }
        }
    }

    /// Derive directly from identifier bytes (tests, alternate sources).
    pub fn from_identifier(ident: &[u8]) -> Self {
        let primary = poly_hash(ident, MULT_PRIMARY);
        Self {
            ident: ident.to_vec(),
            primary,
        }
    }

    /// Pid/time fallback seed; `derive` then mixes arithmetically.
    pub fn fallback() -> Self {
        let pid = std::process::id();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            ident: Vec::new(),
            primary: pid ^ (now as u32),
        }
    }

    /// The primary 32-bit seed.
    pub fn value(&self) -> u32 {
        self.primary
    }

    /// Independent sub-derivation for the given multiplier.
    ///
    /// Pure function of the cached identifier and the multiplier:
    /// repeated calls return identical values regardless of call order.
    pub fn derive(&self, multiplier: u32) -> u32 {
        if self.ident.is_empty() {
            mix(self.primary, multiplier)
        } else {
            poly_hash(&self.ident, multiplier)
        }
    }
}

/// Polynomial rolling hash over identifier bytes, stopping at a newline.
fn poly_hash(bytes: &[u8], multiplier: u32) -> u32 {
    let mut hash: u32 = 0;
    for &b in bytes {
        if b == b'\n' {
            break;
        }
        hash = hash.wrapping_mul(multiplier).wrapping_add(b as u32);
    }
    hash
}

/// Arithmetic mixer for the identifier-less fallback.
pub(crate) fn mix(seed: u32, salt: u32) -> u32 {
    let mut x = seed ^ salt.wrapping_mul(0x9e37_79b9);
    x ^= x >> 16;
    x = x.wrapping_mul(0x85eb_ca6b);
    x ^= x >> 13;
    x = x.wrapping_mul(0xc2b2_ae35);
    x ^ (x >> 16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_poly_hash_matches_manual() {
        // h = ((0*31 + 'a')*31 + 'b')
        assert_eq!(poly_hash(b"ab", 31), (b'a' as u32) * 31 + b'b' as u32);
    }

    #[test]
    fn test_hash_stops_at_newline() {
        assert_eq!(poly_hash(b"abc\ndef", 31), poly_hash(b"abc", 31));
    }

    #[test]
    fn test_derive_is_order_independent() {
        let seed = IdentitySeed::from_identifier(b"c0ffee00decade00");
        let a1 = seed.derive(MULT_MAC);
        let b1 = seed.derive(MULT_SERIAL);
        let a2 = seed.derive(MULT_MAC);
        assert_eq!(a1, a2);
        assert_ne!(a1, b1);
    }

    #[test]
    fn test_multipliers_decorrelate() {
        let seed = IdentitySeed::from_identifier(b"0123456789abcdef");
        let values: Vec<u32> = [MULT_MAC, MULT_SERIAL, MULT_VERSION, MULT_MOUNT, MULT_CALIB]
            .iter()
            .map(|&m| seed.derive(m))
            .collect();
        for i in 0..values.len() {
            for j in i + 1..values.len() {
                assert_ne!(values[i], values[j]);
            }
        }
    }

    #[test]
    fn test_load_reads_first_line() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "deadbeefcafebabe").unwrap();
        writeln!(f, "second line ignored").unwrap();
        let seed = IdentitySeed::load(f.path().to_str().unwrap());
        let direct = IdentitySeed::from_identifier(b"deadbeefcafebabe");
        assert_eq!(seed.value(), direct.value());
        assert_eq!(seed.derive(MULT_MAC), direct.derive(MULT_MAC));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let seed = IdentitySeed::load("/nonexistent/mirage-test-machine-id");
        // Fallback still yields working derivations
        let _ = seed.derive(MULT_MAC);
        assert_ne!(seed.derive(MULT_MAC), seed.derive(MULT_SERIAL));
    }
}
