//! Per-process-lifetime session state.
//!
//! All moment-to-moment randomness is drawn exactly once, here. A new
//! process gets new draws; the identity seed (and everything derived only
//! from it) stays stable across restarts. The shim initializes one
//! `Session` behind an atomic once guard and never resets it.

use mirage_profile::DeviceProfile;
use tracing::debug;

use crate::seed::{mix, IdentitySeed, MULT_CALIB, MULT_MOUNT};

/// Upper bound on per-core state the generators carry.
pub const MAX_CORES: usize = 8;

/// Uptime base range, seconds. Reported uptime starts somewhere in
/// [900, 18000) so a fresh process never looks like a fresh boot.
const UPTIME_BASE_MIN: u64 = 900;
const UPTIME_BASE_SPAN: u64 = 17_100;

/// Mount-id bucket cutoffs against `(seed * 17) mod 100` and the value
/// ranges each bucket draws from.
const MOUNT_BUCKETS: &[(u32, u32, u32)] = &[(60, 24, 33), (90, 33, 61), (100, 61, 91)];

/// Session draws, initialized exactly once per process.
#[derive(Debug, Clone)]
pub struct Session {
    /// Wall clock at session start, unix seconds
    pub start_unix: u64,
    /// Synthetic uptime already elapsed at session start, seconds
    pub uptime_base: u64,
    /// Fixed fraction of reported uptime spent idle, in [0.30, 0.50)
    pub idle_ratio: f64,
    /// Thermal cold-start value, millidegrees C
    pub cold_mc: i64,
    /// Thermal session ceiling, millidegrees C
    pub ceil_mc: i64,
    /// Session baseline free memory, KiB
    pub mem_baseline_kib: u64,
    /// Per-core frequency calibration offsets, MHz
    pub calib_mhz: [i64; MAX_CORES],
    /// Synthetic parent process id
    pub ppid: u32,
    /// Bucketed mount identifier, stable per seed
    pub mount_id: u32,
}

impl Session {
    /// Perform all session draws. Pure in its inputs, so tests can pin
    /// `now_unix` and `pid` and get reproducible state.
    pub fn draw(seed: &IdentitySeed, profile: &DeviceProfile, now_unix: u64, pid: u32) -> Self {
        let s = seed.value();
        let salt = (now_unix as u32) ^ pid;

        let uptime_entropy =
            ((now_unix ^ pid as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)) ^ s as u64;
        let uptime_base = UPTIME_BASE_MIN + uptime_entropy % UPTIME_BASE_SPAN;
        let idle_ratio = 0.30 + ((s >> 8) % 20) as f64 / 100.0;

        let hw = &profile.hwmon;
        let cold_span = (hw.cold_max_mc - hw.cold_min_mc).max(1) as u32;
        let ceil_span = (hw.ceil_max_mc - hw.ceil_min_mc).max(1) as u32;
        let cold_mc = hw.cold_min_mc + (mix(s, salt ^ 1) % cold_span) as i64;
        let ceil_mc = hw.ceil_min_mc + (mix(s, salt ^ 2) % ceil_span) as i64;

        // Baseline free memory in [45%, 55%] of total
        let pct = 45 + (mix(s, salt ^ 3) % 11) as u64;
        let mem_baseline_kib = profile.memory.total_kib * pct / 100;

        let calib_bits = seed.derive(MULT_CALIB);
        let mut calib_mhz = [0i64; MAX_CORES];
        for (core, slot) in calib_mhz.iter_mut().enumerate() {
            *slot = ((calib_bits >> (core * 4)) & 0xF) as i64 - 8;
        }

        let ppid = 900 + mix(s, salt ^ 4) % 2000;
        let mount_id = draw_mount_id(seed);

        let session = Self {
            start_unix: now_unix,
            uptime_base,
            idle_ratio,
            cold_mc,
            ceil_mc,
            mem_baseline_kib,
            calib_mhz,
            ppid,
            mount_id,
        };
        debug!(
            uptime_base = session.uptime_base,
            cold_mc = session.cold_mc,
            ceil_mc = session.ceil_mc,
            mount_id = session.mount_id,
            "session state drawn"
        );
        session
    }
}

/// Two-stage bucketed draw: `(seed * 17) mod 100` picks a bucket against
/// fixed cutoffs, then the mount derivation picks a value inside that
/// bucket's range. Stable per seed, independent of the session.
fn draw_mount_id(seed: &IdentitySeed) -> u32 {
    let roll = seed.value().wrapping_mul(17) % 100;
    for &(cutoff, lo, hi) in MOUNT_BUCKETS {
        if roll < cutoff {
            return lo + seed.derive(MULT_MOUNT) % (hi - lo);
        }
    }
    // roll < 100 always hits the last bucket
    MOUNT_BUCKETS[MOUNT_BUCKETS.len() - 1].1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_at(now: u64, pid: u32) -> Session {
        let seed = IdentitySeed::from_identifier(b"deadbeefcafebabe");
        Session::draw(&seed, &DeviceProfile::default(), now, pid)
    }

    #[test]
    fn test_draws_are_reproducible() {
        let a = session_at(1_700_000_000, 4242);
        let b = session_at(1_700_000_000, 4242);
        assert_eq!(a.uptime_base, b.uptime_base);
        assert_eq!(a.cold_mc, b.cold_mc);
        assert_eq!(a.mem_baseline_kib, b.mem_baseline_kib);
        assert_eq!(a.calib_mhz, b.calib_mhz);
    }

    #[test]
    fn test_draws_stay_in_bounds() {
        for pid in [1u32, 77, 4242, 65_535] {
            let s = session_at(1_700_000_000 + pid as u64, pid);
            assert!(s.uptime_base >= UPTIME_BASE_MIN);
            assert!(s.uptime_base < UPTIME_BASE_MIN + UPTIME_BASE_SPAN);
            assert!((0.30..0.50).contains(&s.idle_ratio));
            let hw = HwmonBounds::default();
            assert!(s.cold_mc >= hw.cold_min && s.cold_mc < hw.cold_max);
            assert!(s.ceil_mc >= hw.ceil_min && s.ceil_mc < hw.ceil_max);
            assert!(s.ceil_mc > s.cold_mc);
            for offset in s.calib_mhz {
                assert!((-8..8).contains(&offset));
            }
            assert!((900..2900).contains(&s.ppid));
        }
    }

    struct HwmonBounds {
        cold_min: i64,
        cold_max: i64,
        ceil_min: i64,
        ceil_max: i64,
    }

    impl Default for HwmonBounds {
        fn default() -> Self {
            let hw = DeviceProfile::default().hwmon;
            Self {
                cold_min: hw.cold_min_mc,
                cold_max: hw.cold_max_mc,
                ceil_min: hw.ceil_min_mc,
                ceil_max: hw.ceil_max_mc,
            }
        }
    }

    #[test]
    fn test_mount_id_is_seed_bound() {
        let seed = IdentitySeed::from_identifier(b"0123456789abcdef");
        let profile = DeviceProfile::default();
        let a = Session::draw(&seed, &profile, 1_700_000_000, 10);
        let b = Session::draw(&seed, &profile, 1_800_000_123, 9999);
        assert_eq!(a.mount_id, b.mount_id);
        assert!((24..91).contains(&a.mount_id));
    }

    #[test]
    fn test_mount_id_respects_bucket() {
        for ident in [&b"aa"[..], b"bb", b"cc", b"dd", b"ee", b"ffff"] {
            let seed = IdentitySeed::from_identifier(ident);
            let roll = seed.value().wrapping_mul(17) % 100;
            let profile = DeviceProfile::default();
            let id = Session::draw(&seed, &profile, 1_700_000_000, 1).mount_id;
            let (lo, hi) = if roll < 60 {
                (24, 33)
            } else if roll < 90 {
                (33, 61)
            } else {
                (61, 91)
            };
            assert!((lo..hi).contains(&id), "roll {roll} gave id {id}");
        }
    }
}
