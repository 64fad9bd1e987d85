//! End-to-end checks across the classifier, engine, and filters: the
//! scenarios a caller-facing hook would exercise, minus the FFI layer.

use mirage_profile::{DeviceProfile, FilterRules};
use mirage_synth::{
    classify::{classify, BatteryField, Entity},
    filter, IdentitySeed, PathClass, PayloadTable, Session, SynthContext,
};

fn context_for(ident: &[u8], now: u64, pid: u32) -> SynthContext {
    mirage_profile::logging::init_logging(mirage_profile::logging::LogLevel::Warn);
    let profile = DeviceProfile::default();
    let seed = IdentitySeed::from_identifier(ident);
    let session = Session::draw(&seed, &profile, now, pid);
    SynthContext::new(profile, seed, session)
}

#[test]
fn blocked_path_reports_not_found_shape() {
    let rules = FilterRules::default();
    // The container marker must classify as blocked even through a
    // non-normalized spelling
    assert_eq!(classify(&rules, "/.dockerenv"), PathClass::Blocked);
    assert_eq!(classify(&rules, "//.dockerenv"), PathClass::Blocked);
    assert_eq!(classify(&rules, "/tmp/../.dockerenv"), PathClass::Blocked);
}

#[test]
fn serial_is_seed_bound_not_process_bound() {
    // Two different processes at different times, same machine identifier
    let a = context_for(b"machine-ident-alpha", 1_700_000_000, 101);
    let b = context_for(b"machine-ident-alpha", 1_765_432_100, 40_404);
    let entity = Entity::Battery(BatteryField::SerialNumber);
    assert_eq!(a.generate(entity, 0), b.generate(entity, 500));

    // A different identifier yields a different identity
    let c = context_for(b"machine-ident-beta", 1_700_000_000, 101);
    assert_ne!(a.generate(entity, 0), c.generate(entity, 0));
    assert_ne!(a.mac_string(), c.mac_string());
}

#[test]
fn open_flow_for_virtual_battery_path() {
    let ctx = context_for(b"machine-ident-alpha", 1_700_000_000, 7);
    let class = classify(&ctx.profile.rules, "/sys/class/power_supply/BAT1/serial_number");
    let PathClass::Static(entity) = class else {
        panic!("expected a static classification, got {class:?}");
    };
    let payload = ctx.generate(entity, 0);
    assert_eq!(payload.len(), 9);
    assert!(payload.ends_with(b"\n"));
}

#[test]
fn descriptor_lifecycle_over_generated_payload() {
    // The flow a raw-fd open would take: classify, generate once, track,
    // then serve short reads until end of payload
    let ctx = context_for(b"machine-ident-alpha", 1_700_000_000, 7);
    let class = classify(&ctx.profile.rules, "/proc/meminfo");
    let PathClass::Dynamic(entity) = class else {
        panic!("meminfo must be dynamic, got {class:?}");
    };
    let payload = ctx.generate(entity, 60);
    let expected = payload.clone();

    let mut table: PayloadTable<i32> = PayloadTable::bounded(4);
    assert!(table.insert(5, payload));

    let mut served = Vec::new();
    let mut chunk = [0u8; 100];
    loop {
        let n = table.read(&5, &mut chunk).unwrap();
        if n == 0 {
            break;
        }
        served.extend_from_slice(&chunk[..n]);
    }
    assert_eq!(served, expected);
    assert!(table.release(&5));
    assert!(!table.release(&5));
}

#[test]
fn maps_filtering_is_byte_exact() {
    let rules = FilterRules::default();
    let real = concat!(
        "55d0a000-55d0b000 r-xp 00000000 08:01 131 /usr/bin/java\n",
        "7f1a2000-7f1a3000 r-xp 00000000 08:01 132 /usr/lib/libmirage_shim.so\n",
        "7f1a4000-7f1a5000 rw-p 00000000 00:00 0\n",
        "7ffd1000-7ffd2000 r--p 00000000 00:00 0 [vvar]\n",
    )
    .as_bytes();
    let class = classify(&rules, "/proc/self/maps");
    let PathClass::LineFiltered(kind) = class else {
        panic!("maps must be line-filtered");
    };
    let filtered = filter::apply(kind, &rules, real, 7, 1234);
    let expected = concat!(
        "55d0a000-55d0b000 r-xp 00000000 08:01 131 /usr/bin/java\n",
        "7f1a4000-7f1a5000 rw-p 00000000 00:00 0\n",
        "7ffd1000-7ffd2000 r--p 00000000 00:00 0 [vvar]\n",
    )
    .as_bytes();
    assert_eq!(filtered, expected);
}

#[test]
fn status_flow_rewrites_only_identity_fields() {
    let rules = FilterRules::default();
    let real = concat!(
        "Name:\tjava\n",
        "Umask:\t0022\n",
        "State:\tS (sleeping)\n",
        "Pid:\t7\n",
        "PPid:\t1\n",
        "NSpid:\t7\t19\n",
        "VmPeak:\t  123456 kB\n",
    )
    .as_bytes();
    let class = classify(&rules, "/proc/7/status");
    let PathClass::LineFiltered(kind) = class else {
        panic!("status must be line-filtered");
    };
    let out = filter::apply(kind, &rules, real, 7, 1555);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("PPid:\t1555\n"));
    assert!(text.contains("NSpid:\t7\n"));
    // Non-identity lines are untouched
    assert!(text.contains("Umask:\t0022\n"));
    assert!(text.contains("VmPeak:\t  123456 kB\n"));
}

#[test]
fn time_varying_entities_are_deterministic_given_fixed_clock() {
    let a = context_for(b"machine-ident-alpha", 1_700_000_000, 7);
    let b = context_for(b"machine-ident-alpha", 1_700_000_000, 7);
    // Same session draws, same elapsed, identical non-jittered outputs
    assert_eq!(a.temp_mc(300), b.temp_mc(300));
    assert_eq!(a.uptime_pair(300), b.uptime_pair(300));
    let (agg_a, _) = a.stat_rows(300);
    let (agg_b, _) = b.stat_rows(300);
    assert_eq!(agg_a.idle, agg_b.idle);
}

#[test]
fn consistency_between_entities_within_one_identity() {
    let ctx = context_for(b"machine-ident-alpha", 1_700_000_000, 7);
    // The version string and the uname substitution must come from the
    // same pool pick
    let version = String::from_utf8(ctx.generate(Entity::Version, 0)).unwrap();
    assert!(version.contains(ctx.kernel_version().release.as_str()));
    // The MAC served through sysfs equals the ioctl bytes
    let sysfs = String::from_utf8(ctx.generate(Entity::MacAddress, 0)).unwrap();
    assert_eq!(sysfs.trim_end(), ctx.mac_string());
}
