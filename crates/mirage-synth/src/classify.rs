//! Path classification.
//!
//! An ordered table of (matcher, class) pairs maps normalized paths onto
//! virtual entities. First match wins; the table is ordered so that no
//! path can satisfy two physically-inconsistent entries, and a test below
//! checks non-overlap against a sample corpus.

use mirage_profile::FilterRules;

use crate::path::{canonical_proc, normalize};

/// What a classified path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    /// Reported as nonexistent regardless of the real filesystem
    Blocked,
    /// Configuration-like entity (sysfs); metadata reports a small size
    Static(Entity),
    /// Process/kernel entity (procfs); metadata reports zero size
    Dynamic(Entity),
    /// Real content is opened, read, and line-filtered before serving
    LineFiltered(FilterKind),
    /// Not ours; the real call handles it
    Passthrough,
}

/// One virtual introspection target with a generator in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Cpuinfo,
    Meminfo,
    Stat,
    Uptime,
    Version,
    Cmdline,
    Cgroup,
    InputDevices,
    Dmi(DmiField),
    Battery(BatteryField),
    Ac(AcField),
    Backlight(BacklightField),
    Hwmon(HwmonField),
    MacAddress,
    /// `scaling_cur_freq` for one core
    ScalingCurFreq(u32),
    CpuinfoMinFreq,
    CpuinfoMaxFreq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmiField {
    ProductName,
    SysVendor,
    ProductVersion,
    BoardName,
    BoardVendor,
    BiosVendor,
    BiosVersion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryField {
    Status,
    Present,
    VoltageNow,
    CurrentNow,
    Capacity,
    CapacityLevel,
    ChargeFull,
    ChargeFullDesign,
    ChargeNow,
    Manufacturer,
    ModelName,
    Technology,
    Type,
    SerialNumber,
    CycleCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcField {
    Online,
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklightField {
    Brightness,
    MaxBrightness,
    ActualBrightness,
    Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwmonField {
    Name,
    Temp1Input,
    Temp1Label,
    Temp1Max,
    Temp1Crit,
}

/// Which line/record filter applies to a real-content path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Process-map content: drop lines containing map needles
    Maps,
    /// Mount-table content: drop lines containing mount needles
    Mounts,
    /// NUL-separated records: drop hidden variables
    Environ,
    /// `/proc/self/status`: rewrite namespace and parent id fields
    Status,
}

/// Path predicate over a normalized, proc-canonicalized path.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    Exact(&'static str),
    Suffix(&'static str),
    Contains(&'static str),
    /// Path contains `dir` and its final component equals `file`
    Within {
        dir: &'static str,
        file: &'static str,
    },
    /// Like `Within` for a set of directory aliases. Kernels name the same
    /// supply BAT0 or BAT1 and the same adapter AC or ACAD; all aliases
    /// resolve to one virtual device.
    WithinAny {
        dirs: &'static [&'static str],
        file: &'static str,
    },
}

impl Matcher {
    pub fn matches(&self, path: &str) -> bool {
        match *self {
            Matcher::Exact(p) => path == p,
            Matcher::Suffix(s) => path.ends_with(s),
            Matcher::Contains(s) => path.contains(s),
            Matcher::Within { dir, file } => {
                path.contains(dir) && path.rsplit('/').next() == Some(file)
            }
            Matcher::WithinAny { dirs, file } => {
                path.rsplit('/').next() == Some(file) && dirs.iter().any(|d| path.contains(d))
            }
        }
    }
}

const BATTERY_DIRS: &[&str] = &["/power_supply/BAT0/", "/power_supply/BAT1/"];
const AC_DIRS: &[&str] = &["/power_supply/AC/", "/power_supply/ACAD/"];

/// The virtual-entity catalogue, first match wins.
pub const TABLE: &[(Matcher, PathClass)] = &[
    // procfs: recomputed per open, zero-size metadata
    (Matcher::Exact("/proc/cpuinfo"), PathClass::Dynamic(Entity::Cpuinfo)),
    (Matcher::Exact("/proc/meminfo"), PathClass::Dynamic(Entity::Meminfo)),
    (Matcher::Exact("/proc/stat"), PathClass::Dynamic(Entity::Stat)),
    (Matcher::Exact("/proc/uptime"), PathClass::Dynamic(Entity::Uptime)),
    (Matcher::Exact("/proc/version"), PathClass::Dynamic(Entity::Version)),
    (Matcher::Exact("/proc/self/cmdline"), PathClass::Dynamic(Entity::Cmdline)),
    (Matcher::Exact("/proc/self/cgroup"), PathClass::Dynamic(Entity::Cgroup)),
    (
        Matcher::Exact("/proc/bus/input/devices"),
        PathClass::Dynamic(Entity::InputDevices),
    ),
    // real content, filtered
    (Matcher::Exact("/proc/self/maps"), PathClass::LineFiltered(FilterKind::Maps)),
    (Matcher::Exact("/proc/self/mounts"), PathClass::LineFiltered(FilterKind::Mounts)),
    (
        Matcher::Exact("/proc/self/mountinfo"),
        PathClass::LineFiltered(FilterKind::Mounts),
    ),
    (Matcher::Exact("/proc/mounts"), PathClass::LineFiltered(FilterKind::Mounts)),
    (Matcher::Exact("/etc/mtab"), PathClass::LineFiltered(FilterKind::Mounts)),
    (
        Matcher::Exact("/proc/self/environ"),
        PathClass::LineFiltered(FilterKind::Environ),
    ),
    (Matcher::Exact("/proc/self/status"), PathClass::LineFiltered(FilterKind::Status)),
    // DMI identity, served under both sysfs aliases
    (
        Matcher::Suffix("/dmi/id/product_name"),
        PathClass::Static(Entity::Dmi(DmiField::ProductName)),
    ),
    (
        Matcher::Suffix("/dmi/id/sys_vendor"),
        PathClass::Static(Entity::Dmi(DmiField::SysVendor)),
    ),
    (
        Matcher::Suffix("/dmi/id/product_version"),
        PathClass::Static(Entity::Dmi(DmiField::ProductVersion)),
    ),
    (
        Matcher::Suffix("/dmi/id/board_name"),
        PathClass::Static(Entity::Dmi(DmiField::BoardName)),
    ),
    (
        Matcher::Suffix("/dmi/id/board_vendor"),
        PathClass::Static(Entity::Dmi(DmiField::BoardVendor)),
    ),
    (
        Matcher::Suffix("/dmi/id/bios_vendor"),
        PathClass::Static(Entity::Dmi(DmiField::BiosVendor)),
    ),
    (
        Matcher::Suffix("/dmi/id/bios_version"),
        PathClass::Static(Entity::Dmi(DmiField::BiosVersion)),
    ),
    // battery pack, either kernel naming of the supply directory
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "status" },
        PathClass::Static(Entity::Battery(BatteryField::Status)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "present" },
        PathClass::Static(Entity::Battery(BatteryField::Present)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "voltage_now" },
        PathClass::Static(Entity::Battery(BatteryField::VoltageNow)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "current_now" },
        PathClass::Static(Entity::Battery(BatteryField::CurrentNow)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "capacity" },
        PathClass::Static(Entity::Battery(BatteryField::Capacity)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "capacity_level" },
        PathClass::Static(Entity::Battery(BatteryField::CapacityLevel)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "charge_full" },
        PathClass::Static(Entity::Battery(BatteryField::ChargeFull)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "charge_full_design" },
        PathClass::Static(Entity::Battery(BatteryField::ChargeFullDesign)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "charge_now" },
        PathClass::Static(Entity::Battery(BatteryField::ChargeNow)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "manufacturer" },
        PathClass::Static(Entity::Battery(BatteryField::Manufacturer)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "model_name" },
        PathClass::Static(Entity::Battery(BatteryField::ModelName)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "technology" },
        PathClass::Static(Entity::Battery(BatteryField::Technology)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "type" },
        PathClass::Static(Entity::Battery(BatteryField::Type)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "serial_number" },
        PathClass::Static(Entity::Battery(BatteryField::SerialNumber)),
    ),
    (
        Matcher::WithinAny { dirs: BATTERY_DIRS, file: "cycle_count" },
        PathClass::Static(Entity::Battery(BatteryField::CycleCount)),
    ),
    // AC adapter, either kernel naming
    (
        Matcher::WithinAny { dirs: AC_DIRS, file: "online" },
        PathClass::Static(Entity::Ac(AcField::Online)),
    ),
    (
        Matcher::WithinAny { dirs: AC_DIRS, file: "type" },
        PathClass::Static(Entity::Ac(AcField::Type)),
    ),
    // panel backlight, any device name
    (
        Matcher::Within { dir: "/class/backlight/", file: "brightness" },
        PathClass::Static(Entity::Backlight(BacklightField::Brightness)),
    ),
    (
        Matcher::Within { dir: "/class/backlight/", file: "max_brightness" },
        PathClass::Static(Entity::Backlight(BacklightField::MaxBrightness)),
    ),
    (
        Matcher::Within { dir: "/class/backlight/", file: "actual_brightness" },
        PathClass::Static(Entity::Backlight(BacklightField::ActualBrightness)),
    ),
    (
        Matcher::Within { dir: "/class/backlight/", file: "type" },
        PathClass::Static(Entity::Backlight(BacklightField::Type)),
    ),
    // thermal sensor, any hwmon index
    (
        Matcher::Within { dir: "/hwmon/", file: "name" },
        PathClass::Static(Entity::Hwmon(HwmonField::Name)),
    ),
    (
        Matcher::Within { dir: "/hwmon/", file: "temp1_input" },
        PathClass::Static(Entity::Hwmon(HwmonField::Temp1Input)),
    ),
    (
        Matcher::Within { dir: "/hwmon/", file: "temp1_label" },
        PathClass::Static(Entity::Hwmon(HwmonField::Temp1Label)),
    ),
    (
        Matcher::Within { dir: "/hwmon/", file: "temp1_max" },
        PathClass::Static(Entity::Hwmon(HwmonField::Temp1Max)),
    ),
    (
        Matcher::Within { dir: "/hwmon/", file: "temp1_crit" },
        PathClass::Static(Entity::Hwmon(HwmonField::Temp1Crit)),
    ),
    // network hardware address, any interface
    (
        Matcher::Within { dir: "/class/net/", file: "address" },
        PathClass::Static(Entity::MacAddress),
    ),
    // cpufreq limits (scaling_cur_freq is parametric, handled in classify)
    (
        Matcher::Within { dir: "/cpufreq/", file: "cpuinfo_min_freq" },
        PathClass::Static(Entity::CpuinfoMinFreq),
    ),
    (
        Matcher::Within { dir: "/cpufreq/", file: "cpuinfo_max_freq" },
        PathClass::Static(Entity::CpuinfoMaxFreq),
    ),
];

/// Classify a raw path. Normalizes, canonicalizes pid segments, applies the
/// blocked list from the rules, then walks the catalogue.
pub fn classify(rules: &FilterRules, raw_path: &str) -> PathClass {
    let normalized = normalize(raw_path);
    let canon = canonical_proc(&normalized);
    if rules.blocked_paths.iter().any(|b| b.as_str() == canon) {
        return PathClass::Blocked;
    }
    if let Some(core) = scaling_cur_freq_core(&canon) {
        return PathClass::Static(Entity::ScalingCurFreq(core));
    }
    for (matcher, class) in TABLE {
        if matcher.matches(&canon) {
            return *class;
        }
    }
    PathClass::Passthrough
}

/// `/sys/devices/system/cpu/cpu<N>/cpufreq/scaling_cur_freq` carries the
/// core index in its path; extract it.
fn scaling_cur_freq_core(path: &str) -> Option<u32> {
    if !path.ends_with("/cpufreq/scaling_cur_freq") {
        return None;
    }
    let core = path
        .split('/')
        .find_map(|seg| seg.strip_prefix("cpu").and_then(|n| n.parse::<u32>().ok()))
        .unwrap_or(0);
    Some(core)
}

/// Substitute target for a process self-link, if the path is one.
pub fn link_target<'a>(
    process: &'a mirage_profile::ProcessProfile,
    raw_path: &str,
) -> Option<&'a str> {
    let canon = canonical_proc(&normalize(raw_path));
    match canon.as_str() {
        "/proc/self/exe" => Some(&process.exe),
        "/proc/self/cwd" => Some(&process.cwd),
        "/proc/self/root" => Some(&process.root),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirage_profile::{FilterRules, ProcessProfile};

    fn rules() -> FilterRules {
        FilterRules::default()
    }

    #[test]
    fn test_blocked_paths() {
        assert_eq!(classify(&rules(), "/.dockerenv"), PathClass::Blocked);
        assert_eq!(classify(&rules(), "/run/../.dockerenv"), PathClass::Blocked);
        assert_eq!(classify(&rules(), "/run/.containerenv"), PathClass::Blocked);
    }

    #[test]
    fn test_proc_entities_are_dynamic() {
        assert_eq!(classify(&rules(), "/proc/cpuinfo"), PathClass::Dynamic(Entity::Cpuinfo));
        assert_eq!(classify(&rules(), "/proc/meminfo"), PathClass::Dynamic(Entity::Meminfo));
        assert_eq!(
            classify(&rules(), "/proc/1234/cmdline"),
            PathClass::Dynamic(Entity::Cmdline)
        );
    }

    #[test]
    fn test_sys_entities_are_static() {
        assert_eq!(
            classify(&rules(), "/sys/class/dmi/id/product_name"),
            PathClass::Static(Entity::Dmi(DmiField::ProductName))
        );
        assert_eq!(
            classify(&rules(), "/sys/devices/virtual/dmi/id/product_name"),
            PathClass::Static(Entity::Dmi(DmiField::ProductName))
        );
        assert_eq!(
            classify(&rules(), "/sys/class/power_supply/BAT1/serial_number"),
            PathClass::Static(Entity::Battery(BatteryField::SerialNumber))
        );
        assert_eq!(
            classify(&rules(), "/sys/class/hwmon/hwmon2/temp1_input"),
            PathClass::Static(Entity::Hwmon(HwmonField::Temp1Input))
        );
        assert_eq!(
            classify(&rules(), "/sys/class/net/wlan0/address"),
            PathClass::Static(Entity::MacAddress)
        );
    }

    #[test]
    fn test_scaling_cur_freq_core_index() {
        assert_eq!(
            classify(&rules(), "/sys/devices/system/cpu/cpu3/cpufreq/scaling_cur_freq"),
            PathClass::Static(Entity::ScalingCurFreq(3))
        );
        assert_eq!(
            classify(&rules(), "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_max_freq"),
            PathClass::Static(Entity::CpuinfoMaxFreq)
        );
    }

    #[test]
    fn test_filtered_paths() {
        assert_eq!(
            classify(&rules(), "/proc/self/maps"),
            PathClass::LineFiltered(FilterKind::Maps)
        );
        assert_eq!(
            classify(&rules(), "/proc/4242/maps"),
            PathClass::LineFiltered(FilterKind::Maps)
        );
        assert_eq!(
            classify(&rules(), "/proc/mounts"),
            PathClass::LineFiltered(FilterKind::Mounts)
        );
        assert_eq!(
            classify(&rules(), "/proc/self/status"),
            PathClass::LineFiltered(FilterKind::Status)
        );
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(classify(&rules(), "/etc/hostname"), PathClass::Passthrough);
        assert_eq!(classify(&rules(), "/proc/self/fd/0"), PathClass::Passthrough);
        assert_eq!(classify(&rules(), "/sys/class/net/wlan0/mtu"), PathClass::Passthrough);
    }

    #[test]
    fn test_table_has_no_overlap() {
        // Every catalogue path in this corpus must satisfy exactly one matcher
        let corpus = [
            "/proc/cpuinfo",
            "/proc/meminfo",
            "/proc/stat",
            "/proc/uptime",
            "/proc/version",
            "/proc/self/cmdline",
            "/proc/self/cgroup",
            "/proc/bus/input/devices",
            "/proc/self/maps",
            "/proc/self/mounts",
            "/proc/self/mountinfo",
            "/proc/mounts",
            "/etc/mtab",
            "/proc/self/environ",
            "/proc/self/status",
            "/sys/class/dmi/id/product_name",
            "/sys/class/power_supply/BAT1/status",
            "/sys/class/power_supply/BAT0/status",
            "/sys/class/power_supply/BAT1/charge_full",
            "/sys/class/power_supply/BAT1/charge_full_design",
            "/sys/class/power_supply/ACAD/online",
            "/sys/class/power_supply/AC/online",
            "/sys/class/power_supply/ACAD/type",
            "/sys/class/backlight/amdgpu_bl0/brightness",
            "/sys/class/backlight/amdgpu_bl0/max_brightness",
            "/sys/class/hwmon/hwmon2/temp1_input",
            "/sys/class/net/wlan0/address",
            "/sys/devices/system/cpu/cpu0/cpufreq/cpuinfo_min_freq",
        ];
        for path in corpus {
            let hits = TABLE.iter().filter(|(m, _)| m.matches(path)).count();
            assert_eq!(hits, 1, "{path} matched {hits} catalogue entries");
        }
    }

    #[test]
    fn test_charge_full_does_not_shadow_design() {
        // Final-component equality: charge_full must not swallow
        // charge_full_design
        assert_eq!(
            classify(&rules(), "/sys/class/power_supply/BAT1/charge_full_design"),
            PathClass::Static(Entity::Battery(BatteryField::ChargeFullDesign))
        );
    }

    #[test]
    fn test_supply_directory_aliases() {
        // BAT0 and BAT1 name the same virtual battery; AC and ACAD the
        // same adapter
        for supply in ["BAT0", "BAT1"] {
            assert_eq!(
                classify(&rules(), &format!("/sys/class/power_supply/{supply}/capacity")),
                PathClass::Static(Entity::Battery(BatteryField::Capacity))
            );
            assert_eq!(
                classify(&rules(), &format!("/sys/class/power_supply/{supply}/model_name")),
                PathClass::Static(Entity::Battery(BatteryField::ModelName))
            );
        }
        for adapter in ["AC", "ACAD"] {
            assert_eq!(
                classify(&rules(), &format!("/sys/class/power_supply/{adapter}/online")),
                PathClass::Static(Entity::Ac(AcField::Online))
            );
        }
        // Other supply names stay untouched
        assert_eq!(
            classify(&rules(), "/sys/class/power_supply/hidpp_battery_0/capacity"),
            PathClass::Passthrough
        );
    }

    #[test]
    fn test_link_targets() {
        let process = ProcessProfile::default();
        assert_eq!(link_target(&process, "/proc/self/exe"), Some(process.exe.as_str()));
        assert_eq!(link_target(&process, "/proc/999/cwd"), Some(process.cwd.as_str()));
        assert_eq!(link_target(&process, "/proc/self/root"), Some("/"));
        assert_eq!(link_target(&process, "/proc/self/fd/1"), None);
    }
}
