//! # mirage-profile
//!
//! Device identity profile for Mirage.
//!
//! A profile is the full catalogue of spoofed values the interposition layer
//! presents: DMI identity, CPU model, memory geometry, power supply, thermal
//! sensor, network OUI pool, process self-description, and the filter rule
//! sets. The profile is configuration data only; all behavior lives in
//! `mirage-synth` and `mirage-shim`.
//!
//! Loads configuration from:
//! 1. Built-in defaults (a Valve Steam Deck identity)
//! 2. The TOML file named by `MIRAGE_PROFILE` (overrides defaults)

pub mod logging;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::debug;

/// Global profile instance
static PROFILE: Lazy<RwLock<DeviceProfile>> =
    Lazy::new(|| RwLock::new(DeviceProfile::load().unwrap_or_default()));

/// Get global profile (read-only)
pub fn profile() -> std::sync::RwLockReadGuard<'static, DeviceProfile> {
    PROFILE.read().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Full device identity profile
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceProfile {
    /// File whose first line seeds all identity derivations
    pub machine_id_path: String,
    pub dmi: DmiProfile,
    pub cpu: CpuProfile,
    pub memory: MemoryProfile,
    pub battery: BatteryProfile,
    pub ac: AcProfile,
    pub backlight: BacklightProfile,
    pub hwmon: HwmonProfile,
    pub net: NetProfile,
    pub kernel: KernelProfile,
    pub process: ProcessProfile,
    pub input_devices: String,
    pub cgroup: String,
    pub rules: FilterRules,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            machine_id_path: "/etc/machine-id".to_string(),
            dmi: DmiProfile::default(),
            cpu: CpuProfile::default(),
            memory: MemoryProfile::default(),
            battery: BatteryProfile::default(),
            ac: AcProfile::default(),
            backlight: BacklightProfile::default(),
            hwmon: HwmonProfile::default(),
            net: NetProfile::default(),
            kernel: KernelProfile::default(),
            process: ProcessProfile::default(),
            input_devices: default_input_devices(),
            cgroup: "0::/\n".to_string(),
            rules: FilterRules::default(),
        }
    }
}

impl DeviceProfile {
    /// Load the profile: defaults, then the `MIRAGE_PROFILE` TOML file if set.
    pub fn load() -> Result<Self, ProfileError> {
        let mut profile = DeviceProfile::default();
        if let Ok(path) = std::env::var("MIRAGE_PROFILE") {
            debug!(path = %path, "Loading device profile");
            let contents = std::fs::read_to_string(&path)?;
            profile = toml::from_str(&contents)?;
        }
        Ok(profile)
    }

    /// Generate default profile TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&DeviceProfile::default()).unwrap_or_default()
    }
}

/// SMBIOS/DMI identity, served under `/sys/class/dmi/id` and
/// `/sys/devices/virtual/dmi/id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmiProfile {
    pub product_name: String,
    pub sys_vendor: String,
    pub product_version: String,
    pub board_name: String,
    pub board_vendor: String,
    pub bios_vendor: String,
    pub bios_version: String,
}

impl Default for DmiProfile {
    fn default() -> Self {
        Self {
            product_name: "Jupiter".to_string(),
            sys_vendor: "Valve".to_string(),
            product_version: "1".to_string(),
            board_name: "Jupiter".to_string(),
            board_vendor: "Valve".to_string(),
            bios_vendor: "Valve".to_string(),
            bios_version: "F7A0131".to_string(),
        }
    }
}

/// CPU identity for `/proc/cpuinfo` and the frequency model.
///
/// Frequencies are in MHz. `nominal_mhz` is the center of the base-clock
/// distribution; `min_mhz`/`max_mhz` clamp it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuProfile {
    pub vendor_id: String,
    pub family: u32,
    pub model: u32,
    pub model_name: String,
    pub stepping: u32,
    pub microcode: String,
    pub cache_size_kb: u32,
    pub cores: u32,
    pub siblings: u32,
    pub cpuid_level: u32,
    pub bogomips: f64,
    pub tlb_size: String,
    pub clflush_size: u32,
    pub cache_alignment: u32,
    pub address_sizes: String,
    pub power_management: String,
    pub flags: String,
    pub bugs: String,
    pub nominal_mhz: f64,
    pub min_mhz: f64,
    pub max_mhz: f64,
    pub sigma_mhz: f64,
}

impl Default for CpuProfile {
    fn default() -> Self {
        Self {
            vendor_id: "AuthenticAMD".to_string(),
            family: 23,
            model: 144,
            model_name: "AMD Custom APU 0405".to_string(),
            stepping: 1,
            microcode: "0xa404101".to_string(),
            cache_size_kb: 1024,
            cores: 4,
            siblings: 8,
            cpuid_level: 16,
            bogomips: 5600.00,
            tlb_size: "2560 4K pages".to_string(),
            clflush_size: 64,
            cache_alignment: 64,
            address_sizes: "48 bits physical, 48 bits virtual".to_string(),
            power_management: "ts ttp tm hwpstate cpb eff_freq_ro [13] [14]".to_string(),
            flags: default_cpu_flags(),
            bugs: "sysret_ss_attrs spectre_v1 spectre_v2 spec_store_bypass".to_string(),
            nominal_mhz: 2800.0,
            min_mhz: 2400.0,
            max_mhz: 3500.0,
            sigma_mhz: 120.0,
        }
    }
}

/// Memory geometry for `/proc/meminfo`, in KiB
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryProfile {
    pub total_kib: u64,
    pub swap_total_kib: u64,
}

impl Default for MemoryProfile {
    fn default() -> Self {
        Self {
            total_kib: 16_252_928,
            swap_total_kib: 8_126_464,
        }
    }
}

/// Battery served under `/sys/class/power_supply/<BAT>/`.
/// The default models a docked, fully charged pack so the level never has
/// to drain. `serial_number` and `cycle_count` are seed-derived, not listed
/// here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryProfile {
    pub status: String,
    pub present: String,
    pub voltage_now: String,
    pub current_now: String,
    pub capacity: String,
    pub capacity_level: String,
    pub charge_full: String,
    pub charge_full_design: String,
    pub charge_now: String,
    pub manufacturer: String,
    pub model_name: String,
    pub technology: String,
    pub kind: String,
}

impl Default for BatteryProfile {
    fn default() -> Self {
        Self {
            status: "Full\n".to_string(),
            present: "1\n".to_string(),
            voltage_now: "8400000\n".to_string(),
            current_now: "0\n".to_string(),
            capacity: "100\n".to_string(),
            capacity_level: "Full\n".to_string(),
            charge_full: "40690000\n".to_string(),
            charge_full_design: "40040000\n".to_string(),
            charge_now: "40690000\n".to_string(),
            manufacturer: "Valve\n".to_string(),
            model_name: "Jupiter\n".to_string(),
            technology: "Li-poly\n".to_string(),
            kind: "Battery\n".to_string(),
        }
    }
}

/// AC adapter served under `/sys/class/power_supply/<AC>/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcProfile {
    pub online: String,
    pub kind: String,
}

impl Default for AcProfile {
    fn default() -> Self {
        Self {
            online: "1\n".to_string(),
            kind: "Mains\n".to_string(),
        }
    }
}

/// Panel backlight served under `/sys/class/backlight/*/`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacklightProfile {
    pub brightness: String,
    pub max_brightness: String,
    pub actual_brightness: String,
    pub kind: String,
}

impl Default for BacklightProfile {
    fn default() -> Self {
        Self {
            brightness: "80\n".to_string(),
            max_brightness: "100\n".to_string(),
            actual_brightness: "80\n".to_string(),
            kind: "raw\n".to_string(),
        }
    }
}

/// Thermal sensor identity and curve bounds, in millidegrees C
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HwmonProfile {
    pub name: String,
    pub temp1_label: String,
    pub temp1_max_mc: i64,
    pub temp1_crit_mc: i64,
    /// Cold-start temperature band the seed draws from
    pub cold_min_mc: i64,
    pub cold_max_mc: i64,
    /// Session-ceiling band the seed draws from
    pub ceil_min_mc: i64,
    pub ceil_max_mc: i64,
    /// Warm-up duration from cold start to ceiling
    pub warmup_secs: u64,
    /// Post-warm-up fluctuation band (plus/minus)
    pub band_mc: i64,
}

impl Default for HwmonProfile {
    fn default() -> Self {
        Self {
            name: "k10temp\n".to_string(),
            temp1_label: "Tctl\n".to_string(),
            temp1_max_mc: 105_000,
            temp1_crit_mc: 110_000,
            cold_min_mc: 44_000,
            cold_max_mc: 50_000,
            ceil_min_mc: 58_000,
            ceil_max_mc: 66_000,
            warmup_secs: 600,
            band_mc: 1_500,
        }
    }
}

/// Network identity: the OUI pool the seed selects a MAC prefix from.
/// Defaults are Realtek OUIs commonly found in handhelds and laptops.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetProfile {
    pub oui_pool: Vec<String>,
}

impl Default for NetProfile {
    fn default() -> Self {
        Self {
            oui_pool: vec![
                "48:e7:da".to_string(),
                "2c:f0:5d".to_string(),
                "00:e0:4c".to_string(),
                "74:d8:3e".to_string(),
                "18:c0:4d".to_string(),
            ],
        }
    }
}

/// One kernel build identity: feeds `/proc/version` and `uname`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelVersion {
    pub release: String,
    pub version: String,
    pub nodename: String,
}

/// Pool of kernel identities; the seed picks one for the process lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelProfile {
    pub pool: Vec<KernelVersion>,
    pub compiler: String,
    /// `user@host` shown in the `/proc/version` build string
    pub builder: String,
}

impl Default for KernelProfile {
    fn default() -> Self {
        Self {
            pool: vec![
                KernelVersion {
                    release: "6.1.52-valve16-1-neptune-61".to_string(),
                    version: "#1 SMP PREEMPT_DYNAMIC Wed Dec 18 04:20:00 UTC 2024".to_string(),
                    nodename: "steamdeck".to_string(),
                },
                KernelVersion {
                    release: "6.1.52-valve14-1-neptune-61".to_string(),
                    version: "#1 SMP PREEMPT_DYNAMIC Tue Oct 15 21:27:09 UTC 2024".to_string(),
                    nodename: "steamdeck".to_string(),
                },
                KernelVersion {
                    release: "6.1.52-valve9-3-neptune-61".to_string(),
                    version: "#1 SMP PREEMPT_DYNAMIC Thu Apr 18 01:25:47 UTC 2024".to_string(),
                    nodename: "steamdeck".to_string(),
                },
            ],
            compiler: "(gcc (GCC) 12.2.0, GNU ld (GNU Binutils) 2.39)".to_string(),
            builder: "deck@jupiter".to_string(),
        }
    }
}

/// Process self-description: cmdline argv, and targets for the
/// `/proc/self/{exe,cwd,root}` links
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessProfile {
    pub cmdline: Vec<String>,
    pub exe: String,
    pub cwd: String,
    pub root: String,
}

impl Default for ProcessProfile {
    fn default() -> Self {
        Self {
            cmdline: vec![
                "/usr/bin/gamescope".to_string(),
                "--steam".to_string(),
                "--".to_string(),
                "/usr/lib/jvm/java-17-openjdk/bin/java".to_string(),
                "-jar".to_string(),
                "RuneLite.jar".to_string(),
            ],
            exe: "/usr/lib/jvm/java-17-openjdk/bin/java".to_string(),
            cwd: "/home/deck".to_string(),
            root: "/".to_string(),
        }
    }
}

/// Filter rule sets: substrings that must never appear in content served to
/// the caller, names that must never resolve, paths that must never exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// The compiled .so filename; filtered from maps and environ
    pub lib_name: String,
    /// Lines containing any of these are dropped from maps-like content
    pub maps_needles: Vec<String>,
    /// Lines containing any of these are dropped from mount-table content
    pub mount_needles: Vec<String>,
    /// Environment variables that must report "not found"
    pub hidden_env: Vec<String>,
    /// `NAME=` prefixes dropped from `/proc/*/environ`
    pub hidden_env_prefixes: Vec<String>,
    /// Process names hidden from process-list enumeration
    pub hidden_processes: Vec<String>,
    /// Entry names hidden from any directory enumeration
    pub hidden_names: Vec<String>,
    /// Paths reported as nonexistent regardless of the real filesystem
    pub blocked_paths: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            lib_name: "libmirage_shim.so".to_string(),
            maps_needles: vec![
                "libmirage_shim.so".to_string(),
                "/docker/".to_string(),
                "/containers/".to_string(),
                "overlay".to_string(),
            ],
            mount_needles: vec![
                "overlay".to_string(),
                "docker".to_string(),
                "/var/lib/docker".to_string(),
                "/var/lib/containers".to_string(),
                "shm".to_string(),
            ],
            hidden_env: vec![
                "LD_PRELOAD".to_string(),
                "_LD_PRELOAD".to_string(),
                "MIRAGE_PROFILE".to_string(),
                "MIRAGE_DEBUG".to_string(),
            ],
            hidden_env_prefixes: vec![
                "LD_PRELOAD=".to_string(),
                "_LD_PRELOAD=".to_string(),
                "MIRAGE_".to_string(),
            ],
            hidden_processes: vec![
                "dockerd".to_string(),
                "containerd".to_string(),
                "containerd-shim".to_string(),
            ],
            hidden_names: vec![
                "libmirage_shim.so".to_string(),
                ".dockerenv".to_string(),
                ".dockerinit".to_string(),
            ],
            blocked_paths: vec![
                "/.dockerenv".to_string(),
                "/.dockerinit".to_string(),
                "/run/.containerenv".to_string(),
            ],
        }
    }
}

fn default_cpu_flags() -> String {
    concat!(
        "fpu vme de pse tsc msr pae mce cx8 apic sep mtrr pge mca cmov pat pse36 clflush ",
        "mmx fxsr sse sse2 ht syscall nx mmxext fxsr_opt pdpe1gb rdtscp lm constant_tsc ",
        "rep_good nopl nonstop_tsc cpuid extd_apicid aperfmperf rapl pni pclmulqdq monitor ",
        "ssse3 fma cx16 sse4_1 sse4_2 movbe popcnt aes xsave avx f16c rdrand lahf_lm ",
        "cmp_legacy svm extapic cr8_legacy abm sse4a misalignsse 3dnowprefetch osvw ibs ",
        "skinit wdt tce topoext perfctr_core perfctr_nb bpext perfctr_llc mwaitx cpb cat_l3 ",
        "cdp_l3 hw_pstate ssbd mba ibrs ibpb stibp vmmcall fsgsbase bmi1 avx2 smep bmi2 cqm ",
        "rdt_a rdseed adx smap clflushopt clwb sha_ni xsaveopt xsavec xgetbv1 xsaves cqm_llc ",
        "cqm_occup_llc cqm_mbm_total cqm_mbm_local clzero irperf xsaveerptr rdpru wbnoinvd ",
        "cppc arat npt lbrv svm_lock nrip_save tsc_scale vmcb_clean flushbyasid ",
        "decodeassists pausefilter pfthreshold avic v_vmsave_vmload vgif v_spec_ctrl umip ",
        "rdpid overflow_recov succor smca sev sev_es",
    )
    .to_string()
}

fn default_input_devices() -> String {
    concat!(
        "I: Bus=0003 Vendor=28de Product=1205 Version=0111\n",
        "N: Name=\"Valve Software Steam Deck Controller\"\n",
        "P: Phys=usb-0000:04:00.3-3/input0\n",
        "S: Sysfs=/devices/pci0000:00/0000:00:08.1/0000:04:00.3/usb1/1-3/1-3:1.0/input/input6\n",
        "U: Uniq=\n",
        "H: Handlers=event6 js0\n",
        "B: PROP=0\n",
        "B: EV=20001b\n",
        "B: KEY=7fdb0000 0 0 0 0 0\n",
        "B: ABS=30027\n",
        "B: MSC=10\n",
        "B: FF=1 7030000 0 0\n",
        "\n",
        "I: Bus=0003 Vendor=28de Product=1205 Version=0111\n",
        "N: Name=\"Valve Software Steam Deck Controller Mouse\"\n",
        "P: Phys=usb-0000:04:00.3-3/input1\n",
        "S: Sysfs=/devices/pci0000:00/0000:00:08.1/0000:04:00.3/usb1/1-3/1-3:1.1/input/input7\n",
        "U: Uniq=\n",
        "H: Handlers=mouse1 event7\n",
        "B: PROP=0\n",
        "B: EV=17\n",
        "B: KEY=70000 0 0 0 0\n",
        "B: REL=903\n",
        "B: MSC=10\n",
        "\n",
        "I: Bus=0019 Vendor=0000 Product=0005 Version=0000\n",
        "N: Name=\"Lid Switch\"\n",
        "P: Phys=PNP0C0D/button/input0\n",
        "S: Sysfs=/devices/LNXSYSTM:00/LNXSYBUS:00/PNP0C0D:00/input/input0\n",
        "U: Uniq=\n",
        "H: Handlers=event0\n",
        "B: PROP=0\n",
        "B: EV=21\n",
        "B: SW=1\n",
        "\n",
        "I: Bus=0019 Vendor=0000 Product=0001 Version=0000\n",
        "N: Name=\"Power Button\"\n",
        "P: Phys=PNP0C0C/button/input0\n",
        "S: Sysfs=/devices/LNXSYSTM:00/LNXSYBUS:00/PNP0C0C:00/input/input1\n",
        "U: Uniq=\n",
        "H: Handlers=kbd event1\n",
        "B: PROP=0\n",
        "B: EV=3\n",
        "B: KEY=10000000000000 0\n",
    )
    .to_string()
}
