//! Content synthesis engine.
//!
//! One generator per virtual entity. Every generator is a function of the
//! identity seed, elapsed session time, and the session draws; the only
//! non-determinism is a small per-query jitter on the frequency figures.
//! All formatted output goes through a fixed-capacity [`StackWriter`] and
//! truncates silently rather than growing without bound.

use std::fmt::Write;

use mirage_profile::{DeviceProfile, KernelVersion};
use rand::Rng;

use crate::classify::{
    AcField, BacklightField, BatteryField, DmiField, Entity, HwmonField,
};
use crate::seed::{mix, IdentitySeed, MULT_CYCLES, MULT_MAC, MULT_SERIAL, MULT_VERSION};
use crate::session::{Session, MAX_CORES};
use crate::stackbuf::StackWriter;

/// Jiffies per second for the utilization table
const HZ: u64 = 100;

/// Absolute thermal sanity clamp, millidegrees C
const TEMP_FLOOR_MC: i64 = 30_000;
const TEMP_CEIL_MC: i64 = 95_000;

/// Throttling starts at 60 C, reaches the full penalty at 80 C
const THROTTLE_LOW_C: f64 = 60.0;
const THROTTLE_HIGH_C: f64 = 80.0;
const THROTTLE_MAX_MHZ: f64 = 400.0;

/// Memory drift: consumption grows by 192 MiB per hour, capped at 1.5 GiB
const MEM_DRIFT_KIB_PER_HOUR: u64 = 196_608;
const MEM_DRIFT_CAP_KIB: u64 = 1_572_864;
/// Bound on the per-query free-memory fluctuation, KiB
const MEM_FLUCT_KIB: u64 = 65_536;

const CPUINFO_CAP: usize = 16_384;
const MEMINFO_CAP: usize = 2_048;
const STAT_CAP: usize = 2_048;
const SMALL_CAP: usize = 256;

/// Everything the generators need, assembled once at startup.
pub struct SynthContext {
    pub profile: DeviceProfile,
    pub seed: IdentitySeed,
    pub session: Session,
}

/// Mutually consistent `/proc/meminfo` figures, KiB
#[derive(Debug, Clone, Copy)]
pub struct MemFigures {
    pub total: u64,
    pub free: u64,
    pub available: u64,
    pub buffers: u64,
    pub cached: u64,
    pub active: u64,
    pub inactive: u64,
}

/// Metadata for every virtual file record, regardless of which query
/// flavor asks. Handle-based and path-based lookups for the same entity
/// must agree on all of these fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualMeta {
    /// Read-only regular file
    pub mode: u32,
    pub nlink: u64,
    pub size: i64,
    pub blksize: i64,
    /// Session-drawn device number, shared with the mount table
    pub dev: u64,
    pub time_unix: i64,
}

/// One `/proc/stat` cpu row, jiffies
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuRow {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

impl CpuRow {
    fn add(&mut self, other: &CpuRow) {
        self.user += other.user;
        self.nice += other.nice;
        self.system += other.system;
        self.idle += other.idle;
        self.iowait += other.iowait;
        self.irq += other.irq;
        self.softirq += other.softirq;
    }
}

impl SynthContext {
    pub fn new(profile: DeviceProfile, seed: IdentitySeed, session: Session) -> Self {
        Self { profile, seed, session }
    }

    /// Assemble a context from the live environment: take the process
    /// profile, seed from its identifier file, draw the session from the
    /// real clock and pid.
    pub fn initialize() -> Self {
        let profile = mirage_profile::profile().clone();
        let seed = IdentitySeed::load(&profile.machine_id_path);
        let now = unix_now();
        let session = Session::draw(&seed, &profile, now, std::process::id());
        Self::new(profile, seed, session)
    }

    /// Seconds since session start, from the real clock.
    pub fn elapsed(&self) -> u64 {
        unix_now().saturating_sub(self.session.start_unix)
    }

    /// Produce the payload for one entity at the given elapsed time.
    pub fn generate(&self, entity: Entity, elapsed: u64) -> Vec<u8> {
        match entity {
            Entity::Cpuinfo => self.render_cpuinfo(elapsed),
            Entity::Meminfo => self.render_meminfo(elapsed),
            Entity::Stat => self.render_stat(elapsed),
            Entity::Uptime => self.render_uptime(elapsed),
            Entity::Version => self.render_version(),
            Entity::Cmdline => self.render_cmdline(),
            Entity::Cgroup => self.profile.cgroup.clone().into_bytes(),
            Entity::InputDevices => self.profile.input_devices.clone().into_bytes(),
            Entity::Dmi(field) => self.render_dmi(field),
            Entity::Battery(field) => self.render_battery(field),
            Entity::Ac(field) => match field {
                AcField::Online => self.profile.ac.online.clone().into_bytes(),
                AcField::Type => self.profile.ac.kind.clone().into_bytes(),
            },
            Entity::Backlight(field) => {
                let bl = &self.profile.backlight;
                match field {
                    BacklightField::Brightness => bl.brightness.clone(),
                    BacklightField::MaxBrightness => bl.max_brightness.clone(),
                    BacklightField::ActualBrightness => bl.actual_brightness.clone(),
                    BacklightField::Type => bl.kind.clone(),
                }
                .into_bytes()
            }
            Entity::Hwmon(field) => self.render_hwmon(field, elapsed),
            Entity::MacAddress => {
                let mut out = self.mac_string().into_bytes();
                out.push(b'\n');
                out
            }
            Entity::ScalingCurFreq(core) => {
                small(|w| {
                    let khz = (self.freq_mhz(core, elapsed) * 1000.0) as u64;
                    let _ = writeln!(w, "{khz}");
                })
            }
            Entity::CpuinfoMinFreq => small(|w| {
                let _ = writeln!(w, "{}", (self.profile.cpu.min_mhz * 1000.0) as u64);
            }),
            Entity::CpuinfoMaxFreq => small(|w| {
                let _ = writeln!(w, "{}", (self.profile.cpu.max_mhz * 1000.0) as u64);
            }),
        }
    }

    // ---- stable identity values (cached by derivation, not by state) ----

    /// Hardware address as `aa:bb:cc:dd:ee:ff`, no trailing newline.
    pub fn mac_string(&self) -> String {
        let bytes = self.mac_bytes();
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5]
        )
    }

    /// Raw six-byte hardware address: vendor prefix from the profile pool,
    /// device suffix from the hardware-address derivation.
    pub fn mac_bytes(&self) -> [u8; 6] {
        let d = self.seed.derive(MULT_MAC);
        let pool = &self.profile.net.oui_pool;
        let oui = if pool.is_empty() {
            "00:e0:4c"
        } else {
            &pool[(d as usize) % pool.len()]
        };
        let mut bytes = [0u8; 6];
        for (i, part) in oui.split(':').take(3).enumerate() {
            bytes[i] = u8::from_str_radix(part, 16).unwrap_or(0);
        }
        bytes[3] = (d >> 8) as u8;
        bytes[4] = (d >> 16) as u8;
        bytes[5] = (d >> 24) as u8;
        bytes
    }

    /// Kernel identity for `/proc/version` and `uname`, one pool entry
    /// selected per seed.
    pub fn kernel_version(&self) -> &KernelVersion {
        let pool = &self.profile.kernel.pool;
        &pool[(self.seed.derive(MULT_VERSION) as usize) % pool.len()]
    }

    /// The one metadata record backing every stat flavor for a virtual
    /// file of the given size.
    pub fn virtual_meta(&self, size: i64) -> VirtualMeta {
        VirtualMeta {
            mode: 0o100_444,
            nlink: 1,
            size,
            blksize: 4096,
            dev: u64::from(self.session.mount_id),
            time_unix: self.session.start_unix as i64,
        }
    }

    fn battery_serial(&self) -> u32 {
        self.seed.derive(MULT_SERIAL) % 100_000_000
    }

    fn battery_cycles(&self) -> u32 {
        80 + self.seed.derive(MULT_CYCLES) % 320
    }

    // ---- time-varying models ----

    /// Thermal curve, millidegrees C. Smoothstep from the cold draw to the
    /// session ceiling across the warm-up window; afterwards a bounded
    /// pseudo-noise band around the ceiling.
    pub fn temp_mc(&self, elapsed: u64) -> i64 {
        let hw = &self.profile.hwmon;
        let Session { cold_mc, ceil_mc, .. } = self.session;
        let value = if elapsed < hw.warmup_secs {
            let p = elapsed as f64 / hw.warmup_secs as f64;
            let smooth = p * p * (3.0 - 2.0 * p);
            cold_mc + ((ceil_mc - cold_mc) as f64 * smooth) as i64
        } else {
            let span = (2 * hw.band_mc + 1) as u32;
            let noise = (mix(self.seed.value(), elapsed as u32) % span) as i64 - hw.band_mc;
            ceil_mc + noise
        };
        value.clamp(TEMP_FLOOR_MC, TEMP_CEIL_MC)
    }

    /// Effective core frequency in MHz: Gaussian-shaped base clock, minus
    /// a thermal-throttle penalty, plus the per-core session calibration
    /// offset and a small per-query jitter.
    pub fn freq_mhz(&self, core: u32, elapsed: u64) -> f64 {
        let cpu = &self.profile.cpu;
        let base = self.base_clock_mhz();
        let penalty = throttle_penalty_mhz(self.temp_mc(elapsed));
        let calib = self.session.calib_mhz[core as usize % MAX_CORES] as f64;
        let jitter = rand::thread_rng().gen_range(-15.0..15.0);
        (base - penalty + calib + jitter).clamp(cpu.min_mhz, cpu.max_mhz)
    }

    /// Base clock from a Box-Muller transform over two seed-derived
    /// uniforms, clamped to the profile band. Stable per seed.
    fn base_clock_mhz(&self) -> f64 {
        let cpu = &self.profile.cpu;
        let s = self.seed.value();
        let u1 = ((s % 9973) + 1) as f64 / 9974.0;
        let u2 = ((s >> 11) % 9973) as f64 / 9973.0;
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        (cpu.nominal_mhz + z * cpu.sigma_mhz).clamp(cpu.min_mhz, cpu.max_mhz)
    }

    /// Mutually consistent meminfo figures for one query.
    pub fn mem_figures(&self, elapsed: u64) -> MemFigures {
        let total = self.profile.memory.total_kib;
        let drift = (elapsed * MEM_DRIFT_KIB_PER_HOUR / 3600).min(MEM_DRIFT_CAP_KIB);
        let fluct = rand::thread_rng().gen_range(0..MEM_FLUCT_KIB);
        let floor = total / 16;
        let free = self
            .session
            .mem_baseline_kib
            .saturating_sub(drift)
            .saturating_sub(fluct)
            .max(floor);
        let cached = total / 4;
        let buffers = total / 32;
        let used = total - free - cached;
        let active = used * 3 / 4;
        let inactive = used - active;
        MemFigures {
            total,
            free,
            available: free + cached * 3 / 4,
            buffers,
            cached,
            active,
            inactive,
        }
    }

    /// Per-core utilization rows plus their exact column-wise sum.
    pub fn stat_rows(&self, elapsed: u64) -> (CpuRow, Vec<CpuRow>) {
        let cores = self.profile.cpu.cores.min(MAX_CORES as u32);
        let total = (self.session.uptime_base + elapsed) * HZ;
        let s = self.seed.value();
        let mut aggregate = CpuRow::default();
        let mut rows = Vec::with_capacity(cores as usize);
        for core in 0..cores {
            // Per-core busy share in [8%, 15%], from distinct seed bits
            let busy_pct = 8 + ((s >> (core * 3)) & 0x7) as u64;
            let busy = total * busy_pct / 100;
            let user = busy * 3 / 5;
            let system = busy * 3 / 10;
            let nice = busy / 20;
            let irq = busy / 40;
            let softirq = busy - user - system - nice - irq;
            let iowait = total / 200;
            let row = CpuRow {
                user,
                nice,
                system,
                idle: total - busy - iowait,
                iowait,
                irq,
                softirq,
            };
            aggregate.add(&row);
            rows.push(row);
        }
        (aggregate, rows)
    }

    /// Synthetic uptime and idle seconds for `/proc/uptime`.
    pub fn uptime_pair(&self, elapsed: u64) -> (f64, f64) {
        let total = (self.session.uptime_base + elapsed) as f64;
        (total, total * self.session.idle_ratio)
    }

    // ---- renderers ----

    fn render_uptime(&self, elapsed: u64) -> Vec<u8> {
        let (total, idle) = self.uptime_pair(elapsed);
        small(|w| {
            let _ = writeln!(w, "{total:.2} {idle:.2}");
        })
    }

    fn render_version(&self) -> Vec<u8> {
        let kernel = self.kernel_version();
        let k = &self.profile.kernel;
        small(|w| {
            let _ = writeln!(
                w,
                "Linux version {} ({}) {} {}",
                kernel.release, k.builder, k.compiler, kernel.version
            );
        })
    }

    fn render_cmdline(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for arg in &self.profile.process.cmdline {
            out.extend_from_slice(arg.as_bytes());
            out.push(0);
        }
        out
    }

    fn render_dmi(&self, field: DmiField) -> Vec<u8> {
        let dmi = &self.profile.dmi;
        let value = match field {
            DmiField::ProductName => &dmi.product_name,
            DmiField::SysVendor => &dmi.sys_vendor,
            DmiField::ProductVersion => &dmi.product_version,
            DmiField::BoardName => &dmi.board_name,
            DmiField::BoardVendor => &dmi.board_vendor,
            DmiField::BiosVendor => &dmi.bios_vendor,
            DmiField::BiosVersion => &dmi.bios_version,
        };
        format!("{value}\n").into_bytes()
    }

    fn render_battery(&self, field: BatteryField) -> Vec<u8> {
        let bat = &self.profile.battery;
        match field {
            BatteryField::Status => bat.status.clone().into_bytes(),
            BatteryField::Present => bat.present.clone().into_bytes(),
            BatteryField::VoltageNow => bat.voltage_now.clone().into_bytes(),
            BatteryField::CurrentNow => bat.current_now.clone().into_bytes(),
            BatteryField::Capacity => bat.capacity.clone().into_bytes(),
            BatteryField::CapacityLevel => bat.capacity_level.clone().into_bytes(),
            BatteryField::ChargeFull => bat.charge_full.clone().into_bytes(),
            BatteryField::ChargeFullDesign => bat.charge_full_design.clone().into_bytes(),
            BatteryField::ChargeNow => bat.charge_now.clone().into_bytes(),
            BatteryField::Manufacturer => bat.manufacturer.clone().into_bytes(),
            BatteryField::ModelName => bat.model_name.clone().into_bytes(),
            BatteryField::Technology => bat.technology.clone().into_bytes(),
            BatteryField::Type => bat.kind.clone().into_bytes(),
            BatteryField::SerialNumber => small(|w| {
                let _ = writeln!(w, "{:08}", self.battery_serial());
            }),
            BatteryField::CycleCount => small(|w| {
                let _ = writeln!(w, "{}", self.battery_cycles());
            }),
        }
    }

    fn render_hwmon(&self, field: HwmonField, elapsed: u64) -> Vec<u8> {
        let hw = &self.profile.hwmon;
        match field {
            HwmonField::Name => hw.name.clone().into_bytes(),
            HwmonField::Temp1Label => hw.temp1_label.clone().into_bytes(),
            HwmonField::Temp1Input => small(|w| {
                let _ = writeln!(w, "{}", self.temp_mc(elapsed));
            }),
            HwmonField::Temp1Max => small(|w| {
                let _ = writeln!(w, "{}", hw.temp1_max_mc);
            }),
            HwmonField::Temp1Crit => small(|w| {
                let _ = writeln!(w, "{}", hw.temp1_crit_mc);
            }),
        }
    }

    fn render_cpuinfo(&self, elapsed: u64) -> Vec<u8> {
        let cpu = &self.profile.cpu;
        let mut buf = vec![0u8; CPUINFO_CAP];
        let mut w = StackWriter::new(&mut buf);
        for core in 0..cpu.cores {
            if core > 0 {
                let _ = writeln!(w);
            }
            let _ = writeln!(w, "processor\t: {core}");
            let _ = writeln!(w, "vendor_id\t: {}", cpu.vendor_id);
            let _ = writeln!(w, "cpu family\t: {}", cpu.family);
            let _ = writeln!(w, "model\t\t: {}", cpu.model);
            let _ = writeln!(w, "model name\t: {}", cpu.model_name);
            let _ = writeln!(w, "stepping\t: {}", cpu.stepping);
            let _ = writeln!(w, "microcode\t: {}", cpu.microcode);
            let _ = writeln!(w, "cpu MHz\t\t: {:.3}", self.freq_mhz(core, elapsed));
            let _ = writeln!(w, "cache size\t: {} KB", cpu.cache_size_kb);
            let _ = writeln!(w, "physical id\t: 0");
            let _ = writeln!(w, "siblings\t: {}", cpu.siblings);
            let _ = writeln!(w, "core id\t\t: {core}");
            let _ = writeln!(w, "cpu cores\t: {}", cpu.cores);
            let _ = writeln!(w, "apicid\t\t: {core}");
            let _ = writeln!(w, "fpu\t\t: yes");
            let _ = writeln!(w, "fpu_exception\t: yes");
            let _ = writeln!(w, "cpuid level\t: {}", cpu.cpuid_level);
            let _ = writeln!(w, "wp\t\t: yes");
            let _ = writeln!(w, "flags\t\t: {}", cpu.flags);
            let _ = writeln!(w, "bugs\t\t: {}", cpu.bugs);
            let _ = writeln!(w, "bogomips\t: {:.2}", cpu.bogomips);
            let _ = writeln!(w, "TLB size\t: {}", cpu.tlb_size);
            let _ = writeln!(w, "clflush size\t: {}", cpu.clflush_size);
            let _ = writeln!(w, "cache_alignment\t: {}", cpu.cache_alignment);
            let _ = writeln!(w, "address sizes\t: {}", cpu.address_sizes);
            let _ = writeln!(w, "power management: {}", cpu.power_management);
        }
        let len = w.len();
        buf.truncate(len);
        buf
    }

    fn render_meminfo(&self, elapsed: u64) -> Vec<u8> {
        let m = self.mem_figures(elapsed);
        let swap = self.profile.memory.swap_total_kib;
        let anon = m.active / 2;
        let file = m.active - anon;
        let slab = m.total / 32;
        let mut buf = vec![0u8; MEMINFO_CAP];
        let mut w = StackWriter::new(&mut buf);
        let mut kib = |name: &str, value: u64| {
            let _ = writeln!(w, "{:<16}{:>8} kB", format!("{name}:"), value);
        };
        kib("MemTotal", m.total);
        kib("MemFree", m.free);
        kib("MemAvailable", m.available);
        kib("Buffers", m.buffers);
        kib("Cached", m.cached);
        kib("SwapCached", 0);
        kib("Active", m.active);
        kib("Inactive", m.inactive);
        kib("Active(anon)", anon);
        kib("Inactive(anon)", 0);
        kib("Active(file)", file);
        kib("Inactive(file)", m.inactive);
        kib("Unevictable", 0);
        kib("Mlocked", 0);
        kib("SwapTotal", swap);
        kib("SwapFree", swap);
        kib("Dirty", 0);
        kib("Writeback", 0);
        kib("AnonPages", anon);
        kib("Mapped", m.total / 32);
        kib("Shmem", 16_384);
        kib("KReclaimable", slab);
        kib("Slab", slab);
        kib("SReclaimable", slab * 4 / 5);
        kib("SUnreclaim", slab - slab * 4 / 5);
        kib("KernelStack", 16_384);
        kib("PageTables", 32_768);
        kib("NFS_Unstable", 0);
        kib("Bounce", 0);
        kib("WritebackTmp", 0);
        kib("CommitLimit", m.total);
        kib("Committed_AS", m.total / 2);
        kib("VmallocTotal", 34_359_738_367);
        kib("VmallocUsed", 65_536);
        kib("VmallocChunk", 0);
        kib("Percpu", 16_384);
        kib("HardwareCorrupted", 0);
        kib("AnonHugePages", 0);
        kib("ShmemHugePages", 0);
        kib("ShmemPmdMapped", 0);
        kib("FileHugePages", 0);
        kib("FilePmdMapped", 0);
        let _ = writeln!(w, "{:<16}{:>8}", "HugePages_Total:", 0);
        let _ = writeln!(w, "{:<16}{:>8}", "HugePages_Free:", 0);
        let _ = writeln!(w, "{:<16}{:>8}", "HugePages_Rsvd:", 0);
        let _ = writeln!(w, "{:<16}{:>8}", "HugePages_Surp:", 0);
        let _ = writeln!(w, "{:<16}{:>8} kB", "Hugepagesize:", 2_048);
        let _ = writeln!(w, "{:<16}{:>8} kB", "Hugetlb:", 0);
        let _ = writeln!(w, "{:<16}{:>8} kB", "DirectMap4k:", 262_144);
        let _ = writeln!(w, "{:<16}{:>8} kB", "DirectMap2M:", m.total / 2);
        let _ = writeln!(w, "{:<16}{:>8} kB", "DirectMap1G:", 8_388_608);
        let len = w.len();
        buf.truncate(len);
        buf
    }

    fn render_stat(&self, elapsed: u64) -> Vec<u8> {
        let (aggregate, rows) = self.stat_rows(elapsed);
        let mut buf = vec![0u8; STAT_CAP];
        let mut w = StackWriter::new(&mut buf);
        let write_row = |w: &mut StackWriter<'_>, label: &str, row: &CpuRow| {
            let _ = writeln!(
                w,
                "{label} {} {} {} {} {} {} {} 0 0 0",
                row.user, row.nice, row.system, row.idle, row.iowait, row.irq, row.softirq
            );
        };
        write_row(&mut w, "cpu ", &aggregate);
        for (core, row) in rows.iter().enumerate() {
            write_row(&mut w, &format!("cpu{core}"), row);
        }
        let total_jiffies: u64 =
            aggregate.user + aggregate.nice + aggregate.system + aggregate.idle;
        let _ = writeln!(w, "intr {} 0 0 0", total_jiffies * 7 / 10);
        let _ = writeln!(w, "ctxt {}", total_jiffies * 13 / 10);
        let _ = writeln!(
            w,
            "btime {}",
            self.session.start_unix.saturating_sub(self.session.uptime_base)
        );
        let _ = writeln!(w, "processes {}", 900 + total_jiffies / 10_000);
        let _ = writeln!(w, "procs_running 2");
        let _ = writeln!(w, "procs_blocked 0");
        let _ = writeln!(w, "softirq {} 0 0 0 0 0 0 0 0 0 0", total_jiffies / 4);
        let len = w.len();
        buf.truncate(len);
        buf
    }
}

/// The thermal-throttle frequency penalty in MHz: zero below the low
/// threshold, linear through the mid band, capped above.
fn throttle_penalty_mhz(temp_mc: i64) -> f64 {
    let t = temp_mc as f64 / 1000.0;
    if t <= THROTTLE_LOW_C {
        0.0
    } else if t >= THROTTLE_HIGH_C {
        THROTTLE_MAX_MHZ
    } else {
        (t - THROTTLE_LOW_C) / (THROTTLE_HIGH_C - THROTTLE_LOW_C) * THROTTLE_MAX_MHZ
    }
}

fn small(fill: impl FnOnce(&mut StackWriter<'_>)) -> Vec<u8> {
    let mut buf = vec![0u8; SMALL_CAP];
    let mut w = StackWriter::new(&mut buf);
    fill(&mut w);
    let len = w.len();
    buf.truncate(len);
    buf
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Entity;

    fn context() -> SynthContext {
        let profile = DeviceProfile::default();
        let seed = IdentitySeed::from_identifier(b"deadbeefcafebabe");
        let session = Session::draw(&seed, &profile, 1_700_000_000, 4242);
        SynthContext::new(profile, seed, session)
    }

    #[test]
    fn test_virtual_meta_is_identical_across_query_flavors() {
        // A handle lookup and a path lookup for the same entity must
        // produce the same record: same mode, device, and timestamps.
        let ctx = context();
        let by_handle = ctx.virtual_meta(0);
        let by_path = ctx.virtual_meta(0);
        assert_eq!(by_handle, by_path);
        assert_eq!(by_handle.mode & 0o170_000, 0o100_000, "regular file");
        assert_eq!(by_handle.mode & 0o777, 0o444);
        assert_eq!(by_handle.dev, u64::from(ctx.session.mount_id));
        assert_eq!(by_handle.time_unix, ctx.session.start_unix as i64);
    }

    #[test]
    fn test_uptime_tracks_elapsed() {
        let ctx = context();
        let (t0, i0) = ctx.uptime_pair(0);
        let (t1, i1) = ctx.uptime_pair(300);
        assert_eq!(t1 - t0, 300.0);
        assert!((i0 / t0 - i1 / t1).abs() < 1e-9);
        assert!((0.30..0.50).contains(&(i0 / t0)));
    }

    #[test]
    fn test_meminfo_invariants() {
        let ctx = context();
        for elapsed in [0u64, 60, 3_600, 36_000, 360_000] {
            let m = ctx.mem_figures(elapsed);
            assert!(m.available >= m.free, "available < free at {elapsed}");
            assert!(
                m.active + m.free + m.cached <= m.total,
                "active+free+cached > total at {elapsed}"
            );
            assert!(m.free >= m.total / 16);
        }
    }

    #[test]
    fn test_mem_drift_is_monotonic_under_fixed_fluct() {
        // Drift alone never increases free memory
        let ctx = context();
        let baseline = ctx.session.mem_baseline_kib;
        let mut last = u64::MAX;
        for elapsed in [0u64, 3_600, 7_200, 36_000] {
            let drift = (elapsed * MEM_DRIFT_KIB_PER_HOUR / 3600).min(MEM_DRIFT_CAP_KIB);
            let free = baseline.saturating_sub(drift);
            assert!(free <= last);
            last = free;
        }
        assert_eq!(
            baseline.saturating_sub(MEM_DRIFT_CAP_KIB),
            baseline - MEM_DRIFT_CAP_KIB
        );
    }

    #[test]
    fn test_stat_aggregate_is_exact_sum() {
        let ctx = context();
        for elapsed in [0u64, 17, 600, 90_000] {
            let (aggregate, rows) = ctx.stat_rows(elapsed);
            let mut sum = CpuRow::default();
            for row in &rows {
                sum.add(row);
            }
            assert_eq!(aggregate.user, sum.user);
            assert_eq!(aggregate.nice, sum.nice);
            assert_eq!(aggregate.system, sum.system);
            assert_eq!(aggregate.idle, sum.idle);
            assert_eq!(aggregate.iowait, sum.iowait);
            assert_eq!(aggregate.irq, sum.irq);
            assert_eq!(aggregate.softirq, sum.softirq);
        }
    }

    #[test]
    fn test_thermal_warmup_is_monotonic() {
        let ctx = context();
        let warmup = ctx.profile.hwmon.warmup_secs;
        let mut last = i64::MIN;
        for elapsed in (0..warmup).step_by(30) {
            let t = ctx.temp_mc(elapsed);
            assert!(t >= last, "thermal dipped at {elapsed}");
            last = t;
        }
    }

    #[test]
    fn test_thermal_band_after_warmup() {
        let ctx = context();
        let hw = &ctx.profile.hwmon;
        for elapsed in [hw.warmup_secs, hw.warmup_secs + 123, hw.warmup_secs + 9_999] {
            let t = ctx.temp_mc(elapsed);
            assert!(t >= ctx.session.ceil_mc - hw.band_mc);
            assert!(t <= ctx.session.ceil_mc + hw.band_mc);
        }
    }

    #[test]
    fn test_freq_stays_in_profile_band() {
        let ctx = context();
        for core in 0..4 {
            for elapsed in [0u64, 300, 1_000, 50_000] {
                let f = ctx.freq_mhz(core, elapsed);
                assert!(f >= ctx.profile.cpu.min_mhz);
                assert!(f <= ctx.profile.cpu.max_mhz);
            }
        }
    }

    #[test]
    fn test_cached_identity_values_are_stable() {
        let ctx = context();
        assert_eq!(ctx.mac_string(), ctx.mac_string());
        assert_eq!(
            ctx.generate(Entity::MacAddress, 0),
            ctx.generate(Entity::MacAddress, 999)
        );
        let serial = ctx.generate(Entity::Battery(crate::classify::BatteryField::SerialNumber), 0);
        assert_eq!(serial.len(), 9); // eight digits plus newline
        assert!(serial[..8].iter().all(u8::is_ascii_digit));
    }

    #[test]
    fn test_mac_uses_profile_oui() {
        let ctx = context();
        let mac = ctx.mac_string();
        let prefix = &mac[..8];
        assert!(
            ctx.profile.net.oui_pool.iter().any(|oui| oui == prefix),
            "{prefix} not in OUI pool"
        );
    }

    #[test]
    fn test_version_line_shape() {
        let ctx = context();
        let out = String::from_utf8(ctx.generate(Entity::Version, 0)).unwrap();
        assert!(out.starts_with("Linux version "));
        assert!(out.contains(ctx.kernel_version().release.as_str()));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_cmdline_is_nul_separated() {
        let ctx = context();
        let out = ctx.generate(Entity::Cmdline, 0);
        let records: Vec<&[u8]> = out.split(|&b| b == 0).filter(|r| !r.is_empty()).collect();
        assert_eq!(records.len(), ctx.profile.process.cmdline.len());
        assert_eq!(records[0], b"/usr/bin/gamescope");
        assert_eq!(*out.last().unwrap(), 0);
    }

    #[test]
    fn test_cpuinfo_block_per_core() {
        let ctx = context();
        let out = String::from_utf8(ctx.generate(Entity::Cpuinfo, 0)).unwrap();
        assert_eq!(out.matches("processor\t:").count(), 4);
        assert_eq!(out.matches("model name\t: AMD Custom APU 0405").count(), 4);
        assert!(out.contains("processor\t: 3"));
    }

    #[test]
    fn test_meminfo_layout_matches_procfs() {
        let ctx = context();
        let out = String::from_utf8(ctx.generate(Entity::Meminfo, 0)).unwrap();
        let first = out.lines().next().unwrap();
        assert_eq!(first, "MemTotal:       16252928 kB");
        assert!(out.contains("HugePages_Total:       0"));
    }

    #[test]
    fn test_stat_layout() {
        let ctx = context();
        let out = String::from_utf8(ctx.generate(Entity::Stat, 0)).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("cpu  "));
        assert!(lines.next().unwrap().starts_with("cpu0 "));
        assert!(out.contains("\nbtime "));
        assert!(out.contains("\nprocs_running 2"));
    }
}
