use serde::{Serialize, Serializer};
use sysinfo::{Disks, System};

use super::types::{HostInfo, HostStats, Megabytes, MemoryUsage, Percent};

impl Percent {
    /// `used` as a share of `total`; zero when there is nothing to measure.
    pub fn of(used: f64, total: f64) -> Self {
        if total > 0.0 {
            Percent((used / total * 100.0) as f32)
        } else {
            Percent(0.0)
        }
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{:.2}%", self.0))
    }
}

impl Megabytes {
    pub fn from_bytes(bytes: u64) -> Self {
        Megabytes(bytes / 1024 / 1024)
    }
}

impl Serialize for Megabytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{} MB", self.0))
    }
}

impl HostStats {
    /// Snapshot from an already refreshed `System`. Disks are listed fresh.
    pub fn collect(sysinfo: &System, live_workers: usize) -> Self {
        let disks = Disks::new_with_refreshed_list();
        let (used, total) = disks.iter().fold((0u64, 0u64), |(used, total), disk| {
            let size = disk.total_space();
            (used + size.saturating_sub(disk.available_space()), total + size)
        });

        HostStats {
            host: HostInfo {
                system_name: System::name().unwrap_or_else(|| "Unknown".to_string()),
                hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
                cpus: sysinfo.cpus().len(),
            },
            cpu: Percent(sysinfo.global_cpu_usage()),
            memory: MemoryUsage {
                total: Megabytes::from_bytes(sysinfo.total_memory()),
                used: Megabytes::from_bytes(sysinfo.used_memory()),
            },
            disk: Percent::of(used as f64, total as f64),
            live_workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_of_empty_total_is_zero() {
        assert_eq!(Percent::of(10.0, 0.0), Percent(0.0));
        assert_eq!(Percent::of(1.0, 4.0), Percent(25.0));
    }

    #[test]
    fn megabytes_round_down() {
        assert_eq!(Megabytes::from_bytes(3 * 1024 * 1024 - 1), Megabytes(2));
    }

    #[test]
    fn serializes_with_units() {
        let stats = HostStats {
            host: HostInfo {
                system_name: "Linux".into(),
                hostname: "node-1".into(),
                cpus: 4,
            },
            cpu: Percent(12.5),
            memory: MemoryUsage {
                total: Megabytes(2048),
                used: Megabytes(512),
            },
            disk: Percent(50.0),
            live_workers: 3,
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["cpu"], "12.50%");
        assert_eq!(json["memory"]["total"], "2048 MB");
        assert_eq!(json["memory"]["used"], "512 MB");
        assert_eq!(json["disk"], "50.00%");
        assert_eq!(json["host"]["cpus"], 4);
        assert_eq!(json["live_workers"], 3);
    }

    #[test]
    fn collects_from_the_running_host() {
        let mut sysinfo = System::new();
        sysinfo.refresh_memory();

        let stats = HostStats::collect(&sysinfo, 2);
        assert_eq!(stats.live_workers, 2);
        assert!(stats.memory.used.0 <= stats.memory.total.0);
        assert!((0.0..=100.0).contains(&stats.disk.0));
    }
}
