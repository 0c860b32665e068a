//! 호스트 리소스 수집 — sysinfo 기반
//!
//! 엔진 프로세스가 실행 중인 호스트의 CPU/메모리/디스크 사용량을
//! [`ResourceMetricsSample`]로 수집합니다. CPU 사용률은 두 번의 갱신
//! 사이 변화량으로 계산되므로 첫 샘플은 0에 가까울 수 있습니다.

use std::time::SystemTime;

use sysinfo::{Disks, System};

use kubeguard_core::types::ResourceMetricsSample;

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// 호스트 통계 수집기
///
/// `System`을 유지한 채 반복 샘플링해야 CPU 사용률이 정확합니다.
pub struct HostStats {
    system: System,
}

impl HostStats {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// 현재 호스트 리소스 스냅샷을 수집합니다.
    pub fn sample(&mut self) -> ResourceMetricsSample {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let cpu_cores = self.system.cpus().len();
        let cpu_usage = f64::from(self.system.global_cpu_usage()) / 100.0 * cpu_cores as f64;

        let disks = Disks::new_with_refreshed_list();
        let mut disk_total = 0u64;
        let mut disk_available = 0u64;
        for disk in disks.list() {
            disk_total += disk.total_space();
            disk_available += disk.available_space();
        }

        ResourceMetricsSample {
            timestamp: SystemTime::now(),
            cpu_cores,
            cpu_usage,
            memory_usage: self.system.used_memory() as f64 / BYTES_PER_GB,
            memory_total: self.system.total_memory() as f64 / BYTES_PER_GB,
            disk_usage: disk_total.saturating_sub(disk_available) as f64 / BYTES_PER_GB,
            disk_total: disk_total as f64 / BYTES_PER_GB,
        }
    }
}

impl Default for HostStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_reports_plausible_values() {
        let mut stats = HostStats::new();
        let sample = stats.sample();
        assert!(sample.cpu_cores > 0);
        assert!(sample.memory_total > 0.0);
        assert!(sample.memory_usage <= sample.memory_total);
        assert!(sample.disk_usage <= sample.disk_total);
    }

    #[test]
    fn repeated_samples_advance_timestamp() {
        let mut stats = HostStats::new();
        let first = stats.sample();
        let second = stats.sample();
        assert!(second.timestamp >= first.timestamp);
    }
}
