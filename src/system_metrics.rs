//! Host-wide and per-process memory probes (C13).
//!
//! Backs [`crate::process::ManagedProcess::memory_percent`] and the OOM
//! predicate. Host-wide memory is tracked separately, for observability
//! only — it never feeds the OOM predicate, which looks at the server
//! process's own RSS share.

use std::sync::Mutex;

use sysinfo::{Pid, System};

/// The per-process OOM threshold used by `ManagedServer::is_out_of_memory`.
pub const PROCESS_MEMORY_THRESHOLD_PERCENT: f64 = 80.0;

/// Host-wide memory threshold, for logging only; not wired into any
/// predicate.
pub const HOST_MEMORY_THRESHOLD_PERCENT: f64 = 95.0;

/// Thin, refresh-on-read wrapper around `sysinfo::System`.
pub struct SystemMetrics {
    system: Mutex<System>,
}

impl SystemMetrics {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        SystemMetrics {
            system: Mutex::new(system),
        }
    }

    /// RSS of `pid` as a percentage of total host memory. `0.0` if the pid
    /// cannot be resolved (already exited, or never started).
    pub fn process_memory_percent(&self, pid: u32) -> f64 {
        let mut system = self.system.lock().expect("system metrics lock poisoned");
        let sysinfo_pid = Pid::from_u32(pid);
        system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[sysinfo_pid]), true);
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }

        match system.process(sysinfo_pid) {
            Some(process) => (process.memory() as f64 / total as f64) * 100.0,
            None => 0.0,
        }
    }

    /// Host-wide used-memory percentage, for logging only.
    pub fn host_memory_percent(&self) -> f64 {
        let mut system = self.system.lock().expect("system metrics lock poisoned");
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            return 0.0;
        }
        (system.used_memory() as f64 / total as f64) * 100.0
    }
}

impl Default for SystemMetrics {
    fn default() -> Self {
        Self::new()
    }
}
