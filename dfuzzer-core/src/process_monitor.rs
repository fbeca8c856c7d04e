//! §4.5 ProcessMonitor: `/proc/<pid>/status` is the only crash-detection
//! mechanism. No signal handling, no debugger attach.

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// §3 `MonitorState`. `soft_limit_kib` defaults to `3 * initial_rss_kib` and
/// is doubled by `FuzzEngine` on a memory-growth warning (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    pub alive: bool,
    pub core_dumping: bool,
    pub rss_kib: u64,
    pub initial_rss_kib: u64,
    pub soft_limit_kib: u64,
}

pub struct ProcessMonitor {
    pid: u32,
    status_path: PathBuf,
    initial_rss_kib: Option<u64>,
    soft_limit_kib: Option<u64>,
    user_override_kib: Option<u64>,
}

impl ProcessMonitor {
    pub fn new(pid: u32, user_override_kib: Option<i64>) -> Self {
        Self {
            pid,
            status_path: PathBuf::from(format!("/proc/{pid}/status")),
            initial_rss_kib: None,
            soft_limit_kib: None,
            user_override_kib: user_override_kib.map(|v| v.max(0) as u64),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    #[cfg(test)]
    pub fn set_status_path_for_test(&mut self, path: PathBuf) {
        self.status_path = path;
    }

    /// Missing status file means the process has exited; any other read
    /// failure is a harness error (original spec §4.5).
    pub fn observe(&mut self) -> Result<MonitorState> {
        let contents = match fs::read_to_string(&self.status_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(MonitorState {
                    alive: false,
                    core_dumping: false,
                    rss_kib: 0,
                    initial_rss_kib: self.initial_rss_kib.unwrap_or(0),
                    soft_limit_kib: self.soft_limit_kib.unwrap_or(0),
                });
            }
            Err(e) => return Err(Error::Monitor(e)),
        };

        let rss_kib = parse_status_field(&contents, "VmRSS:").unwrap_or(0);
        let core_dumping = parse_status_field(&contents, "CoreDumping:").unwrap_or(0) > 0;

        let initial_rss_kib = *self.initial_rss_kib.get_or_insert(rss_kib);
        let default_soft_limit = initial_rss_kib.saturating_mul(3);
        let soft_limit_kib = *self.soft_limit_kib.get_or_insert_with(|| {
            self.user_override_kib
                .filter(|v| *v >= initial_rss_kib)
                .unwrap_or(default_soft_limit)
        });

        Ok(MonitorState {
            alive: true,
            core_dumping,
            rss_kib,
            initial_rss_kib,
            soft_limit_kib,
        })
    }

    /// §4.6: double the soft limit after a memory-growth warning.
    pub fn raise_soft_limit(&mut self) {
        let doubled = self.soft_limit_kib.unwrap_or(0).saturating_mul(2);
        self.soft_limit_kib = Some(doubled);
    }
}

fn parse_status_field(status: &str, field: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let rest = line.strip_prefix(field)?;
        rest.split_whitespace().next()?.parse().ok()
    })
}
