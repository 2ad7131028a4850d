//! Thread observation from /proc/[pid]/task/[tid] files.

use crate::snapshot::ThreadMetricsSnapshot;
use crate::thread_info::{ThreadInfo, ThreadState};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// PF_KTHREAD flag in the /proc stat flags field marks kernel threads.
const PF_KTHREAD: u64 = 0x0020_0000;

/// Errors from a thread observation cycle.
///
/// Individual tasks vanishing mid-walk are tolerated and skipped; only a
/// missing or unreadable proc filesystem is fatal.
#[derive(Debug, Error)]
pub enum ObserveError {
    #[error("cannot read {path}: {source}")]
    ProcUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed {what} in {path}")]
    Parse { what: &'static str, path: PathBuf },
}

/// Capability to produce a fresh thread metrics snapshot.
pub trait ThreadObserver {
    fn observe(&mut self) -> Result<ThreadMetricsSnapshot, ObserveError>;
}

/// System-wide thread observer reading the Linux proc filesystem.
///
/// Counter mapping:
/// - live count: all tasks under `/proc/[pid]/task/`
/// - daemon count: tasks of kernel threads (PF_KTHREAD), the threads that
///   do not prevent userspace shutdown
/// - total started: the cumulative `processes` fork counter from /proc/stat
/// - peak count: maximum live count seen across this observer's own
///   observe calls (the kernel keeps no peak counter)
pub struct ProcThreadObserver {
    proc_root: PathBuf,
    collect_details: bool,
    capture_stacks: bool,
    detail_limit: Option<usize>,
    peak_live: i32,
    clock_ticks_per_sec: u64,
}

impl ProcThreadObserver {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            proc_root: root.as_ref().to_path_buf(),
            collect_details: false,
            capture_stacks: false,
            detail_limit: None,
            peak_live: 0,
            clock_ticks_per_sec: unsafe { libc::sysconf(libc::_SC_CLK_TCK) as u64 },
        }
    }

    /// Collect a ThreadInfo record per task (off by default; a full walk
    /// of task stat files is much more expensive than counting).
    pub fn with_details(mut self, enabled: bool) -> Self {
        self.collect_details = enabled;
        self
    }

    /// Also capture kernel stacks from task/[tid]/stack. Usually needs
    /// root; unreadable stacks are recorded as empty.
    pub fn with_stacks(mut self, enabled: bool) -> Self {
        self.capture_stacks = enabled;
        self
    }

    /// Cap the number of detail records collected per cycle.
    pub fn with_detail_limit(mut self, limit: Option<usize>) -> Self {
        self.detail_limit = limit;
        self
    }
}

impl Default for ProcThreadObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadObserver for ProcThreadObserver {
    fn observe(&mut self) -> Result<ThreadMetricsSnapshot, ObserveError> {
        let stat_path = self.proc_root.join("stat");
        let stat_content =
            fs::read_to_string(&stat_path).map_err(|source| ObserveError::ProcUnavailable {
                path: stat_path.clone(),
                source,
            })?;
        let total_started = parse_total_started(&stat_content).ok_or(ObserveError::Parse {
            what: "processes counter",
            path: stat_path,
        })?;

        let mut live: i32 = 0;
        let mut daemon: i32 = 0;
        let mut details: Vec<ThreadInfo> = Vec::new();

        let entries =
            fs::read_dir(&self.proc_root).map_err(|source| ObserveError::ProcUnavailable {
                path: self.proc_root.clone(),
                source,
            })?;

        for entry in entries.flatten() {
            let pid_path = entry.path();
            let is_pid = pid_path
                .file_name()
                .and_then(|f| f.to_str())
                .map(|f| f.bytes().all(|b| b.is_ascii_digit()))
                .unwrap_or(false);
            if !is_pid {
                continue;
            }

            // A kernel thread's tasks are all kernel threads, so the
            // per-process flag classifies the whole task group.
            let kernel_thread = fs::read_to_string(pid_path.join("stat"))
                .ok()
                .and_then(|s| parse_task_stat(&s))
                .map(|st| st.flags & PF_KTHREAD != 0)
                .unwrap_or(false);

            // Processes may exit between readdir and here; skip quietly.
            let task_dir = match fs::read_dir(pid_path.join("task")) {
                Ok(dir) => dir,
                Err(_) => continue,
            };

            for task in task_dir.flatten() {
                live += 1;
                if kernel_thread {
                    daemon += 1;
                }

                if !self.collect_details {
                    continue;
                }
                if let Some(limit) = self.detail_limit {
                    if details.len() >= limit {
                        continue;
                    }
                }
                if let Some(info) = self.read_thread_info(&task.path(), kernel_thread) {
                    details.push(info);
                }
            }
        }

        self.peak_live = self.peak_live.max(live);

        let mut snapshot = ThreadMetricsSnapshot::default();
        snapshot.set_dynamic_data(
            daemon,
            self.peak_live,
            live,
            total_started,
            self.collect_details.then_some(details),
        );
        Ok(snapshot)
    }
}

impl ProcThreadObserver {
    fn read_thread_info(&self, task_path: &Path, daemon: bool) -> Option<ThreadInfo> {
        let stat_content = fs::read_to_string(task_path.join("stat")).ok()?;
        let stat = parse_task_stat(&stat_content)?;

        let thread_id: u64 = task_path
            .file_name()
            .and_then(|f| f.to_str())
            .and_then(|f| f.parse().ok())?;

        let ticks = self.clock_ticks_per_sec.max(1) as f64;

        let wait_channel = fs::read_to_string(task_path.join("wchan"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && s != "0");

        let stack = if self.capture_stacks {
            fs::read_to_string(task_path.join("stack"))
                .map(|s| parse_stack_frames(&s))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Some(ThreadInfo {
            thread_id,
            name: stat.name,
            state: ThreadState::from_proc_char(stat.state),
            daemon,
            cpu_user_secs: stat.utime as f64 / ticks,
            cpu_system_secs: stat.stime as f64 / ticks,
            wait_channel,
            stack,
        })
    }
}

/// Fields of interest from a /proc/[pid]/stat or task/[tid]/stat line.
#[derive(Debug, PartialEq)]
struct TaskStat {
    name: String,
    state: char,
    flags: u64,
    utime: u64,
    stime: u64,
}

/// Parse a stat line. The comm field is parenthesized and may itself
/// contain spaces or parentheses, so split around the last ')'.
fn parse_task_stat(content: &str) -> Option<TaskStat> {
    let comm_start = content.find('(')?;
    let comm_end = content.rfind(')')?;
    let name = content.get(comm_start + 1..comm_end)?.to_string();

    let fields: Vec<&str> = content.get(comm_end + 2..)?.split_whitespace().collect();
    let state = fields.first()?.chars().next()?;

    // After the state: ppid pgrp session tty_nr tpgid flags ... utime stime
    let flags: u64 = fields.get(6).and_then(|s| s.parse().ok()).unwrap_or(0);
    let utime: u64 = fields.get(11).and_then(|s| s.parse().ok()).unwrap_or(0);
    let stime: u64 = fields.get(12).and_then(|s| s.parse().ok()).unwrap_or(0);

    Some(TaskStat {
        name,
        state,
        flags,
        utime,
        stime,
    })
}

/// Extract the cumulative fork counter from /proc/stat content.
fn parse_total_started(stat_content: &str) -> Option<i64> {
    stat_content
        .lines()
        .find(|line| line.starts_with("processes "))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}

/// Turn /proc/[pid]/task/[tid]/stack content into bare frame symbols.
/// Lines look like "[<0>] futex_wait_queue+0x60/0xa0".
fn parse_stack_frames(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            let frame = match line.find("] ") {
                Some(idx) => &line[idx + 2..],
                None => line,
            };
            let frame = frame.trim();
            (!frame.is_empty()).then(|| frame.to_string())
        })
        .collect()
}
