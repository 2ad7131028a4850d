//! Per-thread detail record carried inside a snapshot.

use serde::{Deserialize, Serialize};

/// Scheduler state of a single thread
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ThreadState {
    Running,
    Sleeping,
    DiskSleep, // Uninterruptible sleep (waiting for I/O)
    Idle,      // Idle kernel thread
    Stopped,
    Zombie,
    Dead,
    Unknown,
}

impl ThreadState {
    /// Map the single-character state field from /proc to a state.
    pub fn from_proc_char(c: char) -> Self {
        match c {
            'R' => ThreadState::Running,
            'S' => ThreadState::Sleeping,
            'D' => ThreadState::DiskSleep,
            'I' => ThreadState::Idle,
            'T' | 't' => ThreadState::Stopped,
            'Z' => ThreadState::Zombie,
            'X' => ThreadState::Dead,
            _ => ThreadState::Unknown,
        }
    }
}

impl std::fmt::Display for ThreadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreadState::Running => write!(f, "Running"),
            ThreadState::Sleeping => write!(f, "Sleeping"),
            ThreadState::DiskSleep => write!(f, "Disk Sleep"),
            ThreadState::Idle => write!(f, "Idle"),
            ThreadState::Stopped => write!(f, "Stopped"),
            ThreadState::Zombie => write!(f, "Zombie"),
            ThreadState::Dead => write!(f, "Dead"),
            ThreadState::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Detail record for one live thread
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    /// OS thread ID
    pub thread_id: u64,
    /// Thread name (comm)
    pub name: String,
    /// Scheduler state at capture time
    pub state: ThreadState,
    /// Whether the thread is a daemon (does not prevent shutdown)
    pub daemon: bool,
    /// User-mode CPU time in seconds
    pub cpu_user_secs: f64,
    /// Kernel-mode CPU time in seconds
    pub cpu_system_secs: f64,
    /// Kernel symbol the thread is blocked in, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_channel: Option<String>,
    /// Captured call-stack frames, innermost first (empty if unavailable)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stack: Vec<String>,
}
