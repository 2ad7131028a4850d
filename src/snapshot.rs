//! Point-in-time thread metrics snapshot and its export views.

use crate::thread_info::ThreadInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Thread-pool statistics captured in one observation cycle.
///
/// A plain value object: fields are set by an observer (ideally all at once
/// via [`set_dynamic_data`](Self::set_dynamic_data)) and read back through
/// the two view methods. Nothing here validates ranges or cross-field
/// consistency; a snapshot built from a single observation will satisfy
/// `live_thread_count >= daemon_thread_count`, but the type does not
/// enforce it. Concurrent mutation and read need external synchronization,
/// or simply build a fresh snapshot per cycle and swap the reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMetricsSnapshot {
    /// Current number of live daemon threads
    pub daemon_thread_count: i32,
    /// Peak live thread count since start or last reset
    pub peak_thread_count: i32,
    /// Current number of live threads, daemon and non-daemon
    pub live_thread_count: i32,
    /// Total number of threads started since the monitored runtime began
    pub total_started_thread_count: i64,
    /// Per-thread detail records, `None` until populated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_details: Option<Vec<ThreadInfo>>,
}

impl ThreadMetricsSnapshot {
    /// Replace all five fields in one call.
    ///
    /// Upstream observers should prefer this over touching fields
    /// individually so a reader never sees a torn mix of two cycles.
    /// Inputs are not validated; negative counts are stored as given.
    pub fn set_dynamic_data(
        &mut self,
        daemon_thread_count: i32,
        peak_thread_count: i32,
        live_thread_count: i32,
        total_started_thread_count: i64,
        thread_details: Option<Vec<ThreadInfo>>,
    ) {
        self.daemon_thread_count = daemon_thread_count;
        self.peak_thread_count = peak_thread_count;
        self.live_thread_count = live_thread_count;
        self.total_started_thread_count = total_started_thread_count;
        self.thread_details = thread_details;
    }

    /// Count-valued fields as a name-keyed map.
    ///
    /// The 64-bit started count is narrowed with `as i32`, a
    /// two's-complement truncation once the value exceeds `i32::MAX`.
    /// Known lossy conversion, kept for compatibility with the historical
    /// counts format.
    pub fn counts_view(&self) -> HashMap<&'static str, i32> {
        let mut map = HashMap::new();
        map.insert("daemonThreadCount", self.daemon_thread_count);
        map.insert("peakThreadCount", self.peak_thread_count);
        map.insert("liveThreadCount", self.live_thread_count);
        map.insert(
            "totalStartedThreadCount",
            self.total_started_thread_count as i32,
        );
        map
    }

    /// Thread dump data as a name-keyed map.
    ///
    /// Unset details are exported as an empty list.
    pub fn details_view(&self) -> HashMap<&'static str, Vec<ThreadInfo>> {
        let mut map = HashMap::new();
        map.insert(
            "threadInfoList",
            self.thread_details.clone().unwrap_or_default(),
        );
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_info::{ThreadInfo, ThreadState};

    fn detail(tid: u64, name: &str) -> ThreadInfo {
        ThreadInfo {
            thread_id: tid,
            name: name.to_string(),
            state: ThreadState::Sleeping,
            daemon: false,
            cpu_user_secs: 0.0,
            cpu_system_secs: 0.0,
            wait_channel: None,
            stack: Vec::new(),
        }
    }

    #[test]
    fn default_is_zeroed_with_unset_details() {
        let snap = ThreadMetricsSnapshot::default();
        assert_eq!(snap.daemon_thread_count, 0);
        assert_eq!(snap.peak_thread_count, 0);
        assert_eq!(snap.live_thread_count, 0);
        assert_eq!(snap.total_started_thread_count, 0);
        assert!(snap.thread_details.is_none());
        assert!(snap.details_view()["threadInfoList"].is_empty());
    }

    #[test]
    fn set_dynamic_data_round_trips_every_field() {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.set_dynamic_data(3, 10, 7, 42, Some(vec![detail(1, "main")]));
        assert_eq!(snap.daemon_thread_count, 3);
        assert_eq!(snap.peak_thread_count, 10);
        assert_eq!(snap.live_thread_count, 7);
        assert_eq!(snap.total_started_thread_count, 42);
        assert_eq!(snap.thread_details.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn negative_inputs_are_stored_unvalidated() {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.set_dynamic_data(-1, -2, -3, -4, None);
        assert_eq!(snap.counts_view()["daemonThreadCount"], -1);
        assert_eq!(snap.counts_view()["totalStartedThreadCount"], -4);
    }

    #[test]
    fn counts_view_has_exactly_the_four_keys() {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.set_dynamic_data(3, 10, 7, 42, None);
        let view = snap.counts_view();
        assert_eq!(view.len(), 4);
        assert_eq!(view["daemonThreadCount"], 3);
        assert_eq!(view["peakThreadCount"], 10);
        assert_eq!(view["liveThreadCount"], 7);
        assert_eq!(view["totalStartedThreadCount"], 42);
    }

    #[test]
    fn counts_view_truncates_started_count_to_32_bits() {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.total_started_thread_count = 5_000_000_000;
        // 5_000_000_000 mod 2^32, interpreted as a signed 32-bit value
        assert_eq!(snap.counts_view()["totalStartedThreadCount"], 705_032_704);
    }

    #[test]
    fn details_view_preserves_order() {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.set_dynamic_data(0, 0, 2, 2, Some(vec![detail(7, "a"), detail(8, "b")]));
        let view = snap.details_view();
        assert_eq!(view.len(), 1);
        let list = &view["threadInfoList"];
        assert_eq!(list[0].thread_id, 7);
        assert_eq!(list[1].thread_id, 8);
    }

    #[test]
    fn individual_field_writes_leave_others_untouched() {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.set_dynamic_data(3, 10, 7, 42, None);
        snap.peak_thread_count = 11;
        assert_eq!(snap.daemon_thread_count, 3);
        assert_eq!(snap.live_thread_count, 7);
        assert_eq!(snap.total_started_thread_count, 42);
        assert_eq!(snap.peak_thread_count, 11);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.set_dynamic_data(1, 2, 3, 4, None);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["daemonThreadCount"], 1);
        assert_eq!(json["totalStartedThreadCount"], 4);
        assert!(json.get("threadDetails").is_none());
    }
}
