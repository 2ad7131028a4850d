//! JSON export of snapshot views, one record per line.

use crate::snapshot::ThreadMetricsSnapshot;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// A single exported view with capture timestamp
#[derive(Debug, Serialize)]
struct ViewRecord<T: Serialize> {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    view: T,
}

/// Writes snapshot views as JSON Lines to any writer.
///
/// The two views are independent records; no atomicity is guaranteed
/// between exporting the counts and the details of the same snapshot.
pub struct ViewExporter<W: Write> {
    writer: BufWriter<W>,
    records_written: u64,
}

impl ViewExporter<File> {
    /// Create an exporter writing to the specified file, truncating it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path.as_ref())
            .context("Failed to create export file")?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ViewExporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            records_written: 0,
        }
    }

    /// Export the counts view of a snapshot.
    pub fn export_counts(&mut self, snapshot: &ThreadMetricsSnapshot) -> Result<()> {
        self.write_record(snapshot.counts_view())
    }

    /// Export the details view of a snapshot.
    pub fn export_details(&mut self, snapshot: &ThreadMetricsSnapshot) -> Result<()> {
        self.write_record(snapshot.details_view())
    }

    fn write_record<T: Serialize>(&mut self, view: T) -> Result<()> {
        let record = ViewRecord {
            timestamp: Utc::now(),
            view,
        };
        let json = serde_json::to_string(&record)?;
        writeln!(self.writer, "{}", json)?;
        self.records_written += 1;

        // Flush every 10 records to avoid losing data on crash
        if self.records_written % 10 == 0 {
            self.writer.flush()?;
        }
        Ok(())
    }

    /// Flush any buffered data
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Get the number of records written
    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

impl<W: Write> Drop for ViewExporter<W> {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread_info::{ThreadInfo, ThreadState};

    fn sample_snapshot() -> ThreadMetricsSnapshot {
        let mut snap = ThreadMetricsSnapshot::default();
        snap.set_dynamic_data(
            3,
            10,
            7,
            42,
            Some(vec![ThreadInfo {
                thread_id: 1,
                name: "main".to_string(),
                state: ThreadState::Running,
                daemon: false,
                cpu_user_secs: 0.5,
                cpu_system_secs: 0.1,
                wait_channel: None,
                stack: vec!["do_select+0x1/0x2".to_string()],
            }]),
        );
        snap
    }

    fn exported_lines(export: impl FnOnce(&mut ViewExporter<&mut Vec<u8>>)) -> Vec<serde_json::Value> {
        let mut buf = Vec::new();
        {
            let mut exporter = ViewExporter::new(&mut buf);
            export(&mut exporter);
            exporter.flush().unwrap();
        }
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn counts_record_carries_the_four_keys_and_a_timestamp() {
        let snap = sample_snapshot();
        let lines = exported_lines(|e| e.export_counts(&snap).unwrap());
        assert_eq!(lines.len(), 1);
        let record = &lines[0];
        assert_eq!(record["daemonThreadCount"], 3);
        assert_eq!(record["peakThreadCount"], 10);
        assert_eq!(record["liveThreadCount"], 7);
        assert_eq!(record["totalStartedThreadCount"], 42);
        assert!(record["timestamp"].is_string());
    }

    #[test]
    fn details_record_nests_the_thread_info_list() {
        let snap = sample_snapshot();
        let lines = exported_lines(|e| e.export_details(&snap).unwrap());
        let list = &lines[0]["threadInfoList"];
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["name"], "main");
        assert_eq!(list[0]["stack"][0], "do_select+0x1/0x2");
    }

    #[test]
    fn records_written_counts_both_views() {
        let mut buf = Vec::new();
        let snap = sample_snapshot();
        let mut exporter = ViewExporter::new(&mut buf);
        exporter.export_counts(&snap).unwrap();
        exporter.export_details(&snap).unwrap();
        assert_eq!(exporter.records_written(), 2);
    }
}
