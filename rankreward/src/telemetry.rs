// src/telemetry.rs
//
// JSONL persistence for trace snapshots.
// - SnapshotSink: trait used by training loops to record snapshots
// - NoopSink:     discards everything
// - JsonlSink:    one TraceSnapshot JSON object per line
//
// The file carries snapshots only, never trace capacity: a trace restored
// from it with RewardTrace::deserialize is unbounded.
//
// Controlled by environment variables (JsonlSink::from_env):
// - RANKREWARD_TRACE_MODE: "off" (default) or "jsonl"
// - RANKREWARD_TRACE_PATH: path to the JSONL file

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::trace::{RewardTrace, TraceSnapshot};

pub const ENV_TRACE_MODE: &str = "RANKREWARD_TRACE_MODE";
pub const ENV_TRACE_PATH: &str = "RANKREWARD_TRACE_PATH";

/// Destination for trace snapshots.
pub trait SnapshotSink {
    fn log_snapshot(&mut self, snapshot: &TraceSnapshot);

    fn flush(&mut self) {}

    /// Record every snapshot currently buffered in `trace`, oldest first.
    fn log_trace(&mut self, trace: &RewardTrace) {
        for snapshot in trace.snapshots() {
            self.log_snapshot(snapshot);
        }
    }
}

/// Sink that discards all snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl SnapshotSink for NoopSink {
    fn log_snapshot(&mut self, _snapshot: &TraceSnapshot) {}
}

/// Append-only JSONL sink.
///
/// The file is opened lazily on the first snapshot. A failed write disables
/// the sink instead of interrupting the training loop.
#[derive(Debug)]
pub struct JsonlSink {
    enabled: bool,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl JsonlSink {
    /// Sink appending to `path`. Parent directories are created on first write.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            path: Some(path.into()),
            writer: None,
            written: 0,
        }
    }

    /// Sink configured from RANKREWARD_TRACE_MODE / RANKREWARD_TRACE_PATH.
    /// Disabled unless the mode is "jsonl" and a path is set.
    pub fn from_env() -> Self {
        let enabled = env::var(ENV_TRACE_MODE)
            .map(|s| s.trim().eq_ignore_ascii_case("jsonl"))
            .unwrap_or(false);
        let path = env::var(ENV_TRACE_PATH).ok().map(PathBuf::from);

        if enabled && path.is_none() {
            tracing::warn!(
                mode_var = ENV_TRACE_MODE,
                path_var = ENV_TRACE_PATH,
                "trace mode is jsonl but no path is set; sink disabled"
            );
        }

        Self {
            enabled: enabled && path.is_some(),
            path,
            writer: None,
            written: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of snapshots written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn ensure_writer(&mut self) -> Option<&mut BufWriter<File>> {
        if !self.enabled {
            return None;
        }

        if self.writer.is_none() {
            let path = self.path.as_ref()?;
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    let _ = std::fs::create_dir_all(parent);
                }
            }

            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(file) => self.writer = Some(BufWriter::new(file)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "cannot open trace log; sink disabled");
                    self.enabled = false;
                    return None;
                }
            }
        }

        self.writer.as_mut()
    }
}

impl SnapshotSink for JsonlSink {
    fn log_snapshot(&mut self, snapshot: &TraceSnapshot) {
        let line = match serde_json::to_string(snapshot) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "cannot encode trace snapshot; skipped");
                return;
            }
        };

        let Some(writer) = self.ensure_writer() else {
            return;
        };

        if let Err(err) = writeln!(writer, "{}", line) {
            tracing::warn!(error = %err, "trace log write failed; sink disabled");
            self.enabled = false;
            self.writer = None;
            return;
        }
        self.written += 1;
    }

    fn flush(&mut self) {
        if let Some(writer) = &mut self.writer {
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        SnapshotSink::flush(self);
    }
}

/// Read a JSONL snapshot log, oldest first.
///
/// Blank lines are skipped; malformed lines are skipped with a warning.
pub fn read_snapshot_log(path: &Path) -> io::Result<Vec<TraceSnapshot>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TraceSnapshot>(&line) {
            Ok(snapshot) => out.push(snapshot),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %err,
                    "skipping malformed trace snapshot"
                );
            }
        }
    }
    Ok(out)
}
