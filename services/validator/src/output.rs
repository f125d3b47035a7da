//! Run output: the per-diagnostic text log and the synthesized summary
//!
//! ```text
//! <output_dir>/<stem>.log           [error][ts=3][ns=300000000] GroundTruth...: ...
//! <output_dir>/<stem>.summary.txt   grouped report, see engine::Summary
//! ```

use crossbeam_channel::Receiver;
use engine::{DiagnosticSink, Summary};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use types::Diagnostic;

/// Appends one line per diagnostic and folds it into the run summary.
///
/// Appends from several threads are serialized by an internal lock; the
/// buffered writer is flushed at blast boundaries.
pub struct TextLogSink {
    path: PathBuf,
    state: Mutex<LogState>,
}

struct LogState {
    writer: BufWriter<File>,
    summary: Summary,
    lines: usize,
    write_failed: bool,
}

impl TextLogSink {
    /// Create (truncate) the log file, creating parent directories.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = File::create(&path)?;
        debug!("Writing diagnostics to {}", path.display());

        Ok(Self {
            path,
            state: Mutex::new(LogState {
                writer: BufWriter::new(file),
                summary: Summary::new(),
                lines: 0,
                write_failed: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Diagnostics recorded so far
    pub fn lines(&self) -> usize {
        self.state.lock().lines
    }

    /// Flush the log and hand back the accumulated summary
    pub fn finish(self) -> io::Result<Summary> {
        let mut state = self.state.into_inner();
        state.writer.flush()?;
        Ok(state.summary)
    }
}

impl DiagnosticSink for TextLogSink {
    fn record(&self, diagnostic: Diagnostic) {
        let mut state = self.state.lock();
        if let Err(e) = writeln!(state.writer, "{}", diagnostic) {
            if !state.write_failed {
                warn!("Failed to write to {}: {}", self.path.display(), e);
                state.write_failed = true;
            }
        }
        state.lines += 1;
        state.summary.add(&diagnostic);
    }

    fn flush(&self) {
        if let Err(e) = self.state.lock().writer.flush() {
            warn!("Failed to flush {}: {}", self.path.display(), e);
        }
    }
}

/// Writer-thread loop: forward everything workers send until the last
/// sender is dropped.
pub fn drain(receiver: Receiver<Diagnostic>, sink: &dyn DiagnosticSink) -> usize {
    let mut forwarded = 0;
    for diagnostic in receiver {
        sink.record(diagnostic);
        forwarded += 1;
    }
    forwarded
}

/// Output file stem of a trace: compression suffix and extension removed.
///
/// `20240101T000000Z_gt_run.osi.xz` → `20240101T000000Z_gt_run`
pub fn trace_stem(trace: &Path) -> String {
    let name = trace
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());

    let lower = name.to_ascii_lowercase();
    let without_compression = [".xz", ".lzma"]
        .iter()
        .find(|suffix| lower.ends_with(*suffix))
        .map_or(name.as_str(), |suffix| &name[..name.len() - suffix.len()]);

    match without_compression.rfind('.') {
        Some(dot) if dot > 0 => without_compression[..dot].to_string(),
        _ => without_compression.to_string(),
    }
}

/// Write the summary report next to the log
pub fn write_summary(path: &Path, summary: &Summary) -> io::Result<()> {
    fs::write(path, summary.to_string())
}
