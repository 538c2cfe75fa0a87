use crate::entry::FileEntry;
use std::time::{Duration, Instant};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Counts and byte volume of one import run, plus a throughput-based ETA.
///
/// Totals are fixed when the tracker is created. Remaining values move down
/// as files are dequeued and are only restored for a file whose write failed.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    total_count: usize,
    total_bytes: u64,
    remaining_count: usize,
    remaining_bytes: u64,
    last_file_bytes: u64,
    last_update: Option<Instant>,
}

impl ProgressTracker {
    pub fn snapshot<'a, I>(files: I) -> Self
    where
        I: IntoIterator<Item = &'a Box<dyn FileEntry>>,
    {
        let (total_count, total_bytes) = files
            .into_iter()
            .fold((0usize, 0u64), |(count, bytes), file| (count + 1, bytes + file.size()));
        Self {
            total_count,
            total_bytes,
            remaining_count: total_count,
            remaining_bytes: total_bytes,
            last_file_bytes: 0,
            last_update: None,
        }
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn remaining_count(&self) -> usize {
        self.remaining_count
    }

    pub fn remaining_bytes(&self) -> u64 {
        self.remaining_bytes
    }

    pub fn processed_count(&self) -> usize {
        self.total_count - self.remaining_count
    }

    pub fn on_file_dequeued(&mut self, size: u64) {
        self.on_file_dequeued_at(size, Instant::now());
    }

    pub(crate) fn on_file_dequeued_at(&mut self, size: u64, now: Instant) {
        self.remaining_count = self.remaining_count.saturating_sub(1);
        self.remaining_bytes = self.remaining_bytes.saturating_sub(size);
        self.last_file_bytes = size;
        self.last_update = Some(now);
    }

    /// Puts a failed file back into the remaining totals.
    pub fn on_file_requeued(&mut self, size: u64) {
        self.remaining_count = (self.remaining_count + 1).min(self.total_count);
        self.remaining_bytes = self.remaining_bytes.saturating_add(size).min(self.total_bytes);
    }

    pub fn remaining_time_estimate(&self) -> Option<Duration> {
        self.remaining_time_estimate_at(Instant::now())
    }

    pub(crate) fn remaining_time_estimate_at(&self, now: Instant) -> Option<Duration> {
        let last_update = self.last_update?;
        if self.last_file_bytes == 0 {
            return None;
        }
        let elapsed = now.saturating_duration_since(last_update).as_secs_f64();
        let estimate = elapsed * self.remaining_bytes as f64 / self.last_file_bytes as f64;
        Duration::try_from_secs_f64(estimate).ok()
    }

    /// Formatted ETA, empty until the first file is dequeued.
    pub fn remaining_time_label(&self) -> String {
        self.remaining_time_estimate()
            .map(format_duration)
            .unwrap_or_default()
    }

    /// Bytes handled so far.
    pub fn size_label(&self) -> String {
        format_size(self.total_bytes - self.remaining_bytes)
    }

    pub fn total_size_label(&self) -> String {
        format_size(self.total_bytes)
    }

    pub fn progress_label(&self) -> String {
        format!(
            "Adding media files ({} / {})\n{}/{} ({} left)",
            self.processed_count(),
            self.total_count,
            self.size_label(),
            self.total_size_label(),
            self.remaining_time_label()
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let seconds = total % 60;
    let minutes = (total % 3600) / 60;
    let hours = (total % 86_400) / 3600;
    let days = total / 86_400;

    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in SIZE_UNITS {
        if size < 1000.0 {
            return format!("{size:3.1}{unit}");
        }
        size /= 1000.0;
    }
    format!("{size:.1}TB")
}
