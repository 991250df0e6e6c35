//! Byte-level progress shared between a transfer and the task reporting it.
//!
//! Transfers bump the counters as data moves; a reporter samples [`Progress::snapshot`]
//! on a fixed interval and renders percent, ETA and speed. Samples are advisory UI
//! ticks and never influence the transfer itself.

use std::fmt::Write as _;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, ReadBuf};

use crate::core::config;
use crate::core::utils::format_clock;

/// Tracks transferred and expected bytes.
///
/// Clones share the same counters.
#[derive(Clone, Debug)]
pub struct Progress {
    done: Arc<AtomicU64>,
    total: Arc<AtomicU64>,
    started: Instant,
}

impl Progress {
    pub fn new() -> Self {
        Self {
            done: Arc::new(AtomicU64::new(0)),
            total: Arc::new(AtomicU64::new(0)),
            started: Instant::now(),
        }
    }

    /// Progress for a transfer of known size.
    pub fn with_total(total: u64) -> Self {
        let progress = Self::new();
        progress.set_total(total);
        progress
    }

    pub fn add_bytes(&self, bytes: usize) {
        self.done.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn set_done(&self, bytes: u64) {
        self.done.store(bytes, Ordering::Relaxed);
    }

    pub fn set_total(&self, bytes: u64) {
        self.total.store(bytes, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressState {
        ProgressState {
            downloaded: self.done.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

/// One sample of a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressState {
    pub downloaded: u64,
    /// `0` while the size is still unknown
    pub total: u64,
    pub elapsed: Duration,
}

impl ProgressState {
    /// Percent in `0.0..=100.0`; `0.0` while the size is unknown.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.downloaded as f64 / self.total as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Average bytes per second since the transfer started.
    pub fn bytes_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.downloaded as f64 / secs
    }

    /// Remaining time as `mm:ss`/`hh:mm:ss`.
    ///
    /// `calculating...` before the first byte, `unknown` when the rate is not positive.
    pub fn eta(&self) -> String {
        if self.downloaded == 0 {
            return "calculating...".to_string();
        }
        let rate = self.bytes_per_sec();
        if !(rate > 0.0) || !rate.is_finite() {
            return "unknown".to_string();
        }
        let remaining = self.total.saturating_sub(self.downloaded) as f64;
        format_clock((remaining / rate).round() as u64)
    }

    pub fn speed(&self) -> String {
        format_speed(self.bytes_per_sec())
    }

    pub fn total_mib(&self) -> f64 {
        self.total as f64 / (1024.0 * 1024.0)
    }

    /// Multi-line HTML status shown while a transfer runs.
    pub fn render(&self, action: &str, name: &str) -> String {
        let percent = self.percent();
        let mut text = String::new();
        let _ = writeln!(text, "<b>~ {} ~</b>\n", action);
        let _ = writeln!(text, "<b>📄 Name:</b> <code>{}</code>", teloxide::utils::html::escape(name));
        let _ = writeln!(text, "<b>💾 File Size:</b> <code>{:.2} MiB</code>", self.total_mib());
        let _ = writeln!(text, "<b>⌛️ ETA:</b> <code>{}</code>", self.eta());
        let _ = writeln!(text, "<b>⏱ Speed:</b> <code>{}</code>", self.speed());
        let _ = write!(
            text,
            "<b>⚙️ Progress:</b> {} <code>{:.2}%</code>",
            progress_bar(percent, config::progress::BAR_LENGTH),
            percent
        );
        text
    }
}

/// Formats a rate with the largest sensible unit.
pub fn format_speed(bytes_per_sec: f64) -> String {
    if !(bytes_per_sec > 0.0) || !bytes_per_sec.is_finite() {
        return "0 B/s".to_string();
    }
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    if bytes_per_sec >= MB {
        format!("{:.2} MB/s", bytes_per_sec / MB)
    } else if bytes_per_sec >= KB {
        format!("{:.2} KB/s", bytes_per_sec / KB)
    } else {
        format!("{:.2} B/s", bytes_per_sec)
    }
}

/// `■■■□□□□□□□` style bar.
pub fn progress_bar(percent: f64, length: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * length as f64) as usize;
    let filled = filled.min(length);
    format!("{}{}", "■".repeat(filled), "□".repeat(length - filled))
}

/// An `AsyncRead` wrapper that counts bytes into a [`Progress`].
pub struct ProgressReader<R> {
    inner: R,
    progress: Progress,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, progress: Progress) -> Self {
        Self { inner, progress }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let after = buf.filled().len();
            if after > before {
                self.progress.add_bytes(after - before);
            }
        }
        poll
    }
}
