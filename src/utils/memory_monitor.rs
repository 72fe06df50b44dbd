//! Peak resident-memory sampling for merge jobs
//!
//! RSS is read from `/proc/self/status` on Linux, falling back to `sysinfo`
//! elsewhere or when procfs is unavailable. Sampling runs on its own task so
//! the blocking merge does not need to cooperate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::utils::human_format::format_memory;

/// Current resident set size of this process in bytes, if it can be read
pub fn current_rss_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    if let Some(rss) = procfs_rss_bytes() {
        return Some(rss);
    }

    sysinfo_rss_bytes()
}

#[cfg(target_os = "linux")]
fn procfs_rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

fn sysinfo_rss_bytes() -> Option<u64> {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    system.process(pid).map(|process| process.memory())
}

/// Background sampler recording the highest RSS seen while it runs
pub struct MemorySampler {
    peak_bytes: Arc<AtomicU64>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl MemorySampler {
    /// Take an initial sample and start sampling every `interval`
    pub fn start(interval: Duration) -> Self {
        let peak_bytes = Arc::new(AtomicU64::new(current_rss_bytes().unwrap_or(0)));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let peak_bytes = peak_bytes.clone();
            let cancel = cancel.clone();
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            if let Some(rss) = current_rss_bytes() {
                                peak_bytes.fetch_max(rss, Ordering::Relaxed);
                                trace!("RSS sample {}", format_memory(rss as f64));
                            }
                        }
                    }
                }
            }
        });

        Self {
            peak_bytes,
            cancel,
            handle: Some(handle),
        }
    }

    /// Peak so far in megabytes
    pub fn peak_mb(&self) -> f64 {
        self.peak_bytes.load(Ordering::Relaxed) as f64 / 1024.0 / 1024.0
    }

    /// Stop sampling and return the peak in megabytes, rounded to two places
    pub async fn stop(mut self) -> f64 {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        if let Some(rss) = current_rss_bytes() {
            self.peak_bytes.fetch_max(rss, Ordering::Relaxed);
        }

        let peak = (self.peak_mb() * 100.0).round() / 100.0;
        debug!("Memory sampler stopped, peak {:.2}MB", peak);
        peak
    }
}

impl Drop for MemorySampler {
    fn drop(&mut self) {
        // Covers callers that bail out without calling stop()
        self.cancel.cancel();
    }
}
