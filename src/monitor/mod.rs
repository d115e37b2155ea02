//! Resource monitoring.
//!
//! A background task samples process/system CPU, memory, and disk on a
//! fixed interval into a bounded ring, and per-session counters accumulate
//! alongside. The monitor is observational only: it warns on pressure and
//! publishes a recommended session capacity, but never fails an operation.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{Disks, System};
use tokio::task::JoinHandle;

const MAX_HISTORY: usize = 1000;

/// CPU or memory above this percentage triggers a pressure warning.
const PRESSURE_THRESHOLD: f64 = 80.0;

/// Response-time EMA smoothing factor.
const RESPONSE_TIME_ALPHA: f64 = 0.1;

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SystemSample {
    pub timestamp: f64,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub memory_available_gb: f64,
    pub disk_usage_percent: f64,
    pub active_sessions: usize,
    pub recommended_max_sessions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCounters {
    pub session_id: String,
    pub memory_usage_mb: f64,
    pub cpu_usage_percent: f64,
    pub last_activity: f64,
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub avg_response_time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub timestamp: f64,
    pub system: Option<SystemSample>,
    pub total_requests: u64,
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub top_sessions: Vec<SessionCounters>,
}

pub struct ResourceMonitor {
    sessions: DashMap<String, SessionCounters>,
    history: Mutex<VecDeque<SystemSample>>,
    active: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResourceMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            history: Mutex::new(VecDeque::with_capacity(MAX_HISTORY)),
            active: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// Start the background sampling loop. A second start is a no-op.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        if self.active.swap(true, Ordering::SeqCst) {
            warn!("resource monitoring already active");
            return;
        }

        let monitor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut system = System::new();
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately and primes the CPU counters.
            while monitor.active.load(Ordering::SeqCst) {
                ticker.tick().await;
                monitor.collect(&mut system);
            }
        });
        *self.task.lock() = Some(handle);
        info!("resource monitoring started (interval {interval:?})");
    }

    pub fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
        }
        info!("resource monitoring stopped");
    }

    fn collect(&self, system: &mut System) {
        system.refresh_memory();
        system.refresh_cpu_usage();

        let total_memory = system.total_memory();
        let memory_percent = if total_memory > 0 {
            system.used_memory() as f64 / total_memory as f64 * 100.0
        } else {
            0.0
        };
        let memory_available_gb = system.available_memory() as f64 / 1024_f64.powi(3);
        let cpu_percent = f64::from(system.global_cpu_usage());

        let disks = Disks::new_with_refreshed_list();
        let (disk_total, disk_available) = disks
            .iter()
            .fold((0u64, 0u64), |(total, available), disk| {
                (total + disk.total_space(), available + disk.available_space())
            });
        let disk_usage_percent = if disk_total > 0 {
            (disk_total - disk_available) as f64 / disk_total as f64 * 100.0
        } else {
            0.0
        };

        let sample = SystemSample {
            timestamp: unix_now(),
            cpu_percent,
            memory_percent,
            memory_available_gb,
            disk_usage_percent,
            active_sessions: self.sessions.len(),
            recommended_max_sessions: recommended_capacity(memory_available_gb),
        };

        if cpu_percent > PRESSURE_THRESHOLD || memory_percent > PRESSURE_THRESHOLD {
            warn!(
                "high resource usage: cpu {cpu_percent:.1}%, memory {memory_percent:.1}%"
            );
        }

        let mut history = self.history.lock();
        if history.len() >= MAX_HISTORY {
            history.pop_front();
        }
        history.push_back(sample);
    }

    /// Fold one operation outcome into a session's counters.
    pub fn record(
        &self,
        session_id: &str,
        success: bool,
        response_time: f64,
        memory_usage_mb: f64,
        cpu_usage_percent: f64,
    ) {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionCounters {
                session_id: session_id.to_string(),
                memory_usage_mb: 0.0,
                cpu_usage_percent: 0.0,
                last_activity: unix_now(),
                request_count: 0,
                success_count: 0,
                failure_count: 0,
                avg_response_time: 0.0,
            });

        entry.last_activity = unix_now();
        entry.request_count += 1;
        entry.memory_usage_mb = memory_usage_mb;
        entry.cpu_usage_percent = cpu_usage_percent;
        if success {
            entry.success_count += 1;
        } else {
            entry.failure_count += 1;
        }
        if response_time > 0.0 {
            entry.avg_response_time = if entry.avg_response_time == 0.0 {
                response_time
            } else {
                entry.avg_response_time * (1.0 - RESPONSE_TIME_ALPHA)
                    + response_time * RESPONSE_TIME_ALPHA
            };
        }
    }

    pub fn session(&self, session_id: &str) -> Option<SessionCounters> {
        self.sessions.get(session_id).map(|entry| entry.clone())
    }

    pub fn remove_session(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    pub fn latest(&self) -> Option<SystemSample> {
        self.history.lock().back().copied()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn summary(&self) -> MonitorSummary {
        let total_requests: u64 = self.sessions.iter().map(|e| e.request_count).sum();
        let total_successes: u64 = self.sessions.iter().map(|e| e.success_count).sum();
        let success_rate = if total_requests > 0 {
            total_successes as f64 / total_requests as f64
        } else {
            0.0
        };

        let session_count = self.sessions.len();
        let avg_response_time = if session_count > 0 {
            self.sessions.iter().map(|e| e.avg_response_time).sum::<f64>() / session_count as f64
        } else {
            0.0
        };

        let mut top_sessions: Vec<SessionCounters> =
            self.sessions.iter().map(|e| e.clone()).collect();
        top_sessions.sort_by(|a, b| {
            b.memory_usage_mb
                .partial_cmp(&a.memory_usage_mb)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top_sessions.truncate(5);

        MonitorSummary {
            timestamp: unix_now(),
            system: self.latest(),
            total_requests,
            success_rate,
            avg_response_time,
            top_sessions,
        }
    }

    /// Drop counters for sessions idle longer than `max_idle`. Returns how
    /// many were removed.
    pub fn cleanup_idle(&self, max_idle: Duration) -> usize {
        let cutoff = unix_now() - max_idle.as_secs_f64();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.last_activity >= cutoff);
        let removed = before - self.sessions.len();
        if removed > 0 {
            info!("cleaned up {removed} idle session counters");
        }
        removed
    }
}

/// Dynamic session cap from available memory: two sessions per GiB, floored
/// at 5 and capped at 20.
pub fn recommended_capacity(available_gb: f64) -> usize {
    ((available_gb * 2.0) as usize).clamp(5, 20)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_clamps_to_bounds() {
        assert_eq!(recommended_capacity(0.5), 5);
        assert_eq!(recommended_capacity(4.0), 8);
        assert_eq!(recommended_capacity(64.0), 20);
    }

    #[test]
    fn response_time_ema_converges() {
        let monitor = ResourceMonitor::new();
        monitor.record("sess_aaaaaaaa", true, 1.0, 0.0, 0.0);
        for _ in 0..200 {
            monitor.record("sess_aaaaaaaa", true, 3.0, 0.0, 0.0);
        }
        let counters = monitor.session("sess_aaaaaaaa").unwrap();
        assert!((counters.avg_response_time - 3.0).abs() < 0.05);
        assert_eq!(counters.request_count, 201);
    }

    #[test]
    fn idle_cleanup_removes_stale_counters() {
        let monitor = ResourceMonitor::new();
        monitor.record("sess_deadbeef", true, 0.1, 0.0, 0.0);
        assert_eq!(monitor.cleanup_idle(Duration::from_secs(300)), 0);
        assert_eq!(monitor.cleanup_idle(Duration::from_secs(0)), 1);
        assert!(monitor.session("sess_deadbeef").is_none());
    }
}
