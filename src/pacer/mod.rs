//! Adaptive request pacing.
//!
//! Inter-request delay shrinks while operations succeed and doubles on
//! failure, bounded to [min_delay, max_delay]. Uniform jitter in [0, 1s] is
//! added to every returned delay so a fleet of callers never synchronizes.
//! The pacer itself never fails: callers `wait` before acting and report the
//! previous outcome implicitly through the `success` flag.

use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct PacerSettings {
    pub base_delay: f64,
    pub min_delay: f64,
    pub max_delay: f64,
    pub success_increment: f64,
    pub failure_decrement: f64,
}

impl Default for PacerSettings {
    fn default() -> Self {
        Self {
            base_delay: 2.0,
            min_delay: 0.5,
            max_delay: 10.0,
            success_increment: 0.1,
            failure_decrement: 0.2,
        }
    }
}

impl PacerSettings {
    pub fn from_config(config: &crate::config::ServiceConfig) -> Self {
        Self {
            base_delay: config.adaptive_rate_base_delay,
            min_delay: config.adaptive_rate_min_delay,
            max_delay: config.adaptive_rate_max_delay,
            success_increment: config.adaptive_rate_success_increment,
            failure_decrement: config.adaptive_rate_failure_decrement,
        }
    }
}

#[derive(Debug)]
struct PacerState {
    success_rate: f64,
    current_delay: f64,
    total_requests: u64,
    successful_requests: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PacerStats {
    pub success_rate: f64,
    pub current_delay: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failure_rate: f64,
}

pub struct AdaptivePacer {
    settings: PacerSettings,
    state: Mutex<PacerState>,
}

impl AdaptivePacer {
    pub fn new(settings: PacerSettings) -> Self {
        Self {
            state: Mutex::new(PacerState {
                success_rate: 1.0,
                current_delay: settings.base_delay,
                total_requests: 0,
                successful_requests: 0,
            }),
            settings,
        }
    }

    /// Record an outcome and return the next delay in seconds, jitter
    /// included.
    pub fn next_delay(&self, success: bool) -> f64 {
        let mut state = self.state.lock();
        state.total_requests += 1;

        if success {
            state.successful_requests += 1;
            state.success_rate =
                (state.success_rate + self.settings.success_increment).min(1.0);
            state.current_delay = (state.current_delay * 0.9).max(self.settings.min_delay);
        } else {
            state.success_rate =
                (state.success_rate - self.settings.failure_decrement).max(0.1);
            state.current_delay = (state.current_delay * 2.0).min(self.settings.max_delay);
        }

        let jitter = rand::rng().random_range(0.0..=1.0);
        state.current_delay + jitter
    }

    /// Sleep for the computed delay.
    pub async fn wait(&self, success: bool) {
        let delay = self.next_delay(success);
        if delay > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }
    }

    pub fn stats(&self) -> PacerStats {
        let state = self.state.lock();
        PacerStats {
            success_rate: state.success_rate,
            current_delay: state.current_delay,
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failure_rate: 1.0 - state.success_rate,
        }
    }
}

impl Default for AdaptivePacer {
    fn default() -> Self {
        Self::new(PacerSettings::default())
    }
}
