use crate::aggregator::LiveAggregator;
use crate::auth::SessionStore;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use sysinfo::System;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub cameras_configured: u32,
    pub cameras_connected: u32,
    pub weather_status: String,
    pub aggregator_running: bool,
    pub active_sessions: u32,
    pub memory_usage_mb: f32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self { start_time: Instant::now() }
    }

    pub fn get_health(&self, aggregator: &LiveAggregator, sessions: &SessionStore) -> KernelHealth {
        let connectivity = aggregator.connectivity();
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            cameras_configured: connectivity.len() as u32,
            cameras_connected: connectivity.values().filter(|up| **up).count() as u32,
            weather_status: aggregator.weather().label().to_string(),
            aggregator_running: aggregator.is_running(),
            active_sessions: sessions.active_count() as u32,
            memory_usage_mb: get_memory_usage_mb(),
        }
    }
}

/// Resident memory of this process; 0 when the platform does not report it.
fn get_memory_usage_mb() -> f32 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0.0;
    };
    let mut sys = System::new();
    if !sys.refresh_process(pid) {
        return 0.0;
    }
    sys.process(pid)
        .map(|p| p.memory() as f32 / (1024.0 * 1024.0))
        .unwrap_or(0.0)
}
