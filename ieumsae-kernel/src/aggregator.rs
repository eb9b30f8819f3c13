/**
 * LIVE AGGREGATOR - Polling-driven view model of the dashboard
 *
 * ROLE:
 * Owns the three state slices the dashboard renders and the timer tasks that
 * write them:
 * - connectivity: full `ConnectionStatus` replaced every probe tick
 * - logs: one bounded `LogBuffer` per camera, one timer per camera
 * - weather: one `WeatherState` replaced after every fetch chain
 *
 * CONCURRENCY:
 * Each slice has exactly one writer task and its own lock; a write is a single
 * replace (or a single push) under that lock, so readers never see a torn
 * slice and producers never wait on each other.
 *
 * LIFECYCLE:
 * `start()` spawns the timers, `shutdown()` aborts them and waits until they
 * are gone. An in-flight weather chain is dropped with its task, so nothing
 * is written after `shutdown()` returns.
 */

use crate::config::{CameraConfig, DashboardConfig};
use crate::connectivity::{probe_all, ConnectivityProbe};
use crate::log_buffer::{simulate_detection, LogBuffer};
use crate::models::{ConnectionStatus, DashboardEvent, DashboardView, DetectionLog, WeatherState};
use crate::state::{new_state, replace, Shared};
use crate::weather::WeatherFetcher;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct Schedule {
    pub connectivity: Duration,
    pub logs: Duration,
    pub weather: Duration,
}

pub struct LiveAggregator {
    cameras: Arc<Vec<CameraConfig>>,
    labels: Arc<Vec<String>>,
    schedule: Schedule,
    probe: Arc<dyn ConnectivityProbe>,
    fetcher: Arc<WeatherFetcher>,
    connectivity: Shared<ConnectionStatus>,
    logs: BTreeMap<String, Shared<LogBuffer>>,
    weather: Shared<WeatherState>,
    events: broadcast::Sender<DashboardEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LiveAggregator {
    pub fn new(cfg: &DashboardConfig, probe: Arc<dyn ConnectivityProbe>, fetcher: WeatherFetcher) -> Self {
        let schedule = Schedule {
            connectivity: cfg.intervals.connectivity(),
            logs: cfg.intervals.logs(),
            weather: cfg.intervals.weather(),
        };
        // Every camera is present (disconnected) before the first probe lands.
        let initial: ConnectionStatus = cfg.cameras.iter().map(|c| (c.id.clone(), false)).collect();
        let logs = cfg
            .cameras
            .iter()
            .map(|c| (c.id.clone(), new_state(LogBuffer::new(cfg.log_capacity))))
            .collect();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            cameras: Arc::new(cfg.cameras.clone()),
            labels: Arc::new(cfg.labels.clone()),
            schedule,
            probe,
            fetcher: Arc::new(fetcher),
            connectivity: new_state(initial),
            logs,
            weather: new_state(WeatherState::Pending),
            events,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn cameras(&self) -> &[CameraConfig] {
        &self.cameras
    }

    /// Spawns the connectivity, per-camera log and weather timers.
    /// Calling it on a running aggregator is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() {
            return;
        }
        tasks.push(self.spawn_connectivity_loop());
        for camera in self.cameras.iter() {
            tasks.push(self.spawn_log_loop(&camera.id));
        }
        tasks.push(self.spawn_weather_loop());
        info!(
            cameras = self.cameras.len(),
            connectivity_ms = self.schedule.connectivity.as_millis() as u64,
            logs_ms = self.schedule.logs.as_millis() as u64,
            weather_ms = self.schedule.weather.as_millis() as u64,
            "aggregator started"
        );
    }

    /// Cancels every timer and waits for the tasks to finish.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        let count = tasks.len();
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            // Cancelled is the expected outcome here.
            let _ = task.await;
        }
        info!(tasks = count, "aggregator stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.lock().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn connectivity(&self) -> ConnectionStatus {
        self.connectivity.lock().clone()
    }

    pub fn camera_logs(&self, camera_id: &str) -> Option<Vec<DetectionLog>> {
        self.logs.get(camera_id).map(|buffer| buffer.lock().to_vec())
    }

    pub fn weather(&self) -> WeatherState {
        self.weather.lock().clone()
    }

    /// Read-only composite; each slice is copied under its own lock.
    pub fn snapshot(&self) -> DashboardView {
        DashboardView {
            connectivity: self.connectivity(),
            logs: self
                .logs
                .iter()
                .map(|(id, buffer)| (id.clone(), buffer.lock().to_vec()))
                .collect(),
            weather: self.weather(),
            generated_at: OffsetDateTime::now_utc(),
        }
    }

    fn spawn_connectivity_loop(&self) -> JoinHandle<()> {
        let cameras = self.cameras.clone();
        let probe = self.probe.clone();
        let slot = self.connectivity.clone();
        let events = self.events.clone();
        let period = self.schedule.connectivity;

        tokio::spawn(async move {
            // First tick fires immediately: one eager probe at startup.
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = probe_all(&cameras, probe.as_ref()).await;
                let online = status.values().filter(|up| **up).count();
                replace(&slot, status.clone());
                debug!(online, total = status.len(), "connectivity updated");
                let _ = events.send(DashboardEvent::Connectivity { status });
            }
        })
    }

    fn spawn_log_loop(&self, camera_id: &str) -> JoinHandle<()> {
        let camera_id = camera_id.to_string();
        let labels = self.labels.clone();
        let events = self.events.clone();
        let period = self.schedule.logs;
        let slot = self.logs.get(&camera_id).cloned();

        tokio::spawn(async move {
            let Some(slot) = slot else { return };
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let log = simulate_detection(&camera_id, &labels);
                slot.lock().push(log.clone());
                let _ = events.send(DashboardEvent::Detection { log });
            }
        })
    }

    fn spawn_weather_loop(&self) -> JoinHandle<()> {
        let fetcher = self.fetcher.clone();
        let slot = self.weather.clone();
        let events = self.events.clone();
        let period = self.schedule.weather;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Sole writer of this slice, so read-then-replace cannot race.
                let previous = slot.lock().clone();
                let next = fetcher.refresh(&previous).await;
                debug!(status = next.label(), "weather updated");
                replace(&slot, next.clone());
                let _ = events.send(DashboardEvent::Weather { state: next });
            }
        })
    }
}

impl Drop for LiveAggregator {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
    }
}
