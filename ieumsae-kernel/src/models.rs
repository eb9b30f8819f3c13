use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

pub type CameraId = String;

/// camera_id -> connected. Always holds every configured camera.
pub type ConnectionStatus = BTreeMap<CameraId, bool>;

/// One object-recognition event for a camera, newest entries first in buffers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DetectionLog {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub camera_id: CameraId,
    pub objects: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub temperature_celsius: i32,
    pub description: String,
    pub condition_code: u32,
    pub icon_ref: String,
    pub location: String,
    #[serde(with = "time::serde::rfc3339")]
    pub observed_at: OffsetDateTime,
}

impl WeatherSnapshot {
    /// Clear sky at 22°C, shown when no reading has ever succeeded.
    pub fn offline_default(location: &str) -> Self {
        Self {
            temperature_celsius: 22,
            description: "맑음".to_string(),
            condition_code: 800,
            icon_ref: "01d".to_string(),
            location: location.to_string(),
            observed_at: OffsetDateTime::now_utc(),
        }
    }
}

/// The weather slice of the dashboard. Every variant that carries a snapshot
/// carries a complete one.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherState {
    Pending,
    Live { snapshot: WeatherSnapshot },
    Stale { snapshot: WeatherSnapshot, error: String },
    Offline { snapshot: WeatherSnapshot, error: String },
}

impl WeatherState {
    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            WeatherState::Pending => None,
            WeatherState::Live { snapshot }
            | WeatherState::Stale { snapshot, .. }
            | WeatherState::Offline { snapshot, .. } => Some(snapshot),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WeatherState::Pending => "pending",
            WeatherState::Live { .. } => "live",
            WeatherState::Stale { .. } => "stale",
            WeatherState::Offline { .. } => "offline",
        }
    }

    /// State after a failed refresh: keep the last good reading if there is
    /// one, otherwise fall back to the offline default.
    pub fn degrade(&self, error: String, default_location: &str) -> WeatherState {
        match self {
            WeatherState::Live { snapshot } | WeatherState::Stale { snapshot, .. } => {
                WeatherState::Stale { snapshot: snapshot.clone(), error }
            }
            WeatherState::Pending | WeatherState::Offline { .. } => WeatherState::Offline {
                snapshot: WeatherSnapshot::offline_default(default_location),
                error,
            },
        }
    }
}

/// Read-only composite handed to the presentation layer.
#[derive(Debug, Serialize, Clone)]
pub struct DashboardView {
    pub connectivity: ConnectionStatus,
    pub logs: BTreeMap<CameraId, Vec<DetectionLog>>,
    pub weather: WeatherState,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

/// Change notification pushed to subscribers as each slice is replaced.
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    Connectivity { status: ConnectionStatus },
    Detection { log: DetectionLog },
    Weather { state: WeatherState },
}

impl DashboardEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardEvent::Connectivity { .. } => "connectivity",
            DashboardEvent::Detection { .. } => "detection",
            DashboardEvent::Weather { .. } => "weather",
        }
    }
}
