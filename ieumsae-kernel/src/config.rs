use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::{path::Path, time::Duration};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub bind: String,
    pub cameras: Vec<CameraConfig>,
    pub labels: Vec<String>,
    pub log_capacity: usize,
    pub intervals: IntervalsConf,
    pub probe: ProbeConf,
    pub weather: WeatherConf,
    pub auth: AuthConf,
    pub query: QueryMode,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    pub id: String,
    pub url: String, // rtsp://host:port/path or http(s)://.../index.m3u8
    #[serde(default = "default_pass_probability")]
    pub pass_probability: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct IntervalsConf {
    pub connectivity_ms: u64,
    pub logs_ms: u64,
    pub weather_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    Simulated,
    Tcp,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ProbeConf {
    pub mode: ProbeMode,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GeolocationConf {
    Disabled,
    Fixed { lat: f64, lon: f64 },
    Ip { url: String },
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct WeatherConf {
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub kakao_api_key: Option<String>,
    pub kakao_base_url: String,
    pub geolocation: GeolocationConf,
    pub default_city: String,
    pub default_location: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConf {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub session_ttl_secs: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryMode {
    Mock,
    Backend { url: String },
}

fn default_pass_probability() -> f64 {
    0.9
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            cameras: vec![
                CameraConfig {
                    id: "camera1".into(),
                    url: "rtsp://192.168.0.30:8554/stream".into(),
                    pass_probability: 0.9,
                },
                CameraConfig {
                    id: "camera2".into(),
                    url: "rtsp://192.168.0.100:8554/webcam2".into(),
                    pass_probability: 0.9,
                },
                CameraConfig {
                    id: "camera3".into(),
                    url: "rtsp://127.128.56.7/stream".into(),
                    pass_probability: 0.8,
                },
            ],
            labels: ["person", "car", "truck", "bicycle", "bus"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            log_capacity: 30,
            intervals: IntervalsConf::default(),
            probe: ProbeConf::default(),
            weather: WeatherConf::default(),
            auth: AuthConf::default(),
            query: QueryMode::default(),
        }
    }
}

impl Default for IntervalsConf {
    fn default() -> Self {
        Self { connectivity_ms: 5_000, logs_ms: 3_000, weather_ms: 300_000 }
    }
}

impl Default for ProbeConf {
    fn default() -> Self {
        Self { mode: ProbeMode::Simulated, timeout_ms: 2_000 }
    }
}

impl Default for WeatherConf {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openweathermap.org/data/2.5/weather".into(),
            kakao_api_key: None,
            kakao_base_url: "https://dapi.kakao.com/v2/local/geo/coord2regioncode.json".into(),
            geolocation: GeolocationConf::Disabled,
            default_city: "Seoul".into(),
            default_location: "Seoul".into(),
            timeout_ms: 10_000,
        }
    }
}

impl Default for AuthConf {
    fn default() -> Self {
        Self { username: "admin".into(), password: "kopo123".into(), session_ttl_secs: 24 * 3600 }
    }
}

impl Default for QueryMode {
    fn default() -> Self {
        QueryMode::Mock
    }
}

impl IntervalsConf {
    pub fn connectivity(&self) -> Duration {
        Duration::from_millis(self.connectivity_ms)
    }

    pub fn logs(&self) -> Duration {
        Duration::from_millis(self.logs_ms)
    }

    pub fn weather(&self) -> Duration {
        Duration::from_millis(self.weather_ms)
    }
}

impl ProbeConf {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl WeatherConf {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DashboardConfig {
    pub fn camera_ids(&self) -> Vec<String> {
        self.cameras.iter().map(|c| c.id.clone()).collect()
    }

    /// Applies overrides from a variable lookup (the process env in `load_config`).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("IEUMSAE_WEATHER_API_KEY").or_else(|| non_empty("VITE_WEATHER_API_KEY")) {
            self.weather.api_key = Some(key);
        }
        if let Some(key) = non_empty("IEUMSAE_KAKAO_API_KEY") {
            self.weather.kakao_api_key = Some(key);
        }
        if let Some(user) = non_empty("IEUMSAE_ADMIN_USERNAME") {
            self.auth.username = user;
        }
        if let Some(password) = non_empty("IEUMSAE_ADMIN_PASSWORD") {
            self.auth.password = password;
        }
        if let Some(bind) = non_empty("IEUMSAE_BIND") {
            self.bind = bind;
        }
        if let Some(url) = non_empty("IEUMSAE_QUERY_BACKEND") {
            self.query = QueryMode::Backend { url };
        }
    }

    /// Clamps probabilities, drops duplicate camera ids and zero intervals.
    pub fn sanitize(&mut self) {
        let mut seen = HashSet::new();
        self.cameras.retain(|c| {
            let fresh = seen.insert(c.id.clone());
            if !fresh {
                warn!(camera_id = %c.id, "duplicate camera id ignored");
            }
            fresh
        });
        for camera in &mut self.cameras {
            if !(0.0..=1.0).contains(&camera.pass_probability) {
                warn!(camera_id = %camera.id, p = camera.pass_probability, "pass_probability clamped to [0, 1]");
                camera.pass_probability = camera.pass_probability.clamp(0.0, 1.0);
            }
            if camera.pass_probability.is_nan() {
                camera.pass_probability = 0.0;
            }
        }
        let defaults = IntervalsConf::default();
        if self.intervals.connectivity_ms == 0 {
            self.intervals.connectivity_ms = defaults.connectivity_ms;
        }
        if self.intervals.logs_ms == 0 {
            self.intervals.logs_ms = defaults.logs_ms;
        }
        if self.intervals.weather_ms == 0 {
            self.intervals.weather_ms = defaults.weather_ms;
        }
        self.log_capacity = self.log_capacity.max(1);
    }
}

pub fn parse_config(txt: &str) -> Result<DashboardConfig, ConfigError> {
    if txt.trim().is_empty() {
        return Ok(DashboardConfig::default());
    }
    Ok(serde_yaml::from_str(txt)?)
}

pub async fn load_config_from(path: &Path) -> Result<DashboardConfig, ConfigError> {
    let txt = fs::read_to_string(path).await?;
    parse_config(&txt)
}

pub async fn load_config() -> DashboardConfig {
    let path = std::env::var("IEUMSAE_CONFIG").unwrap_or_else(|_| "dashboard.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        load_config_from(Path::new(&path)).await.unwrap_or_else(|e| {
            warn!(%path, error = %e, "invalid config, using defaults");
            DashboardConfig::default()
        })
    } else {
        info!(%path, "no config file, using defaults");
        DashboardConfig::default()
    };
    cfg.apply_overrides(|key| std::env::var(key).ok());
    cfg.sanitize();
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.cameras.len(), 3);
        assert_eq!(cfg.cameras[2].pass_probability, 0.8);
        assert_eq!(cfg.log_capacity, 30);
        assert_eq!(cfg.intervals.connectivity(), Duration::from_millis(5000));
        assert_eq!(cfg.intervals.logs(), Duration::from_millis(3000));
        assert_eq!(cfg.intervals.weather(), Duration::from_millis(300_000));
        assert_eq!(cfg.query, QueryMode::Mock);
        assert_eq!(cfg.weather.geolocation, GeolocationConf::Disabled);
    }

    #[test]
    fn test_parse_partial_yaml_keeps_defaults() {
        let cfg = parse_config(
            r#"
cameras:
  - id: gate
    url: rtsp://10.0.0.5/live
    pass_probability: 0.5
weather:
  geolocation:
    mode: fixed
    lat: 35.1
    lon: 129.0
query:
  mode: backend
  url: http://localhost:5000/api/query
"#,
        )
        .unwrap();
        assert_eq!(cfg.cameras.len(), 1);
        assert_eq!(cfg.cameras[0].id, "gate");
        assert_eq!(cfg.log_capacity, 30);
        assert_eq!(cfg.weather.geolocation, GeolocationConf::Fixed { lat: 35.1, lon: 129.0 });
        assert_eq!(cfg.weather.default_city, "Seoul");
        assert_eq!(
            cfg.query,
            QueryMode::Backend { url: "http://localhost:5000/api/query".into() }
        );
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let cfg = parse_config("   \n").unwrap();
        assert_eq!(cfg.cameras.len(), 3);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(matches!(parse_config("cameras: [oops"), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("VITE_WEATHER_API_KEY", "owm-key"),
            ("IEUMSAE_KAKAO_API_KEY", "kakao-key"),
            ("IEUMSAE_ADMIN_PASSWORD", "s3cret"),
            ("IEUMSAE_BIND", "127.0.0.1:9000"),
            ("IEUMSAE_ADMIN_USERNAME", "  "),
        ]
        .into_iter()
        .collect();
        let mut cfg = DashboardConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.weather.api_key.as_deref(), Some("owm-key"));
        assert_eq!(cfg.weather.kakao_api_key.as_deref(), Some("kakao-key"));
        assert_eq!(cfg.auth.password, "s3cret");
        assert_eq!(cfg.auth.username, "admin");
        assert_eq!(cfg.bind, "127.0.0.1:9000");
    }

    #[test]
    fn test_sanitize_clamps_and_dedups() {
        let mut cfg = DashboardConfig::default();
        cfg.cameras[0].pass_probability = 1.7;
        cfg.cameras[1].pass_probability = -0.2;
        cfg.cameras.push(cfg.cameras[2].clone());
        cfg.intervals.logs_ms = 0;
        cfg.log_capacity = 0;
        cfg.sanitize();

        assert_eq!(cfg.cameras.len(), 3);
        assert_eq!(cfg.cameras[0].pass_probability, 1.0);
        assert_eq!(cfg.cameras[1].pass_probability, 0.0);
        assert_eq!(cfg.intervals.logs_ms, 3_000);
        assert_eq!(cfg.log_capacity, 1);
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.yaml");
        std::fs::write(&path, "log_capacity: 12\nlabels: [person]\n").unwrap();

        let cfg = load_config_from(&path).await.unwrap();
        assert_eq!(cfg.log_capacity, 12);
        assert_eq!(cfg.labels, vec!["person".to_string()]);
    }
}
