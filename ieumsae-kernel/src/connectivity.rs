use crate::config::CameraConfig;
use crate::models::ConnectionStatus;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Reachability check for one camera stream. Never fails: anything that is
/// not a positive answer within the probe's own budget is "not connected".
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self, camera: &CameraConfig) -> bool;
}

/// Weighted coin flip per camera (`pass_probability`).
pub struct SimulatedProbe;

#[async_trait]
impl ConnectivityProbe for SimulatedProbe {
    async fn probe(&self, camera: &CameraConfig) -> bool {
        let p = camera.pass_probability.clamp(0.0, 1.0);
        rand::thread_rng().gen_bool(p)
    }
}

/// Opens a TCP connection to the stream's host:port.
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&self, camera: &CameraConfig) -> bool {
        let Some((host, port)) = stream_address(&camera.url) else {
            debug!(camera_id = %camera.id, url = %camera.url, "unparseable stream url");
            return false;
        };
        match tokio::time::timeout(self.timeout, TcpStream::connect((host.as_str(), port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(camera_id = %camera.id, error = %e, "stream unreachable");
                false
            }
            Err(_) => {
                debug!(camera_id = %camera.id, "probe timed out");
                false
            }
        }
    }
}

/// Host and port of a stream URL. IPv6 literals come back without brackets.
/// Port defaults: rtsp 554, http 80, https 443.
pub fn stream_address(url: &str) -> Option<(String, u16)> {
    let url = reqwest::Url::parse(url).ok()?;
    let default_port = match url.scheme() {
        "rtsp" => 554,
        "http" => 80,
        "https" => 443,
        _ => return None,
    };
    let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), url.port().unwrap_or(default_port)))
}

/// Probes every camera concurrently and returns a mapping that covers
/// exactly the configured set.
pub async fn probe_all(cameras: &[CameraConfig], probe: &dyn ConnectivityProbe) -> ConnectionStatus {
    let checks = cameras.iter().map(|camera| async move { (camera.id.clone(), probe.probe(camera).await) });
    futures::future::join_all(checks).await.into_iter().collect()
}
