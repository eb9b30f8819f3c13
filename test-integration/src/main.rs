use anyhow::{bail, ensure, Context, Result};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

// ===== Configuration =====
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const MAX_LOGS_PER_CAMERA: usize = 30;

// ===== Data Structures =====
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct DashboardView {
    connectivity: BTreeMap<String, bool>,
    logs: BTreeMap<String, Vec<serde_json::Value>>,
    weather: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Camera {
    id: String,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Vec<serde_json::Value>,
    #[serde(rename = "chartData")]
    chart_data: Option<Vec<serde_json::Value>>,
}

/// Smoke run against a live kernel: `test-integration [base_url]`.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let base = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let username = std::env::var("IEUMSAE_ADMIN_USERNAME").unwrap_or_else(|_| "admin".into());
    let password = std::env::var("IEUMSAE_ADMIN_PASSWORD").unwrap_or_else(|_| "kopo123".into());
    info!("running smoke checks against {base}");

    let client = reqwest::Client::new();

    let health = client.get(format!("{base}/health")).send().await.context("kernel unreachable")?;
    ensure!(health.status().is_success(), "health returned {}", health.status());

    let unauthorized = client.get(format!("{base}/api/dashboard")).send().await?;
    ensure!(unauthorized.status() == 401, "dashboard without session returned {}", unauthorized.status());

    let login: LoginResponse = client
        .post(format!("{base}/api/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await?
        .error_for_status()
        .context("login rejected")?
        .json()
        .await?;
    let token = login.token;
    info!("logged in");

    let cameras: Vec<Camera> = client
        .get(format!("{base}/api/dashboard/cameras"))
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let view: DashboardView = client
        .get(format!("{base}/api/dashboard"))
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    for camera in &cameras {
        if !view.connectivity.contains_key(&camera.id) {
            bail!("camera {} missing from connectivity", camera.id);
        }
        let logs = view.logs.get(&camera.id).map(Vec::len).unwrap_or(0);
        ensure!(logs <= MAX_LOGS_PER_CAMERA, "camera {} holds {logs} logs", camera.id);
        info!("{}: connected={} logs={logs}", camera.id, view.connectivity[&camera.id]);
    }
    match view.weather.get("status").and_then(|s| s.as_str()) {
        Some(status) => info!("weather status: {status}"),
        None => warn!("weather slice has no status"),
    }

    let query: QueryResponse = client
        .post(format!("{base}/api/query"))
        .bearer_auth(&token)
        .json(&json!({ "query": "2024-11-20 객체 비율" }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    info!(
        "query returned {} records, chart={}",
        query.data.len(),
        query.chart_data.is_some()
    );

    client
        .post(format!("{base}/api/logout"))
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?;
    info!("all smoke checks passed");
    Ok(())
}
