/**
 * QUERY SERVICE - Natural-language detection queries for the Database view
 *
 * ROLE: Answers `POST /api/query` either from the local mock generator or by
 * forwarding to the real backend, selected by configuration.
 *
 * MOCK RULES:
 * - date token (YYYY-MM-DD) + "객체"/"object": 20 records, 14/4/2 across
 *   person/car/truck
 * - ... + "비율"/"ratio": same records plus a 70/20/10 chart breakdown
 * - anything else: no records
 */

use crate::config::QueryMode;
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::Date;
use tracing::{debug, warn};
use uuid::Uuid;

const BREAKDOWN: [(&str, usize); 3] = [("person", 14), ("car", 4), ("truck", 2)];
const OBJECT_WORDS: [&str; 2] = ["객체", "object"];
const RATIO_WORDS: [&str; 2] = ["비율", "ratio"];

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query text is empty")]
    EmptyQuery,
    #[error("backend error: {0}")]
    Backend(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Detection {
    pub id: String,
    pub confidence: f64,
    pub camera_id: String,
    pub timestamp: String,
    pub date: String,
    pub object_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChartPoint {
    pub name: String,
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub data: Vec<Detection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<Vec<ChartPoint>>,
}

pub struct QueryService {
    mode: QueryMode,
    client: reqwest::Client,
    camera_ids: Vec<String>,
}

impl QueryService {
    pub fn new(mode: QueryMode, client: reqwest::Client, camera_ids: Vec<String>) -> Self {
        Self { mode, client, camera_ids }
    }

    pub async fn run(&self, query: &str) -> Result<QueryResponse, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        match &self.mode {
            QueryMode::Mock => {
                let resp = mock_response(query, &self.camera_ids);
                debug!(records = resp.data.len(), chart = resp.chart_data.is_some(), "mock query answered");
                Ok(resp)
            }
            QueryMode::Backend { url } => self.forward(url, query).await,
        }
    }

    async fn forward(&self, url: &str, query: &str) -> Result<QueryResponse, QueryError> {
        let resp = self
            .client
            .post(url)
            .json(&QueryRequest { query: query.to_string() })
            .send()
            .await?;
        if !resp.status().is_success() {
            warn!(status = resp.status().as_u16(), %url, "query backend rejected request");
            return Err(QueryError::Backend(format!("status {}", resp.status().as_u16())));
        }
        Ok(resp.json().await?)
    }
}

/// First `YYYY-MM-DD` date found anywhere in the text.
pub fn find_date_token(text: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    text.char_indices()
        .filter(|(_, c)| c.is_ascii_digit())
        .filter_map(|(i, _)| text.get(i..i + 10))
        .find_map(|candidate| Date::parse(candidate, &format).ok())
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

pub fn mock_response(query: &str, camera_ids: &[String]) -> QueryResponse {
    let lower = query.to_lowercase();
    let Some(date) = find_date_token(&lower) else {
        return QueryResponse::default();
    };
    if !mentions(&lower, &OBJECT_WORDS) {
        return QueryResponse::default();
    }

    let data = synthesize_detections(date, camera_ids);
    let chart_data = mentions(&lower, &RATIO_WORDS).then(|| {
        let total = data.len().max(1);
        BREAKDOWN
            .iter()
            .map(|(name, count)| ChartPoint { name: name.to_string(), value: (count * 100 / total) as u32 })
            .collect()
    });
    QueryResponse { data, chart_data }
}

fn synthesize_detections(date: Date, camera_ids: &[String]) -> Vec<Detection> {
    let mut rng = rand::thread_rng();
    let date = date.to_string();
    let mut records = Vec::new();
    for (object_type, count) in BREAKDOWN {
        for _ in 0..count {
            let n = records.len();
            // Spread over the day from 08:00, 17 minutes apart.
            let minutes = 8 * 60 + n * 17;
            let camera_id = if camera_ids.is_empty() {
                "camera1".to_string()
            } else {
                camera_ids[n % camera_ids.len()].clone()
            };
            records.push(Detection {
                id: Uuid::new_v4().to_string(),
                confidence: (rng.gen_range(0.75..0.99_f64) * 100.0).round() / 100.0,
                camera_id,
                timestamp: format!("{:02}:{:02}:00", minutes / 60, minutes % 60),
                date: date.clone(),
                object_type: object_type.to_string(),
            });
        }
    }
    records
}
