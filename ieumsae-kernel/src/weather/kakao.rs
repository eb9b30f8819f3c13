use super::{Coordinates, ReverseGeocoder, WeatherError};
use async_trait::async_trait;
use serde::Deserialize;

/// Kakao Local `coord2regioncode` reverse geocoder.
pub struct KakaoGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct RegionResponse {
    documents: Vec<RegionDocument>,
}

#[derive(Debug, Deserialize)]
struct RegionDocument {
    #[serde(default)]
    region_1depth_name: String,
    #[serde(default)]
    region_2depth_name: String,
}

impl RegionResponse {
    /// "{region_1} {region_2}" of the first document.
    fn place_name(&self) -> Result<String, WeatherError> {
        let doc = self
            .documents
            .first()
            .ok_or_else(|| WeatherError::Malformed("no region documents".into()))?;
        let name = [doc.region_1depth_name.trim(), doc.region_2depth_name.trim()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        if name.is_empty() {
            return Err(WeatherError::Malformed("blank region names".into()));
        }
        Ok(name)
    }
}

impl KakaoGeocoder {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client, base_url: base_url.into(), api_key: api_key.into() }
    }
}

#[async_trait]
impl ReverseGeocoder for KakaoGeocoder {
    async fn region_name(&self, at: Coordinates) -> Result<String, WeatherError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("x", at.lon.to_string()), ("y", at.lat.to_string())])
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(WeatherError::Status(resp.status().as_u16()));
        }
        let body: RegionResponse = resp.json().await?;
        body.place_name()
    }
}
