use super::{Observation, Place, WeatherError, WeatherProvider};
use async_trait::async_trait;
use serde::Deserialize;

/// Client for the OpenWeatherMap "current weather" endpoint.
pub struct OpenWeatherMap {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    weather: Vec<Condition>,
    main: MainReadings,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    id: u32,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
}

impl CurrentWeather {
    fn into_observation(self) -> Result<Observation, WeatherError> {
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Malformed("empty weather list".into()))?;
        let icon = condition.icon.trim();
        if icon.is_empty() {
            return Err(WeatherError::Malformed("missing condition icon".into()));
        }
        Ok(Observation {
            temperature: self.main.temp,
            condition_code: condition.id,
            icon: icon.to_string(),
            city_name: self.name.filter(|n| !n.trim().is_empty()),
        })
    }
}

impl OpenWeatherMap {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self { client, base_url: base_url.into(), api_key }
    }

    fn params(&self, api_key: &str, place: &Place) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("appid", api_key.to_string()),
            ("units", "metric".to_string()),
            ("lang", "kr".to_string()),
        ];
        match place {
            Place::Coordinates(at) => {
                params.push(("lat", at.lat.to_string()));
                params.push(("lon", at.lon.to_string()));
            }
            Place::City(name) => params.push(("q", name.clone())),
        }
        params
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherMap {
    async fn current(&self, place: &Place) -> Result<Observation, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        let resp = self
            .client
            .get(&self.base_url)
            .query(&self.params(api_key, place))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(WeatherError::Status(resp.status().as_u16()));
        }
        let body: CurrentWeather = resp.json().await?;
        body.into_observation()
    }
}
