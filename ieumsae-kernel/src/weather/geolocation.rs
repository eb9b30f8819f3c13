use super::{Coordinates, Geolocator, WeatherError};
use async_trait::async_trait;
use serde::Deserialize;

/// Always unavailable; the fetcher then queries by the default city.
pub struct DisabledGeolocator;

#[async_trait]
impl Geolocator for DisabledGeolocator {
    async fn locate(&self) -> Result<Coordinates, WeatherError> {
        Err(WeatherError::LocationUnavailable("geolocation disabled".into()))
    }
}

/// Coordinates pinned in the configuration.
pub struct FixedGeolocator(pub Coordinates);

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn locate(&self) -> Result<Coordinates, WeatherError> {
        Ok(self.0)
    }
}

/// Locates the host through an IP geolocation service (ip-api.com format).
pub struct IpGeolocator {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct IpLookup {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLookup {
    fn coordinates(self) -> Result<Coordinates, WeatherError> {
        if self.status.as_deref() == Some("fail") {
            let reason = self.message.unwrap_or_else(|| "lookup failed".into());
            return Err(WeatherError::LocationUnavailable(reason));
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates { lat, lon }),
            _ => Err(WeatherError::LocationUnavailable("no coordinates in lookup".into())),
        }
    }
}

impl IpGeolocator {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn locate(&self) -> Result<Coordinates, WeatherError> {
        let resp = self.client.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(WeatherError::Status(resp.status().as_u16()));
        }
        let lookup: IpLookup = resp.json().await?;
        lookup.coordinates()
    }
}
