/**
 * WEATHER FETCHER - Current weather for the dashboard header
 *
 * ROLE:
 * Runs one chain per refresh: geolocation -> weather provider -> reverse
 * geocoding, and folds the result into the single `WeatherState` slice.
 *
 * DEGRADED PATHS:
 * - no position: query the provider by the default city
 * - no place name: provider city name, then the default location
 * - provider failure or missing key: keep the last good snapshot (`Stale`),
 *   or the fixed offline snapshot when there never was one (`Offline`)
 *
 * Each chain is a single attempt; a failure waits for the next tick.
 */

pub mod conditions;
pub mod geolocation;
pub mod kakao;
pub mod openweather;

use crate::config::{GeolocationConf, WeatherConf};
use crate::models::{WeatherSnapshot, WeatherState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("weather API key is not configured")]
    MissingApiKey,
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Coordinates(Coordinates),
    City(String),
}

/// Provider reading before localisation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub temperature: f64,
    pub condition_code: u32,
    pub icon: String,
    pub city_name: Option<String>,
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, WeatherError>;
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn current(&self, place: &Place) -> Result<Observation, WeatherError>;
}

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn region_name(&self, at: Coordinates) -> Result<String, WeatherError>;
}

pub struct WeatherFetcher {
    geolocator: Arc<dyn Geolocator>,
    provider: Arc<dyn WeatherProvider>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    default_city: String,
    default_location: String,
}

impl WeatherFetcher {
    pub fn new(
        geolocator: Arc<dyn Geolocator>,
        provider: Arc<dyn WeatherProvider>,
        geocoder: Option<Arc<dyn ReverseGeocoder>>,
        default_city: impl Into<String>,
        default_location: impl Into<String>,
    ) -> Self {
        Self {
            geolocator,
            provider,
            geocoder,
            default_city: default_city.into(),
            default_location: default_location.into(),
        }
    }

    /// Wires the HTTP-backed collaborators described by `conf`.
    pub fn from_config(conf: &WeatherConf, client: reqwest::Client) -> Self {
        let geolocator: Arc<dyn Geolocator> = match &conf.geolocation {
            GeolocationConf::Disabled => Arc::new(geolocation::DisabledGeolocator),
            GeolocationConf::Fixed { lat, lon } => {
                Arc::new(geolocation::FixedGeolocator(Coordinates { lat: *lat, lon: *lon }))
            }
            GeolocationConf::Ip { url } => Arc::new(geolocation::IpGeolocator::new(client.clone(), url.clone())),
        };
        let provider = Arc::new(openweather::OpenWeatherMap::new(
            client.clone(),
            conf.base_url.clone(),
            conf.api_key.clone(),
        ));
        let geocoder = conf.kakao_api_key.as_ref().map(|key| {
            Arc::new(kakao::KakaoGeocoder::new(client, conf.kakao_base_url.clone(), key.clone()))
                as Arc<dyn ReverseGeocoder>
        });
        Self::new(geolocator, provider, geocoder, &conf.default_city, &conf.default_location)
    }

    pub fn default_location(&self) -> &str {
        &self.default_location
    }

    /// One geolocation -> weather -> geocoding attempt. Either a complete
    /// snapshot or an error, never anything in between.
    pub async fn fetch(&self) -> Result<WeatherSnapshot, WeatherError> {
        let position = match self.geolocator.locate().await {
            Ok(at) => Some(at),
            Err(e) => {
                warn!(error = %e, city = %self.default_city, "geolocation failed, using default city");
                None
            }
        };
        let place = match position {
            Some(at) => Place::Coordinates(at),
            None => Place::City(self.default_city.clone()),
        };

        let observation = self.provider.current(&place).await?;

        let region = match (position, &self.geocoder) {
            (Some(at), Some(geocoder)) => match geocoder.region_name(at).await {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(error = %e, "reverse geocoding failed");
                    None
                }
            },
            _ => None,
        };
        let location = region
            .or_else(|| observation.city_name.clone())
            .unwrap_or_else(|| self.default_location.clone());

        debug!(code = observation.condition_code, %location, "weather observation");
        Ok(WeatherSnapshot {
            temperature_celsius: observation.temperature.round() as i32,
            description: conditions::describe(observation.condition_code).to_string(),
            condition_code: observation.condition_code,
            icon_ref: observation.icon,
            location,
            observed_at: OffsetDateTime::now_utc(),
        })
    }

    /// Next weather slice given the current one.
    pub async fn refresh(&self, previous: &WeatherState) -> WeatherState {
        match self.fetch().await {
            Ok(snapshot) => WeatherState::Live { snapshot },
            Err(e) => {
                warn!(error = %e, "weather refresh failed");
                previous.degrade(e.to_string(), &self.default_location)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct FakeGeolocator(pub Option<Coordinates>);

    #[async_trait]
    impl Geolocator for FakeGeolocator {
        async fn locate(&self) -> Result<Coordinates, WeatherError> {
            self.0.ok_or_else(|| WeatherError::LocationUnavailable("denied".into()))
        }
    }

    /// Replies with `reading` (or `MissingApiKey` when `None`) and records
    /// each requested place.
    pub struct FakeProvider {
        pub reading: Option<Observation>,
        pub places: Mutex<Vec<Place>>,
        pub calls: AtomicUsize,
    }

    impl FakeProvider {
        pub fn new(reading: Option<Observation>) -> Self {
            Self { reading, places: Mutex::new(Vec::new()), calls: AtomicUsize::new(0) }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn current(&self, place: &Place) -> Result<Observation, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.places.lock().push(place.clone());
            self.reading.clone().ok_or(WeatherError::MissingApiKey)
        }
    }

    pub struct FakeGeocoder(pub Option<(String, String)>);

    #[async_trait]
    impl ReverseGeocoder for FakeGeocoder {
        async fn region_name(&self, _at: Coordinates) -> Result<String, WeatherError> {
            self.0
                .as_ref()
                .map(|(r1, r2)| format!("{r1} {r2}"))
                .ok_or_else(|| WeatherError::Status(401))
        }
    }

    pub fn clear_sky(temp: f64, city: Option<&str>) -> Observation {
        Observation {
            temperature: temp,
            condition_code: 800,
            icon: "01d".into(),
            city_name: city.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;

    fn fetcher(
        at: Option<Coordinates>,
        provider: Arc<FakeProvider>,
        regions: Option<(&str, &str)>,
    ) -> WeatherFetcher {
        let geocoder: Arc<dyn ReverseGeocoder> =
            Arc::new(FakeGeocoder(regions.map(|(a, b)| (a.to_string(), b.to_string()))));
        WeatherFetcher::new(Arc::new(FakeGeolocator(at)), provider, Some(geocoder), "Seoul", "Seoul")
    }

    #[tokio::test]
    async fn test_end_to_end_snapshot() {
        let provider = Arc::new(FakeProvider::new(Some(clear_sky(21.4, Some("Seoul")))));
        let at = Coordinates { lat: 37.5, lon: 127.0 };
        let f = fetcher(Some(at), provider.clone(), Some(("Seoul", "Gangnam-gu")));

        let snapshot = f.fetch().await.unwrap();
        assert_eq!(snapshot.temperature_celsius, 21);
        assert_eq!(snapshot.description, conditions::describe(800));
        assert_eq!(snapshot.condition_code, 800);
        assert_eq!(snapshot.location, "Seoul Gangnam-gu");
        assert_eq!(snapshot.icon_ref, "01d");
        assert_eq!(provider.places.lock().as_slice(), &[Place::Coordinates(at)]);
    }

    #[tokio::test]
    async fn test_geolocation_failure_queries_default_city() {
        let provider = Arc::new(FakeProvider::new(Some(clear_sky(5.6, None))));
        let f = fetcher(None, provider.clone(), Some(("unused", "unused")));

        let snapshot = f.fetch().await.unwrap();
        assert_eq!(snapshot.temperature_celsius, 6);
        assert_eq!(snapshot.location, "Seoul");
        assert_eq!(provider.places.lock().as_slice(), &[Place::City("Seoul".into())]);
    }

    #[tokio::test]
    async fn test_geocoding_failure_falls_back_to_provider_city() {
        let provider = Arc::new(FakeProvider::new(Some(clear_sky(10.0, Some("Jung-gu")))));
        let f = fetcher(Some(Coordinates { lat: 37.56, lon: 126.99 }), provider, None);
        assert_eq!(f.fetch().await.unwrap().location, "Jung-gu");

        let provider = Arc::new(FakeProvider::new(Some(clear_sky(10.0, None))));
        let f = fetcher(Some(Coordinates { lat: 37.56, lon: 126.99 }), provider, None);
        assert_eq!(f.fetch().await.unwrap().location, "Seoul");
    }

    #[tokio::test]
    async fn test_unknown_condition_code_gets_fallback_description() {
        let mut reading = clear_sky(1.0, None);
        reading.condition_code = 999;
        let f = fetcher(None, Arc::new(FakeProvider::new(Some(reading))), None);
        let snapshot = f.fetch().await.unwrap();
        assert_eq!(snapshot.description, conditions::UNKNOWN_CONDITION);
    }

    #[tokio::test]
    async fn test_refresh_never_yields_partial_snapshot() {
        let failing = fetcher(None, Arc::new(FakeProvider::new(None)), None);

        let first = failing.refresh(&WeatherState::Pending).await;
        let WeatherState::Offline { snapshot, error } = &first else {
            panic!("expected offline, got {first:?}");
        };
        assert!(!snapshot.description.is_empty());
        assert!(!snapshot.icon_ref.is_empty());
        assert!(error.contains("API key"));

        let working = fetcher(None, Arc::new(FakeProvider::new(Some(clear_sky(18.2, None)))), None);
        let live = working.refresh(&first).await;
        assert_eq!(live.label(), "live");

        let stale = failing.refresh(&live).await;
        let WeatherState::Stale { snapshot, .. } = &stale else {
            panic!("expected stale, got {stale:?}");
        };
        assert_eq!(snapshot.temperature_celsius, 18);
    }

    #[test]
    fn test_from_config_builds_without_network() {
        let conf = WeatherConf::default();
        let f = WeatherFetcher::from_config(&conf, reqwest::Client::new());
        assert_eq!(f.default_location(), "Seoul");
        assert!(f.geocoder.is_none());
    }
}
