//! Geocoding facade
//!
//! Resolves an address to coordinates through a pluggable provider with a
//! content-addressed cache in front. The offline provider derives stable
//! coordinates from a hash of the address, which keeps tests and local
//! development deterministic; the external provider falls back to offline on
//! any failure instead of failing the request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use shared::error::{AppError, AppResult};

use crate::cache::{Cache, KEY_PREFIX_GEOCODE};
use crate::config::GeocodingConfig;

const GEOCODE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const DEFAULT_YANDEX_BASE_URL: &str = "https://geocode-maps.yandex.ru/1.x";

/// Geocoding provider strategy, selected at startup from config.
#[derive(Debug, Clone)]
pub enum GeocodeProvider {
    /// Deterministic hash-to-coordinates derivation, no network
    Offline,
    /// Yandex geocoder HTTP API
    Yandex { api_key: String, base_url: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Coordinates {
    lat: f64,
    lon: f64,
}

pub struct GeocodingService {
    cache: Cache,
    client: reqwest::Client,
    provider: GeocodeProvider,
}

impl GeocodingService {
    pub fn new(cache: Cache, cfg: &GeocodingConfig) -> AppResult<Self> {
        let timeout = Duration::from_secs(cfg.timeout_seconds.max(1));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::internal(format!("failed to build http client: {err}")))?;

        let provider = if cfg.provider.eq_ignore_ascii_case("yandex") && !cfg.api_key.is_empty() {
            GeocodeProvider::Yandex {
                api_key: cfg.api_key.clone(),
                base_url: if cfg.base_url.is_empty() {
                    DEFAULT_YANDEX_BASE_URL.to_string()
                } else {
                    cfg.base_url.clone()
                },
            }
        } else {
            GeocodeProvider::Offline
        };

        Ok(Self {
            cache,
            client,
            provider,
        })
    }

    /// Resolve an address to `(lat, lon)`.
    pub async fn geocode(&self, address: &str) -> AppResult<(f64, f64)> {
        if address.trim().is_empty() {
            return Err(AppError::validation("address is empty"));
        }

        let key = Cache::key(KEY_PREFIX_GEOCODE, &format!("{:x}", fnv1a64(address)));

        if let Ok(Some(cached)) = self.cache.get_json::<Coordinates>(&key).await {
            return Ok((cached.lat, cached.lon));
        }

        let (lat, lon) = match &self.provider {
            GeocodeProvider::Offline => offline_coordinates(address),
            GeocodeProvider::Yandex { api_key, base_url } => {
                match self.fetch_yandex(api_key, base_url, address).await {
                    Ok(coords) => coords,
                    Err(err) => {
                        warn!(address, error = %err, "external geocoder failed, falling back to offline");
                        offline_coordinates(address)
                    }
                }
            }
        };

        if let Err(err) = self
            .cache
            .set_json(&key, &Coordinates { lat, lon }, GEOCODE_CACHE_TTL)
            .await
        {
            warn!(address, error = %err, "failed to cache geocode result");
        }

        Ok((lat, lon))
    }

    async fn fetch_yandex(
        &self,
        api_key: &str,
        base_url: &str,
        address: &str,
    ) -> AppResult<(f64, f64)> {
        let response = self
            .client
            .get(base_url)
            .query(&[
                ("apikey", api_key),
                ("format", "json"),
                ("geocode", address),
            ])
            .send()
            .await
            .map_err(|err| AppError::dependency(format!("geocoder request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::dependency(format!(
                "geocoder returned status {status}"
            )));
        }

        let body: YandexResponse = response
            .json()
            .await
            .map_err(|err| AppError::dependency(format!("geocoder response invalid: {err}")))?;

        let pos = body
            .first_pos()
            .ok_or_else(|| AppError::dependency("geocoder returned no results"))?;

        parse_position(pos).ok_or_else(|| {
            AppError::dependency(format!("geocoder returned malformed position: {pos}"))
        })
    }
}

/// "lon lat" pair as emitted by the Yandex API.
fn parse_position(pos: &str) -> Option<(f64, f64)> {
    let mut parts = pos.split_whitespace();
    let lon: f64 = parts.next()?.parse().ok()?;
    let lat: f64 = parts.next()?.parse().ok()?;
    Some((lat, lon))
}

/// FNV-1a, 64-bit.
fn fnv1a64(input: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for byte in input.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Derive stable in-range coordinates from the address hash.
fn offline_coordinates(address: &str) -> (f64, f64) {
    let h = fnv1a64(address);
    let lat = -90.0 + (h % 18_000) as f64 / 100.0;
    let lon = -180.0 + ((h / 18_000) % 36_000) as f64 / 100.0;
    (lat, lon)
}

#[derive(Debug, Deserialize)]
struct YandexResponse {
    response: YandexGeoObjectCollectionWrapper,
}

#[derive(Debug, Deserialize)]
struct YandexGeoObjectCollectionWrapper {
    #[serde(rename = "GeoObjectCollection")]
    geo_object_collection: YandexGeoObjectCollection,
}

#[derive(Debug, Deserialize)]
struct YandexGeoObjectCollection {
    #[serde(rename = "featureMember", default)]
    feature_member: Vec<YandexFeatureMember>,
}

#[derive(Debug, Deserialize)]
struct YandexFeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: YandexGeoObject,
}

#[derive(Debug, Deserialize)]
struct YandexGeoObject {
    #[serde(rename = "Point")]
    point: YandexPoint,
}

#[derive(Debug, Deserialize)]
struct YandexPoint {
    pos: String,
}

impl YandexResponse {
    fn first_pos(&self) -> Option<&str> {
        self.response
            .geo_object_collection
            .feature_member
            .first()
            .map(|member| member.geo_object.point.pos.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo;

    #[test]
    fn offline_coordinates_are_deterministic_and_in_range() {
        let (lat1, lon1) = offline_coordinates("Moscow, Tverskaya 1");
        let (lat2, lon2) = offline_coordinates("Moscow, Tverskaya 1");
        assert_eq!((lat1, lon1), (lat2, lon2));
        assert!(geo::is_valid_lat(lat1));
        assert!(geo::is_valid_lon(lon1));

        let (other_lat, other_lon) = offline_coordinates("Moscow, Tverskaya 2");
        assert!((lat1, lon1) != (other_lat, other_lon));
    }

    #[test]
    fn position_is_lon_lat_ordered() {
        let (lat, lon) = parse_position("37.6173 55.7558").unwrap();
        assert_eq!(lat, 55.7558);
        assert_eq!(lon, 37.6173);
        assert!(parse_position("garbage").is_none());
        assert!(parse_position("37.6").is_none());
    }

    #[test]
    fn parses_yandex_response_shape() {
        let raw = r#"{
            "response": {
                "GeoObjectCollection": {
                    "featureMember": [
                        {"GeoObject": {"Point": {"pos": "37.6173 55.7558"}}}
                    ]
                }
            }
        }"#;
        let body: YandexResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(body.first_pos(), Some("37.6173 55.7558"));
    }

    #[test]
    fn empty_feature_list_has_no_position() {
        let raw = r#"{"response": {"GeoObjectCollection": {"featureMember": []}}}"#;
        let body: YandexResponse = serde_json::from_str(raw).unwrap();
        assert!(body.first_pos().is_none());
    }
}
