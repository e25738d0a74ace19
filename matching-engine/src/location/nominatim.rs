use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{MatchingError, Result};
use crate::location::Coordinates;

/// Forward and reverse geocoding
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a free-form address; `None` when nothing matches
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>>;

    /// Describe the place at `coordinates`; `None` when nothing is there
    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>>;

    /// Get geocoder name for logging
    fn name(&self) -> &str;
}

/// Reverse geocoding result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub display_name: String,
    /// Raw components (road, city, state, postcode, ...)
    #[serde(default)]
    pub components: BTreeMap<String, String>,
}

/// OpenStreetMap Nominatim client
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    address: BTreeMap<String, String>,
    #[serde(default)]
    error: Option<String>,
}

impl NominatimGeocoder {
    /// Create new Nominatim client. Nominatim's usage policy requires a user agent.
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(MatchingError::HttpRequest)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MatchingError::Geocoder(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(MatchingError::Geocoder(format!("HTTP {}", response.status())));
        }

        response
            .text()
            .await
            .map_err(|e| MatchingError::Geocoder(format!("Unreadable body: {}", e)))
    }
}

/// Parse the `/search?format=json` payload, taking the first hit
pub(crate) fn parse_search_response(body: &str) -> Result<Option<Coordinates>> {
    let hits: Vec<SearchHit> = serde_json::from_str(body)
        .map_err(|e| MatchingError::Geocoder(format!("Invalid JSON: {}", e)))?;

    let Some(hit) = hits.into_iter().next() else {
        return Ok(None);
    };

    let latitude: f64 = hit
        .lat
        .parse()
        .map_err(|_| MatchingError::Geocoder(format!("Bad latitude: {}", hit.lat)))?;
    let longitude: f64 = hit
        .lon
        .parse()
        .map_err(|_| MatchingError::Geocoder(format!("Bad longitude: {}", hit.lon)))?;

    Coordinates::new(latitude, longitude).map(Some)
}

/// Parse the `/reverse?format=json` payload
pub(crate) fn parse_reverse_response(body: &str) -> Result<Option<Address>> {
    let response: ReverseResponse = serde_json::from_str(body)
        .map_err(|e| MatchingError::Geocoder(format!("Invalid JSON: {}", e)))?;

    if let Some(error) = response.error {
        tracing::debug!("Nominatim reverse lookup returned no place: {}", error);
        return Ok(None);
    }

    Ok(response.display_name.map(|display_name| Address {
        display_name,
        components: response.address,
    }))
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let url = format!(
            "{}/search?q={}&format=json&limit=1",
            self.base_url,
            urlencoding::encode(address)
        );
        let body = self.get_text(&url).await?;
        parse_search_response(&body)
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<Address>> {
        let url = format!(
            "{}/reverse?lat={}&lon={}&format=json",
            self.base_url, coordinates.latitude, coordinates.longitude
        );
        let body = self.get_text(&url).await?;
        parse_reverse_response(&body)
    }

    fn name(&self) -> &str {
        "nominatim"
    }
}
