use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, Span};

use super::PlaceResolver;
use crate::config::GeocodingConfig;
use crate::error::GeoLookupError;
use crate::models::Place;

#[derive(Debug, Deserialize)]
struct PlaceDetailsResponse {
    status: String,
    #[serde(default)]
    result: Option<PlaceDetails>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetails {
    name: String,
    #[serde(default)]
    vicinity: Option<String>,
}

fn place_from_response(
    place_id: &str,
    response: PlaceDetailsResponse,
) -> Result<Place, GeoLookupError> {
    match response.status.as_str() {
        "OK" => response
            .result
            .map(|details| Place {
                name: details.name,
                vicinity: details.vicinity,
            })
            .ok_or_else(|| GeoLookupError::Decode("OK response without result".to_string())),
        "NOT_FOUND" | "ZERO_RESULTS" | "INVALID_REQUEST" => {
            Err(GeoLookupError::NotFound(place_id.to_string()))
        }
        "OVER_QUERY_LIMIT" => Err(GeoLookupError::QuotaExceeded),
        other => Err(GeoLookupError::Request(match response.error_message {
            Some(message) => format!("{}: {}", other, message),
            None => other.to_string(),
        })),
    }
}

/// Place resolver backed by a Places "details" JSON endpoint
#[derive(Clone)]
pub struct HttpPlaceResolver {
    http: Client,
    base_url: String,
    api_key: String,
    span: Span,
}

impl HttpPlaceResolver {
    pub fn new(config: &GeocodingConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            span: tracing::info_span!("component", name = "place_resolver"),
        })
    }

    fn details_url(&self, place_id: &str) -> String {
        format!(
            "{}?place_id={}&fields=name,vicinity&key={}",
            self.base_url,
            urlencoding::encode(place_id),
            urlencoding::encode(&self.api_key)
        )
    }
}

#[async_trait]
impl PlaceResolver for HttpPlaceResolver {
    async fn resolve(&self, place_id: &str) -> Result<Place, GeoLookupError> {
        let response = self
            .http
            .get(self.details_url(place_id))
            .send()
            .await
            .map_err(|e| GeoLookupError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            debug!(parent: &self.span, place_id, %status, "place lookup rejected");
            return Err(GeoLookupError::Request(format!("unexpected status {}", status)));
        }

        let body: PlaceDetailsResponse = response
            .json()
            .await
            .map_err(|e| GeoLookupError::Decode(e.to_string()))?;

        place_from_response(place_id, body)
    }
}
