//! Reverse geocoding of a fix into an address label.
//!
//! Used to turn "use my current location" into a start string the route
//! planner understands.
//!
//! # API Reference
//!
//! See: <https://nominatim.org/release-docs/develop/api/Reverse/>

use reqwest::header::USER_AGENT;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::GeoFix;

/// Base URL for the public Nominatim instance.
pub const NOMINATIM_API_BASE: &str = "https://nominatim.openstreetmap.org";

/// Nominatim rejects requests without an identifying user agent.
const CLIENT_USER_AGENT: &str = concat!("safenav/", env!("CARGO_PKG_VERSION"));

/// Client for Nominatim's reverse geocoding endpoint.
#[derive(Clone)]
pub struct ReverseGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl Default for ReverseGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseGeocoder {
    pub fn new() -> Self {
        Self::with_base_url(NOMINATIM_API_BASE)
    }

    /// Create a geocoder with a custom base URL (for testing or self-hosting).
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Look up the place at a coordinate.
    pub async fn reverse(&self, lat: f64, lng: f64) -> anyhow::Result<NominatimPlace> {
        let url = format!(
            "{}/reverse?format=json&lat={}&lon={}&addressdetails=1",
            self.base_url, lat, lng
        );

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?
            .error_for_status()?;
        let data = response.json::<NominatimPlace>().await?;
        Ok(data)
    }

    /// Human-readable address for a fix.
    ///
    /// Falls back to "lat, lng" when the lookup fails or has no name.
    pub async fn address_for(&self, fix: &GeoFix) -> String {
        let fallback = format!("{}, {}", fix.latitude, fix.longitude);

        match self.reverse(fix.latitude, fix.longitude).await {
            Ok(place) => place.display_name.unwrap_or(fallback),
            Err(e) => {
                warn!(error = %e, "Reverse geocoding failed");
                fallback
            }
        }
    }
}

/// A place returned by the reverse endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NominatimPlace {
    #[serde(default)]
    pub display_name: Option<String>,

    /// Latitude as a decimal string.
    #[serde(default)]
    pub lat: Option<String>,

    /// Longitude as a decimal string.
    #[serde(default)]
    pub lon: Option<String>,
}
