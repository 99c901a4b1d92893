//! Client configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `SAFENAV_API_URL` | `http://127.0.0.1:8000` |
//! | `SAFENAV_STATE_DB` | `sqlite:safenav.db?mode=rwc` |
//! | `SAFENAV_SOS_DELAY_SECS` | `3` |
//! | `SAFENAV_SOS_TIMEOUT_SECS` | `30` |
//! | `SAFENAV_LAT` / `SAFENAV_LNG` | unset (no location) |
//! | `SAFENAV_GEOCODER_URL` | `https://nominatim.openstreetmap.org` |
//!
//! Values that fail to parse fall back to the default.

use std::env;
use std::time::Duration;

use crate::api::SAFENAV_API_BASE;
use crate::geocoding::NOMINATIM_API_BASE;
use crate::geolocation::StaticLocation;
use crate::sos::SosConfig;

/// Default local state database if not specified via environment variable.
pub const DEFAULT_STATE_DB: &str = "sqlite:safenav.db?mode=rwc";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub state_db: String,
    pub sos_delay_secs: u32,
    pub sos_timeout_secs: u64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geocoder_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let sos = SosConfig::default();
        Self {
            api_url: SAFENAV_API_BASE.to_string(),
            state_db: DEFAULT_STATE_DB.to_string(),
            sos_delay_secs: sos.arming_delay,
            sos_timeout_secs: sos.send_timeout.as_secs(),
            latitude: None,
            longitude: None,
            geocoder_url: NOMINATIM_API_BASE.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse().ok());

        Self {
            api_url: lookup("SAFENAV_API_URL").unwrap_or(defaults.api_url),
            state_db: lookup("SAFENAV_STATE_DB").unwrap_or(defaults.state_db),
            sos_delay_secs: parsed("SAFENAV_SOS_DELAY_SECS").unwrap_or(defaults.sos_delay_secs),
            sos_timeout_secs: lookup("SAFENAV_SOS_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.sos_timeout_secs),
            latitude: lookup("SAFENAV_LAT").and_then(|v| v.trim().parse().ok()),
            longitude: lookup("SAFENAV_LNG").and_then(|v| v.trim().parse().ok()),
            geocoder_url: lookup("SAFENAV_GEOCODER_URL").unwrap_or(defaults.geocoder_url),
        }
    }

    pub fn sos_config(&self) -> SosConfig {
        SosConfig {
            arming_delay: self.sos_delay_secs,
            send_timeout: Duration::from_secs(self.sos_timeout_secs),
            ..SosConfig::default()
        }
    }

    pub fn location_source(&self) -> StaticLocation {
        StaticLocation::from_coordinates(self.latitude, self.longitude)
    }
}
