//! One-shot device geolocation.
//!
//! A position is requested once per flow with a high-accuracy preference.
//! There is no polling and no continuous tracking. Every failure, including a
//! platform without any location service, degrades to "no fix" plus a single
//! warning for the user.

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

use crate::model::GeoFix;
use crate::notify::Notice;

/// Warning shown when no fix could be obtained.
pub const LOCATION_WARNING: &str =
    "Unable to get your location. Location sharing is important for SOS alerts.";

/// Options for a position request.
#[derive(Debug, Clone, Copy)]
pub struct LocationRequest {
    pub high_accuracy: bool,
    /// Give up after this long. `None` leaves it to the source.
    pub timeout: Option<Duration>,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// Why no fix was produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    Denied,

    #[error("position unavailable: {0}")]
    Unavailable(String),

    #[error("geolocation is not supported on this device")]
    Unsupported,
}

/// A platform location service.
pub trait LocationSource: Send + Sync + 'static {
    fn current_position(
        &self,
        request: LocationRequest,
    ) -> impl Future<Output = Result<GeoFix, LocationError>> + Send;
}

/// Location configured up front, or none at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StaticLocation {
    Fixed { latitude: f64, longitude: f64 },
    Unsupported,
}

impl StaticLocation {
    pub fn from_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> Self {
        match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => StaticLocation::Fixed {
                latitude,
                longitude,
            },
            _ => StaticLocation::Unsupported,
        }
    }
}

impl LocationSource for StaticLocation {
    async fn current_position(&self, _request: LocationRequest) -> Result<GeoFix, LocationError> {
        match *self {
            StaticLocation::Fixed {
                latitude,
                longitude,
            } => Ok(GeoFix::new(latitude, longitude)),
            StaticLocation::Unsupported => Err(LocationError::Unsupported),
        }
    }
}

/// Request a single fix.
///
/// Returns the fix, or the warning to show the user when none could be
/// obtained. Denial, unavailability, timeout and missing support are treated
/// the same way.
pub async fn locate_once<L: LocationSource>(source: &L, request: LocationRequest) -> Result<GeoFix, Notice> {
    let result = match request.timeout {
        Some(limit) => tokio::time::timeout(limit, source.current_position(request))
            .await
            .unwrap_or_else(|_| Err(LocationError::Unavailable("timed out".to_string()))),
        None => source.current_position(request).await,
    };

    match result {
        Ok(fix) => {
            info!("Location fix acquired");
            Ok(fix)
        }
        Err(e) => {
            warn!(error = %e, "Unable to get location");
            Err(Notice::warning(LOCATION_WARNING))
        }
    }
}
