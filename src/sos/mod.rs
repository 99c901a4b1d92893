//! SOS trigger-and-countdown flow.
//!
//! - [`machine`]: the pure arm/countdown/fire/cancel state machine
//! - [`controller`]: drives the machine on a Tokio timer, assembles the
//!   outgoing payload and reconciles alert history after a send

use std::future::Future;

use crate::error::ApiError;
use crate::model::{GeoFix, HistoricalAlert, SosPayload, SosReceipt};
use crate::route_cache::RouteContext;

pub mod controller;
pub mod machine;

pub use controller::{SosConfig, SosController};
pub use machine::{AlertKind, SosMachine, SosState};

/// The remote side of the SOS flow.
pub trait AlertService: Send + Sync + 'static {
    fn send_alert(
        &self,
        payload: &SosPayload,
    ) -> impl Future<Output = Result<SosReceipt, ApiError>> + Send;

    fn alert_history(&self) -> impl Future<Output = Result<Vec<HistoricalAlert>, ApiError>> + Send;
}

/// Build the outgoing alert from whatever is known at fire time.
///
/// Either part may be missing; the alert is still valid.
pub fn build_payload(location: Option<&GeoFix>, route: Option<&RouteContext>) -> SosPayload {
    SosPayload {
        location: location.map(GeoFix::to_lat_lng),
        route_details: route.cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LatLng;

    #[test]
    fn test_payload_without_anything() {
        let payload = build_payload(None, None);
        assert!(payload.location.is_none());
        assert!(payload.route_details.is_none());
    }

    #[test]
    fn test_payload_carries_fix() {
        let fix = GeoFix::new(43.65, -79.38);
        let payload = build_payload(Some(&fix), None);
        assert_eq!(payload.location, Some(LatLng::new(43.65, -79.38)));
    }
}
