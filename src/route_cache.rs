//! Route context cache: the journey currently being navigated.
//!
//! Written once when navigation starts, read by the SOS flow to enrich alerts.
//! The record survives restarts until the next navigation overwrites it and is
//! never deleted automatically.
//!
//! A record that cannot be parsed, or that violates the invariants below, is
//! reported as absent and logged.
//!
//! # Invariants
//!
//! - A risk level other than `Unknown` comes with a safety rating in 0-5.
//! - An encoded path, if present, decodes to at least one coordinate.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::model::{LatLng, RouteOption};
use crate::polyline;
use crate::storage::KeyValueStore;

/// Storage slot holding the serialized route context.
pub const ROUTE_CONTEXT_KEY: &str = "currentRoute";

/// Label used when the user left the start field empty.
const CURRENT_LOCATION: &str = "Current Location";

/// Relative risk label assigned by the planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    #[serde(other)]
    Unknown,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Unknown => "Unknown",
        }
    }
}

/// Safety rating (0-5) and the risk level that goes with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyAssessment {
    pub rating: f64,
    pub risk_level: RiskLevel,
}

/// Description of the journey in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredRoute", into = "StoredRoute")]
pub struct RouteContext {
    pub origin: String,
    pub destination: String,
    /// "origin to destination" summary line.
    pub full_path: String,
    /// Human-readable label for each entry of `waypoints`.
    pub waypoint_labels: Vec<String>,
    pub waypoints: Vec<LatLng>,
    pub eta_label: String,
    pub distance_label: String,
    pub safety: Option<SafetyAssessment>,
    pub encoded_path: Option<String>,
    pub route_id: String,
}

impl RouteContext {
    /// Compose the context for a selected route.
    ///
    /// `start` and `end` are the strings the user typed into the planner.
    /// Up to four representative waypoints are kept: first, one third, two
    /// thirds and last coordinate of the decoded path. A path that fails to
    /// decode is dropped with a warning.
    pub fn compose(route: &RouteOption, start: &str, end: &str) -> Self {
        let start = start.trim();
        let end = end.trim();

        let coords = match route.polyline.as_deref().filter(|p| !p.is_empty()) {
            Some(encoded) => match polyline::decode(encoded) {
                Ok(coords) => coords,
                Err(e) => {
                    warn!(route_id = route.id, error = %e, "Failed to decode route polyline");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let waypoints = representative_points(&coords);
        let waypoint_labels = waypoints
            .iter()
            .enumerate()
            .map(|(idx, wp)| {
                if idx == 0 {
                    format!("Starting at {}", start)
                } else if idx == waypoints.len() - 1 {
                    format!("Destination: {}", end)
                } else {
                    format!("Via point {}: {:.5},{:.5}", idx, wp.lat, wp.lng)
                }
            })
            .collect();

        let origin = non_empty_or(start, CURRENT_LOCATION);
        let destination = if end.is_empty() {
            route.name.replace("Route ", "Destination ")
        } else {
            end.to_string()
        };
        let full_path = format!("{} to {}", origin, non_empty_or(end, &route.name));

        Self {
            origin,
            destination,
            full_path,
            waypoint_labels,
            waypoints,
            eta_label: route.estimated_time.clone(),
            distance_label: route.distance.clone(),
            safety: Some(SafetyAssessment {
                rating: route.safety_rating,
                risk_level: route.risk_level.unwrap_or(RiskLevel::Unknown),
            }),
            encoded_path: (!coords.is_empty()).then(|| route.polyline.clone()).flatten(),
            route_id: route.id.to_string(),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn representative_points(coords: &[LatLng]) -> Vec<LatLng> {
    if coords.is_empty() {
        return Vec::new();
    }
    let n = coords.len();
    vec![coords[0], coords[n / 3], coords[n * 2 / 3], coords[n - 1]]
}

/// Reads and writes the route context through a [`KeyValueStore`].
#[derive(Clone)]
pub struct RouteContextCache<S> {
    store: S,
}

impl<S: KeyValueStore> RouteContextCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Start navigating `route`: compose its context and persist it,
    /// replacing whatever journey was stored before.
    pub async fn start_navigation(
        &self,
        route: &RouteOption,
        start: &str,
        end: &str,
    ) -> anyhow::Result<RouteContext> {
        let context = RouteContext::compose(route, start, end);
        self.save(&context).await?;
        info!(route_id = %context.route_id, waypoints = context.waypoints.len(), "Navigation started");
        Ok(context)
    }

    pub async fn save(&self, context: &RouteContext) -> anyhow::Result<()> {
        let json = serde_json::to_string(context)?;
        self.store.put(ROUTE_CONTEXT_KEY, &json).await
    }

    /// The stored context, or `None` when there is none or it is unusable.
    pub async fn load(&self) -> Option<RouteContext> {
        let raw = match self.store.get(ROUTE_CONTEXT_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!("No route context stored");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read route context");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(context) => Some(context),
            Err(e) => {
                warn!(error = %e, "Ignoring malformed route context");
                None
            }
        }
    }
}

// ============================================================================
// Stored representation
// ============================================================================

/// JSON shape of the record, shared with the service's `routeDetails`.
#[derive(Serialize, Deserialize)]
struct StoredRoute {
    origin: String,
    destination: String,

    #[serde(rename = "fullPath", default)]
    full_path: Option<String>,

    #[serde(rename = "pathDetails", default)]
    path_details: Vec<String>,

    #[serde(default)]
    waypoints: Vec<[f64; 2]>,

    #[serde(default)]
    eta: Option<String>,

    #[serde(default)]
    distance: Option<String>,

    #[serde(rename = "safetyRating", default)]
    safety_rating: Option<f64>,

    #[serde(default)]
    risk_level: Option<RiskLevel>,

    #[serde(rename = "routeId", default)]
    route_id: Option<StoredRouteId>,

    #[serde(default)]
    polyline: Option<String>,
}

/// The planner hands out numeric ids; stored records may carry either form.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StoredRouteId {
    Number(i64),
    Text(String),
}

impl TryFrom<StoredRoute> for RouteContext {
    type Error = String;

    fn try_from(stored: StoredRoute) -> Result<Self, Self::Error> {
        let safety = match (stored.safety_rating, stored.risk_level) {
            (Some(rating), _) if !(0.0..=5.0).contains(&rating) => {
                return Err(format!("safety rating {} outside 0-5", rating));
            }
            (Some(rating), risk) => Some(SafetyAssessment {
                rating,
                risk_level: risk.unwrap_or(RiskLevel::Unknown),
            }),
            // Older records always carry "Unknown" even without a rating.
            (None, None | Some(RiskLevel::Unknown)) => None,
            (None, Some(risk)) => {
                return Err(format!("risk level {} without safety rating", risk.label()));
            }
        };

        let encoded_path = match stored.polyline.filter(|p| !p.is_empty()) {
            Some(encoded) => {
                let coords = polyline::decode(&encoded).map_err(|e| e.to_string())?;
                if coords.is_empty() {
                    return Err("encoded path has no coordinates".to_string());
                }
                Some(encoded)
            }
            None => None,
        };

        let full_path = stored
            .full_path
            .unwrap_or_else(|| format!("{} to {}", stored.origin, stored.destination));

        Ok(RouteContext {
            origin: stored.origin,
            destination: stored.destination,
            full_path,
            waypoint_labels: stored.path_details,
            waypoints: stored
                .waypoints
                .into_iter()
                .map(|[lat, lng]| LatLng::new(lat, lng))
                .collect(),
            eta_label: stored.eta.unwrap_or_default(),
            distance_label: stored.distance.unwrap_or_default(),
            safety,
            encoded_path,
            route_id: match stored.route_id {
                Some(StoredRouteId::Number(n)) => n.to_string(),
                Some(StoredRouteId::Text(s)) => s,
                None => String::new(),
            },
        })
    }
}

impl From<RouteContext> for StoredRoute {
    fn from(context: RouteContext) -> Self {
        StoredRoute {
            origin: context.origin,
            destination: context.destination,
            full_path: Some(context.full_path),
            path_details: context.waypoint_labels,
            waypoints: context.waypoints.iter().map(|p| [p.lat, p.lng]).collect(),
            eta: Some(context.eta_label),
            distance: Some(context.distance_label),
            safety_rating: context.safety.map(|s| s.rating),
            risk_level: context.safety.map(|s| s.risk_level),
            route_id: Some(StoredRouteId::Text(context.route_id)),
            polyline: context.encoded_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn sample_route(polyline: Option<&str>) -> RouteOption {
        RouteOption {
            id: 2,
            name: "Route 2".to_string(),
            distance: "3.10 km".to_string(),
            estimated_time: "38.0 mins".to_string(),
            safety_rating: 3.9,
            well_lit: "64%".to_string(),
            crime_risk: 0.3,
            lighting_score: 0.64,
            risk_level: Some(RiskLevel::Medium),
            overall_risk: 0.3,
            hotspots: vec![],
            polyline: polyline.map(str::to_string),
        }
    }

    fn straight_line(n: usize) -> String {
        let points: Vec<LatLng> = (0..n)
            .map(|i| LatLng::new(43.6 + i as f64 * 0.001, -79.4))
            .collect();
        polyline::encode(&points)
    }

    #[test]
    fn test_compose_picks_representative_waypoints() {
        let encoded = straight_line(9);
        let context = RouteContext::compose(&sample_route(Some(&encoded)), "Union Station", "CN Tower");

        assert_eq!(context.waypoints.len(), 4);
        assert!((context.waypoints[1].lat - 43.603).abs() < 1e-9);
        assert!((context.waypoints[2].lat - 43.606).abs() < 1e-9);
        assert!((context.waypoints[3].lat - 43.608).abs() < 1e-9);

        assert_eq!(context.waypoint_labels[0], "Starting at Union Station");
        assert_eq!(context.waypoint_labels[1], "Via point 1: 43.60300,-79.40000");
        assert_eq!(context.waypoint_labels[3], "Destination: CN Tower");
        assert_eq!(context.full_path, "Union Station to CN Tower");
        assert_eq!(context.route_id, "2");
        assert_eq!(context.encoded_path.as_deref(), Some(encoded.as_str()));
    }

    #[test]
    fn test_compose_with_empty_inputs() {
        let context = RouteContext::compose(&sample_route(None), "", "");

        assert_eq!(context.origin, "Current Location");
        assert_eq!(context.destination, "Destination 2");
        assert_eq!(context.full_path, "Current Location to Route 2");
        assert!(context.waypoints.is_empty());
        assert!(context.encoded_path.is_none());
    }

    #[test]
    fn test_compose_drops_undecodable_path() {
        let context = RouteContext::compose(&sample_route(Some("not a polyline")), "A", "B");

        assert!(context.waypoints.is_empty());
        assert!(context.waypoint_labels.is_empty());
        assert!(context.encoded_path.is_none());
    }

    #[test]
    fn test_compose_defaults_risk_level() {
        let mut route = sample_route(None);
        route.risk_level = None;

        let context = RouteContext::compose(&route, "A", "B");
        let safety = context.safety.unwrap();
        assert_eq!(safety.risk_level, RiskLevel::Unknown);
        assert!((safety.rating - 3.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stored_shape_matches_service_contract() {
        let encoded = straight_line(3);
        let context = RouteContext::compose(&sample_route(Some(&encoded)), "A", "B");
        let value = serde_json::to_value(&context).unwrap();

        assert_eq!(value["origin"], "A");
        assert_eq!(value["fullPath"], "A to B");
        assert_eq!(value["eta"], "38.0 mins");
        assert_eq!(value["safetyRating"], 3.9);
        assert_eq!(value["risk_level"], "Medium");
        assert_eq!(value["routeId"], "2");
        assert_eq!(value["pathDetails"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_rejects_risk_without_rating() {
        let result: Result<RouteContext, _> = serde_json::from_value(json!({
            "origin": "A",
            "destination": "B",
            "risk_level": "High"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_risk_without_rating_is_no_assessment() {
        let context: RouteContext = serde_json::from_value(json!({
            "origin": "A",
            "destination": "B",
            "risk_level": "Unknown",
            "routeId": 7
        }))
        .unwrap();

        assert!(context.safety.is_none());
        assert_eq!(context.route_id, "7");
        assert_eq!(context.full_path, "A to B");
    }

    #[test]
    fn test_rejects_undecodable_stored_path() {
        let result: Result<RouteContext, _> = serde_json::from_value(json!({
            "origin": "A",
            "destination": "B",
            "polyline": "_p~iF"
        }));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = RouteContextCache::new(MemoryStore::new());
        assert!(cache.load().await.is_none());

        let encoded = straight_line(5);
        let written = cache
            .start_navigation(&sample_route(Some(&encoded)), "Home", "Work")
            .await
            .unwrap();

        let loaded = cache.load().await.unwrap();
        assert_eq!(loaded.full_path, written.full_path);
        assert_eq!(loaded.waypoint_labels, written.waypoint_labels);
        assert_eq!(loaded.encoded_path, written.encoded_path);
        assert_eq!(loaded.route_id, "2");
        assert_eq!(loaded.waypoints.len(), 4);
        assert_eq!(loaded.safety.map(|s| s.risk_level), Some(RiskLevel::Medium));
    }

    #[tokio::test]
    async fn test_corrupted_record_reads_as_absent() {
        let store = MemoryStore::new();
        store.put(ROUTE_CONTEXT_KEY, "{\"origin\": \"Ho").await.unwrap();

        let cache = RouteContextCache::new(store);
        assert!(cache.load().await.is_none());
    }
}
