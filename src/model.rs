//! Wire types exchanged with the SafeNav service.
//!
//! Field names follow the service contract exactly (a mix of `snake_case` and
//! `camelCase`), so most structs carry explicit `serde` renames.
//!
//! # Privacy
//!
//! Passwords only ever appear in request bodies. Nothing in this module is
//! written to logs; callers log identifiers and counts, never credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::route_cache::{RiskLevel, RouteContext};

/// A latitude/longitude pair as the service sends and receives it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A single captured position reading.
///
/// Both coordinates are always present; a reading without them is not a fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl GeoFix {
    /// Create a fix captured now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            captured_at: Utc::now(),
        }
    }

    /// The coordinates in the shape the service expects.
    pub fn to_lat_lng(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

// ============================================================================
// Authentication and profile
// ============================================================================

/// Request body for `POST /auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Response from `POST /auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,

    #[serde(default)]
    pub token_type: String,
}

/// Registration form as entered by the user.
///
/// `confirm_password` never leaves the client; it is checked before the
/// request is built.
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
    pub address: String,
}

/// Request body for `POST /auth/signup`.
#[derive(Debug, Serialize)]
pub struct SignupRequest<'a> {
    pub full_name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub phone_number: &'a str,
    pub address: &'a str,
}

impl<'a> From<&'a NewAccount> for SignupRequest<'a> {
    fn from(account: &'a NewAccount) -> Self {
        Self {
            full_name: &account.full_name,
            email: &account.email,
            password: &account.password,
            phone_number: &account.phone_number,
            address: &account.address,
        }
    }
}

/// Response from `POST /auth/signup`.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub user_id: Option<String>,
}

/// The signed-in user's profile, from `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    pub full_name: String,

    #[serde(default)]
    pub phone_number: String,

    #[serde(default)]
    pub address: String,
}

/// Request body for `PUT /auth/update_profile`. Email cannot be changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub phone_number: String,
    pub address: String,
}

/// Password change form as entered by the user.
#[derive(Debug, Clone, Default)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Request body for `POST /auth/change_password`.
#[derive(Debug, Serialize)]
pub struct PasswordChangeRequest<'a> {
    pub old_password: &'a str,
    pub new_password: &'a str,
}

/// Plain acknowledgement returned by several mutating endpoints.
///
/// The service is inconsistent about the key (`msg` vs `message`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Acknowledgement {
    #[serde(default, alias = "msg")]
    pub message: String,
}

// ============================================================================
// Emergency contacts
// ============================================================================

/// An emergency contact as listed by `GET /contacts/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone: String,

    #[serde(default)]
    pub relationship: String,
}

/// Contact fields for add and edit requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactDraft {
    pub name: String,
    pub phone_number: String,

    #[serde(default)]
    pub relationship: String,
}

/// Request body for `PUT /contacts/edit`.
#[derive(Debug, Serialize)]
pub struct ContactEditRequest<'a> {
    pub contact_id: &'a str,
    pub updated_contact: &'a ContactDraft,
}

// ============================================================================
// Route planning
// ============================================================================

/// Request body for `POST /route/plan`.
#[derive(Debug, Serialize)]
pub struct RouteRequest<'a> {
    pub start: &'a str,
    pub end: &'a str,
}

/// One candidate route returned by `POST /route/plan`, safest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteOption {
    pub id: i64,
    pub name: String,
    pub distance: String,

    #[serde(rename = "estimatedTime")]
    pub estimated_time: String,

    /// Combined crime/lighting score on a 0-5 scale.
    #[serde(rename = "safetyRating")]
    pub safety_rating: f64,

    /// Percentage of the route that is lit, e.g. "72%".
    #[serde(default, rename = "wellLit")]
    pub well_lit: String,

    #[serde(default, rename = "crimeRisk")]
    pub crime_risk: f64,

    #[serde(default, rename = "lightingScore")]
    pub lighting_score: f64,

    /// Relative label across the returned options. May be missing.
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,

    #[serde(default)]
    pub overall_risk: f64,

    #[serde(default)]
    pub hotspots: Vec<Hotspot>,

    /// Encoded polyline of the route geometry.
    #[serde(default)]
    pub polyline: Option<String>,
}

/// A crime hotspot near a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub lat: f64,
    pub lng: f64,
    pub risk: f64,

    #[serde(default)]
    pub cid: i64,

    #[serde(default)]
    pub top_crimes: Vec<serde_json::Value>,
}

// ============================================================================
// SOS
// ============================================================================

/// Outgoing alert body for `POST /sos/trigger`.
///
/// Both fields serialize as `null` when absent; a location-less, route-less
/// alert is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosPayload {
    pub location: Option<LatLng>,

    #[serde(rename = "routeDetails")]
    pub route_details: Option<RouteContext>,
}

/// Acknowledgement from `POST /sos/trigger`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SosReceipt {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub sos_id: Option<String>,

    #[serde(default)]
    pub notified_contacts: Vec<NotifiedContact>,

    /// The SMS text that was actually delivered.
    #[serde(default)]
    pub sms_content: Option<String>,
}

/// A contact the service reached while fanning out an alert.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifiedContact {
    #[serde(default)]
    pub name: Option<String>,
    pub phone_number: String,
}

/// A past alert from `GET /sos/history`, newest first.
///
/// The service stores whatever the client sent, so `location` and
/// `route_details` may come back as `{}`; both are read as absent then.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoricalAlert {
    pub id: String,
    pub date: String,
    pub time: String,

    #[serde(default)]
    pub contacts_notified: u32,

    #[serde(default, deserialize_with = "lenient_location")]
    pub location: Option<LatLng>,

    #[serde(default, deserialize_with = "lenient_route")]
    pub route_details: Option<RouteContext>,
}

fn lenient_location<'de, D>(deserializer: D) -> Result<Option<LatLng>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| {
        let lat = v.get("lat")?.as_f64()?;
        let lng = v.get("lng")?.as_f64()?;
        Some(LatLng::new(lat, lng))
    }))
}

fn lenient_route<'de, D>(deserializer: D) -> Result<Option<RouteContext>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}
