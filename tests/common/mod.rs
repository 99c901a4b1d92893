//! In-process mock of the SafeNav REST service.
//!
//! Binds to an ephemeral port and records what the client sent so tests can
//! assert on it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const TOKEN: &str = "tok-123";
pub const PASSWORD: &str = "hunter22";

/// Reference polyline: (38.5, -120.2), (40.7, -120.95), (43.252, -126.453).
pub const POLYLINE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

#[derive(Clone, Default)]
pub struct MockState {
    /// Bodies received on `POST /sos/trigger`.
    pub sos_requests: Arc<Mutex<Vec<Value>>>,
    /// Reject this many upcoming SOS sends with a 500.
    pub failing_sends: Arc<AtomicUsize>,
    pub history_calls: Arc<AtomicUsize>,
    /// `Authorization` header of every authenticated request.
    pub auth_headers: Arc<Mutex<Vec<Option<String>>>>,
    pub deleted_contacts: Arc<Mutex<Vec<String>>>,
    /// Answer `GET /sos/history` with a body of the wrong shape.
    pub garbled_history: Arc<AtomicBool>,
}

impl MockState {
    pub fn sos_requests(&self) -> Vec<Value> {
        self.sos_requests.lock().unwrap().clone()
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_sends(&self, n: usize) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let expected = format!("Bearer {}", TOKEN);
        let ok = auth.as_deref() == Some(expected.as_str());
        self.auth_headers.lock().unwrap().push(auth);
        ok
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"detail": "Could not validate credentials"})),
    )
}

async fn login(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] == PASSWORD {
        (
            StatusCode::OK,
            Json(json!({"access_token": TOKEN, "token_type": "bearer"})),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Incorrect email or password"})),
        )
    }
}

async fn signup(Json(body): Json<Value>) -> impl IntoResponse {
    if body["email"] == "taken@example.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Email already registered"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"message": "User created successfully", "user_id": "u-1"})),
    )
}

async fn me(State(state): State<MockState>, headers: HeaderMap) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "email": "ana@example.com",
            "full_name": "Ana Example",
            "phone_number": "+15550100",
            "address": "1 Front St"
        })),
    )
}

async fn list_contacts(State(state): State<MockState>, headers: HeaderMap) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!([
            {"id": "c1", "name": "Sam", "phone": "+15550101", "relationship": "Sibling"},
            {"id": "c2", "name": "Lee", "phone": "+15550102"}
        ])),
    )
}

async fn delete_contact(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    let id = query.get("contact_id").cloned().unwrap_or_default();
    state.deleted_contacts.lock().unwrap().push(id);
    (StatusCode::OK, Json(json!({"msg": "Contact deleted"})))
}

async fn plan_route(State(state): State<MockState>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if body["end"] == "Nowhere" {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "No routes found"})));
    }
    (
        StatusCode::OK,
        Json(json!([
            {
                "id": 1,
                "name": "Route 1",
                "distance": "1.10 km",
                "estimatedTime": "12.0 mins",
                "safetyRating": 4.6,
                "wellLit": "82%",
                "crimeRisk": 0.4,
                "lightingScore": 0.82,
                "risk_level": "Low",
                "overall_risk": 0.3,
                "hotspots": [{"lat": 43.65, "lng": -79.38, "risk": 0.7, "cid": 3, "top_crimes": []}],
                "polyline": POLYLINE
            },
            {
                "id": 2,
                "name": "Route 2",
                "distance": "1.40 km",
                "estimatedTime": "15.5 mins",
                "safetyRating": 3.1,
                "risk_level": "High",
                "polyline": "not a polyline"
            }
        ])),
    )
}

async fn crime_reports(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    (
        StatusCode::OK,
        Json(json!({
            "query": query,
            "crimes": [{"type": "Theft", "lat": 43.651, "lng": -79.381}]
        })),
    )
}

async fn trigger_sos(State(state): State<MockState>, headers: HeaderMap, Json(body): Json<Value>) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.sos_requests.lock().unwrap().push(body);

    let failing = state
        .failing_sends
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "contact list empty"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "message": "SOS alert sent successfully",
            "sos_id": "sos-1",
            "notified_contacts": [{"name": "Sam", "phone_number": "+15550101"}],
            "sms_content": "SOS! Ana Example needs help."
        })),
    )
}

async fn sos_history(State(state): State<MockState>, headers: HeaderMap) -> impl IntoResponse {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    state.history_calls.fetch_add(1, Ordering::SeqCst);
    if state.garbled_history.load(Ordering::SeqCst) {
        return (StatusCode::OK, Json(json!({"alerts": "soon"})));
    }

    let alerts: Vec<Value> = state
        .sos_requests()
        .iter()
        .enumerate()
        .rev()
        .map(|(idx, sent)| {
            // The service stores absent parts as empty objects.
            let or_empty = |v: &Value| if v.is_null() { json!({}) } else { v.clone() };
            json!({
                "id": format!("sos-{}", idx + 1),
                "date": "2025-03-14",
                "time": "21:07",
                "contacts_notified": 1,
                "location": or_empty(&sent["location"]),
                "route_details": or_empty(&sent["routeDetails"])
            })
        })
        .collect();
    (StatusCode::OK, Json(Value::Array(alerts)))
}

/// Start the mock service and return its base URL.
pub async fn spawn_mock(state: MockState) -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/signup", post(signup))
        .route("/auth/me", get(me))
        .route("/contacts/list", get(list_contacts))
        .route("/contacts/delete", delete(delete_contact))
        .route("/route/plan", post(plan_route))
        .route("/crime_reports", post(crime_reports))
        .route("/sos/trigger", post(trigger_sos))
        .route("/sos/history", get(sos_history))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}
