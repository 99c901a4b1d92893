//! API gateway client for the SafeNav service.
//!
//! One method per remote operation, each a single round trip:
//!
//! - the bearer token from the [`SessionStore`] is attached when present
//! - a non-success status fails with the body's `detail` message, or with a
//!   generic per-operation message when the body is unreadable
//! - a success returns the decoded body
//!
//! There are no retries and no timeouts beyond the transport's own. Callers
//! turn failures into user-facing notices.
//!
//! Forms are validated before any request is built; a validation failure
//! never reaches the network.
//!
//! # Privacy
//!
//! Tokens, passwords and phone numbers are never logged. Log lines carry the
//! operation, status and counts only.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use crate::error::{ApiError, ValidationError};
use crate::model::{
    Acknowledgement, Contact, ContactDraft, ContactEditRequest, HistoricalAlert, LoginRequest,
    NewAccount, PasswordChange, PasswordChangeRequest, Profile, ProfileUpdate, RouteOption,
    RouteRequest, SignupRequest, SignupResponse, SosPayload, SosReceipt, TokenResponse,
};
use crate::session::SessionStore;
use crate::sos::AlertService;
use crate::storage::KeyValueStore;

/// Default service location for local development.
pub const SAFENAV_API_BASE: &str = "http://127.0.0.1:8000";

/// Client for the SafeNav REST service.
#[derive(Clone)]
pub struct ApiClient<S> {
    client: reqwest::Client,
    base_url: String,
    session: SessionStore<S>,
}

impl<S: KeyValueStore> ApiClient<S> {
    /// Create a client for the default local service.
    pub fn new(session: SessionStore<S>) -> Self {
        Self::with_base_url(SAFENAV_API_BASE, session)
    }

    /// Create a client with a custom base URL.
    pub fn with_base_url(base_url: &str, session: SessionStore<S>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn session(&self) -> &SessionStore<S> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with the bearer token attached, if one is held.
    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));

        match self.session.token().await? {
            Some(token) => Ok(req.bearer_auth(token)),
            None => Ok(req),
        }
    }

    /// Send a request and decode the success body.
    async fn execute<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await.ok();
            let message = body
                .as_deref()
                .and_then(extract_detail)
                .unwrap_or_else(|| fallback.to_string());

            if status == StatusCode::UNAUTHORIZED {
                if let Err(e) = self.session.clear().await {
                    warn!(error = %e, "Failed to clear rejected session token");
                }
                info!("Session rejected by service; signed out");
            }

            warn!(status = status.as_u16(), message = %message, "SafeNav request failed");
            return Err(ApiError::Status { status, message });
        }

        Ok(response.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T, ApiError> {
        let req = self.request(Method::GET, path).await?;
        self.execute(req, fallback).await
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let req = self.request(method, path).await?.json(body);
        self.execute(req, fallback).await
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    /// Sign in and keep the issued token.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::MissingCredentials.into());
        }

        let token: TokenResponse = self
            .send_json(
                Method::POST,
                "/auth/login",
                &LoginRequest {
                    email: email.trim(),
                    password,
                },
                "Login failed",
            )
            .await?;

        self.session.set_token(&token.access_token).await?;
        info!("Signed in");
        Ok(token)
    }

    /// Create an account. Does not sign in.
    ///
    /// The password confirmation is checked first, then required fields.
    #[instrument(skip_all)]
    pub async fn register(&self, account: &NewAccount) -> Result<SignupResponse, ApiError> {
        if account.password != account.confirm_password {
            return Err(ValidationError::PasswordMismatch.into());
        }
        if account.full_name.trim().is_empty()
            || account.email.trim().is_empty()
            || account.password.is_empty()
        {
            return Err(ValidationError::MissingAccountFields.into());
        }

        let response: SignupResponse = self
            .send_json(
                Method::POST,
                "/auth/signup",
                &SignupRequest::from(account),
                "Registration failed",
            )
            .await?;

        info!(user_id = ?response.user_id, "Account created");
        Ok(response)
    }

    /// Drop the held token. Purely local.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session.clear().await?;
        info!("Signed out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.session.is_authenticated().await
    }

    // ------------------------------------------------------------------------
    // Profile
    // ------------------------------------------------------------------------

    pub async fn profile(&self) -> Result<Profile, ApiError> {
        self.get("/auth/me", "Failed to fetch profile").await
    }

    /// Update name, phone and address. The name is required.
    #[instrument(skip_all)]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Acknowledgement, ApiError> {
        if update.full_name.trim().is_empty() {
            return Err(ValidationError::MissingName.into());
        }

        self.send_json(
            Method::PUT,
            "/auth/update_profile",
            update,
            "Failed to update profile",
        )
        .await
    }

    #[instrument(skip_all)]
    pub async fn change_password(&self, change: &PasswordChange) -> Result<Acknowledgement, ApiError> {
        if change.old_password.is_empty()
            || change.new_password.is_empty()
            || change.confirm_password.is_empty()
        {
            return Err(ValidationError::MissingPasswordFields.into());
        }
        if change.new_password != change.confirm_password {
            return Err(ValidationError::NewPasswordMismatch.into());
        }

        self.send_json(
            Method::POST,
            "/auth/change_password",
            &PasswordChangeRequest {
                old_password: &change.old_password,
                new_password: &change.new_password,
            },
            "Failed to update password",
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Emergency contacts
    // ------------------------------------------------------------------------

    pub async fn contacts(&self) -> Result<Vec<Contact>, ApiError> {
        let contacts: Vec<Contact> = self.get("/contacts/list", "Failed to fetch contacts").await?;
        debug!(count = contacts.len(), "Contacts fetched");
        Ok(contacts)
    }

    #[instrument(skip_all)]
    pub async fn add_contact(&self, draft: &ContactDraft) -> Result<ContactDraft, ApiError> {
        validate_contact(draft)?;
        self.send_json(Method::POST, "/contacts/add", draft, "Failed to add contact")
            .await
    }

    #[instrument(skip(self, draft))]
    pub async fn update_contact(&self, id: &str, draft: &ContactDraft) -> Result<ContactDraft, ApiError> {
        validate_contact(draft)?;
        self.send_json(
            Method::PUT,
            "/contacts/edit",
            &ContactEditRequest {
                contact_id: id,
                updated_contact: draft,
            },
            "Failed to update contact",
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn delete_contact(&self, id: &str) -> Result<Acknowledgement, ApiError> {
        let path = format!("/contacts/delete?contact_id={}", urlencoding::encode(id));
        let req = self.request(Method::DELETE, &path).await?;
        self.execute(req, "Failed to delete contact").await
    }

    // ------------------------------------------------------------------------
    // Routes and crime data
    // ------------------------------------------------------------------------

    /// Ask the planner for candidate routes, safest first.
    #[instrument(skip_all)]
    pub async fn plan_route(&self, start: &str, end: &str) -> Result<Vec<RouteOption>, ApiError> {
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            return Err(ValidationError::MissingRouteEndpoints.into());
        }

        let routes: Vec<RouteOption> = self
            .send_json(
                Method::POST,
                "/route/plan",
                &RouteRequest { start, end },
                "Failed to plan route",
            )
            .await?;

        info!(count = routes.len(), "Routes planned");
        Ok(routes)
    }

    /// Raw crime reports around a point. The payload shape belongs to the
    /// upstream provider and is passed through untouched.
    #[instrument(skip_all)]
    pub async fn crime_reports(
        &self,
        lat: f64,
        lon: f64,
        address: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let path = format!(
            "/crime_reports?lat={}&lon={}&address={}",
            lat,
            lon,
            urlencoding::encode(address)
        );
        let req = self.request(Method::POST, &path).await?;
        self.execute(req, "Failed to fetch crime reports").await
    }

    // ------------------------------------------------------------------------
    // SOS
    // ------------------------------------------------------------------------

    /// Send an SOS alert to every emergency contact.
    #[instrument(skip_all, fields(
        has_location = payload.location.is_some(),
        has_route = payload.route_details.is_some(),
    ))]
    pub async fn trigger_sos(&self, payload: &SosPayload) -> Result<SosReceipt, ApiError> {
        let receipt: SosReceipt = self
            .send_json(Method::POST, "/sos/trigger", payload, "Failed to trigger SOS")
            .await?;

        info!(
            sos_id = ?receipt.sos_id,
            notified = receipt.notified_contacts.len(),
            "SOS alert accepted"
        );
        Ok(receipt)
    }

    /// Past alerts, newest first.
    pub async fn sos_history(&self) -> Result<Vec<HistoricalAlert>, ApiError> {
        self.get("/sos/history", "Failed to fetch SOS history").await
    }
}

impl<S: KeyValueStore> AlertService for ApiClient<S> {
    async fn send_alert(&self, payload: &SosPayload) -> Result<SosReceipt, ApiError> {
        self.trigger_sos(payload).await
    }

    async fn alert_history(&self) -> Result<Vec<HistoricalAlert>, ApiError> {
        self.sos_history().await
    }
}

fn validate_contact(draft: &ContactDraft) -> Result<(), ValidationError> {
    if draft.name.trim().is_empty() || draft.phone_number.trim().is_empty() {
        return Err(ValidationError::MissingContactFields);
    }
    Ok(())
}

/// Pull the diagnostic out of an error body.
///
/// The service reports errors as `{"detail": "..."}`; request validation
/// failures carry a list of `{"msg": "..."}` objects instead.
fn extract_detail(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;

    match value.get("detail")? {
        serde_json::Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|item| item.get("msg"))
            .and_then(|msg| msg.as_str())
            .map(str::to_string),
        _ => None,
    }
}
