//! SafeNav - client for the SafeNav personal-safety navigation service.
//!
//! # Overview
//!
//! SafeNav plans walking routes scored by crime and street-lighting data, and
//! lets a user in distress alert their emergency contacts. The alert carries
//! the user's last known location and, when a journey is in progress, a
//! summary of the route being walked.
//!
//! The SOS flow is the core of this crate: a trigger arms a short countdown,
//! the countdown can be cancelled at any point, and when it expires exactly
//! one alert is sent. See [`sos`].
//!
//! # Privacy
//!
//! Tokens, passwords, phone numbers and coordinates are never written to the
//! log. The session token and the journey in progress are the only state kept
//! on disk.
//!
//! # Modules
//!
//! - [`api`]: REST client for the SafeNav service
//! - [`sos`]: SOS state machine and controller
//! - [`route_cache`]: the journey in progress and its persisted form
//! - [`polyline`]: encoded polyline codec
//! - [`session`], [`storage`]: bearer token and local key-value state
//! - [`geolocation`], [`geocoding`]: location fixes and reverse geocoding
//! - [`model`], [`error`], [`notify`], [`render`], [`config`]

pub mod api;
pub mod config;
pub mod error;
pub mod geocoding;
pub mod geolocation;
pub mod model;
pub mod notify;
pub mod polyline;
pub mod render;
pub mod route_cache;
pub mod session;
pub mod sos;
pub mod storage;
