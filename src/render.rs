//! Plain-text views of already-fetched data.
//!
//! Nothing here performs I/O; every function takes data and returns the text
//! to print.

use std::fmt::Write;

use crate::model::{Contact, HistoricalAlert, RouteOption};
use crate::route_cache::RouteContext;
use crate::sos::{AlertKind, SosState};

/// How safe a route rating reads at a glance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyBand {
    Safe,
    Caution,
    Risky,
}

impl SafetyBand {
    /// Bands: 4.5 and above is safe, 3.5 and above needs caution.
    pub fn from_rating(rating: f64) -> Self {
        if rating >= 4.5 {
            SafetyBand::Safe
        } else if rating >= 3.5 {
            SafetyBand::Caution
        } else {
            SafetyBand::Risky
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SafetyBand::Safe => "safe",
            SafetyBand::Caution => "caution",
            SafetyBand::Risky => "risky",
        }
    }
}

/// One line describing the controller's state.
pub fn sos_state(state: &SosState) -> String {
    match state {
        SosState::Idle => "SOS ready".to_string(),
        SosState::Armed { remaining } => {
            format!("Sending SOS in {}s... press Ctrl-C to cancel", remaining)
        }
        SosState::Sending(AlertKind::Live) => "Sending SOS alert...".to_string(),
        SosState::Sending(AlertKind::Drill) => "Sending test alert...".to_string(),
        SosState::Sent(AlertKind::Live) => "SOS alert sent".to_string(),
        SosState::Sent(AlertKind::Drill) => "Test alert sent".to_string(),
        SosState::Failed(message) => format!("SOS failed: {}", message),
    }
}

pub fn alert_history(alerts: &[HistoricalAlert]) -> String {
    if alerts.is_empty() {
        return "No SOS alerts sent yet.\n".to_string();
    }
    alerts.iter().map(alert_entry).collect::<Vec<_>>().join("\n")
}

pub fn alert_entry(alert: &HistoricalAlert) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} at {} · {} contacts notified",
        alert.date, alert.time, alert.contacts_notified
    );

    if let Some(location) = alert.location {
        let _ = writeln!(out, "  Location: {:.6}°, {:.6}°", location.lat, location.lng);
    }
    if let Some(route) = &alert.route_details {
        out.push_str(&route_details(route, "  "));
    }
    out
}

/// Route details block, each line prefixed with `indent`.
pub fn route_details(route: &RouteContext, indent: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}Route: {}", indent, route_summary(route));

    if !route.waypoint_labels.is_empty() {
        let shown = route
            .waypoint_labels
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let more = if route.waypoint_labels.len() > 2 { "..." } else { "" };
        let _ = writeln!(out, "{}Path: {}{}", indent, shown, more);
    }
    if !route.eta_label.is_empty() {
        let _ = writeln!(out, "{}ETA: {}", indent, route.eta_label);
    }
    if !route.distance_label.is_empty() {
        let _ = writeln!(out, "{}Distance: {}", indent, route.distance_label);
    }
    if let Some(safety) = route.safety {
        let _ = writeln!(
            out,
            "{}Safety Rating: {}/5 ({} risk)",
            indent,
            safety.rating,
            safety.risk_level.label()
        );
    }
    out
}

fn route_summary(route: &RouteContext) -> String {
    if !route.full_path.is_empty() {
        return route.full_path.clone();
    }
    let or_unknown = |s: &str| if s.is_empty() { "Unknown".to_string() } else { s.to_string() };
    format!("{} to {}", or_unknown(&route.origin), or_unknown(&route.destination))
}

pub fn route_options(routes: &[RouteOption]) -> String {
    if routes.is_empty() {
        return "No routes found.\n".to_string();
    }

    let mut out = String::new();
    for (idx, route) in routes.iter().enumerate() {
        let band = SafetyBand::from_rating(route.safety_rating);
        let _ = writeln!(
            out,
            "{}. {} · {} · {}",
            idx + 1,
            route.name,
            route.distance,
            route.estimated_time
        );
        let _ = writeln!(
            out,
            "   Safety {:.1}/5 ({}) · {} risk · {} well lit · {} hotspots",
            route.safety_rating,
            band.label(),
            route.risk_level.map_or("Unknown", |r| r.label()),
            if route.well_lit.is_empty() { "?" } else { route.well_lit.as_str() },
            route.hotspots.len()
        );
    }
    out
}

pub fn contacts(contacts: &[Contact]) -> String {
    if contacts.is_empty() {
        return "No emergency contacts yet.\n".to_string();
    }

    let mut out = String::new();
    for contact in contacts {
        let _ = write!(out, "{}  {} · {}", contact.id, contact.name, contact.phone);
        if !contact.relationship.is_empty() {
            let _ = write!(out, " ({})", contact.relationship);
        }
        out.push('\n');
    }
    out
}
