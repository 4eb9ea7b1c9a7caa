//! Portal domain types — the closed set of destinations the gateway routes to.
//!
//! [`Portal`] is the only invariant-bearing type in the data model: a role
//! classified by the assistant is always one of these four values, enforced
//! by parsing into the enum before anything acts on it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A destination sub-portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Portal {
    Doctor,
    Patient,
    Lab,
    Pharmacy,
}

impl Portal {
    pub const ALL: [Portal; 4] = [Portal::Doctor, Portal::Patient, Portal::Lab, Portal::Pharmacy];

    /// Canonical role string — the value the assistant's tool call carries.
    pub fn as_str(&self) -> &'static str {
        match self {
            Portal::Doctor => "doctor",
            Portal::Patient => "patient",
            Portal::Lab => "lab",
            Portal::Pharmacy => "pharmacy",
        }
    }

    /// Label shown on the transition screen while the portal is prepared.
    pub fn display_name(&self) -> &'static str {
        match self {
            Portal::Doctor => "Doctor (EHR)",
            Portal::Patient => "patient",
            Portal::Lab => "lab",
            Portal::Pharmacy => "pharmacy",
        }
    }

    /// Long name used in the redirect acknowledgement message.
    pub fn long_name(&self) -> &'static str {
        match self {
            Portal::Doctor => "Electronic Health Records",
            other => other.as_str(),
        }
    }

    /// Fixed navigation route for this portal.
    pub fn route(&self) -> &'static str {
        match self {
            Portal::Doctor => "/demos/ehr",
            Portal::Patient => "/demos/patient",
            Portal::Lab => "/demos/lab",
            Portal::Pharmacy => "/demos/pharmacy",
        }
    }

    /// Resolve the last segment of a portal route (`"ehr"`, `"patient"`, …).
    pub fn from_route_segment(segment: &str) -> Option<Portal> {
        match segment {
            "ehr" => Some(Portal::Doctor),
            "patient" => Some(Portal::Patient),
            "lab" => Some(Portal::Lab),
            "pharmacy" => Some(Portal::Pharmacy),
            _ => None,
        }
    }
}

impl fmt::Display for Portal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Portal {
    type Err = UnknownPortal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(Portal::Doctor),
            "patient" => Ok(Portal::Patient),
            "lab" => Ok(Portal::Lab),
            "pharmacy" => Ok(Portal::Pharmacy),
            other => Err(UnknownPortal(other.to_string())),
        }
    }
}

/// Parse error for role strings outside the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown portal role: {0}")]
pub struct UnknownPortal(pub String);

// ── Redirect acknowledgement ─────────────────────────────────────────────────

/// Structured acknowledgement returned by the `access_portal` tool.
///
/// `action` is always `"redirect"`.  `route` and `delay_ms` let a client-side
/// surface perform the navigation itself; the console channel instead waits
/// for the matching [`NavigationEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectAck {
    pub action: String,
    pub target: Portal,
    pub route: String,
    pub message: String,
    pub delay_ms: u64,
}

impl RedirectAck {
    pub fn new(target: Portal, delay_ms: u64) -> Self {
        Self {
            action: "redirect".to_string(),
            target,
            route: target.route().to_string(),
            message: format!("Redirecting you to the {} portal...", target.long_name()),
            delay_ms,
        }
    }
}

/// Broadcast by the router when a scheduled transition fires.
#[derive(Debug, Clone)]
pub struct NavigationEvent {
    pub channel_id: String,
    pub portal: Portal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_round_trip_through_from_str() {
        for portal in Portal::ALL {
            assert_eq!(portal.as_str().parse::<Portal>().unwrap(), portal);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!("nurse".parse::<Portal>().is_err());
        assert!("".parse::<Portal>().is_err());
        assert!("Doctor".parse::<Portal>().is_err());
    }

    #[test]
    fn routes_are_fixed_paths() {
        assert_eq!(Portal::Doctor.route(), "/demos/ehr");
        assert_eq!(Portal::Patient.route(), "/demos/patient");
        assert_eq!(Portal::Lab.route(), "/demos/lab");
        assert_eq!(Portal::Pharmacy.route(), "/demos/pharmacy");
    }

    #[test]
    fn route_segments_resolve() {
        for portal in Portal::ALL {
            let segment = portal.route().rsplit('/').next().unwrap();
            assert_eq!(Portal::from_route_segment(segment), Some(portal));
        }
        assert_eq!(Portal::from_route_segment("billing"), None);
    }

    #[test]
    fn doctor_uses_ehr_long_name() {
        let ack = RedirectAck::new(Portal::Doctor, 1500);
        assert_eq!(ack.action, "redirect");
        assert!(ack.message.contains("Electronic Health Records"));
        assert_eq!(ack.route, "/demos/ehr");
    }

    #[test]
    fn ack_message_names_the_role() {
        for portal in [Portal::Patient, Portal::Lab, Portal::Pharmacy] {
            let ack = RedirectAck::new(portal, 1500);
            assert_eq!(ack.target, portal);
            assert!(ack.message.contains(portal.long_name()));
        }
    }

    #[test]
    fn serde_uses_lowercase_roles() {
        let json = serde_json::to_string(&Portal::Pharmacy).unwrap();
        assert_eq!(json, "\"pharmacy\"");
        let back: Portal = serde_json::from_str("\"lab\"").unwrap();
        assert_eq!(back, Portal::Lab);
    }
}
