//! Doctor decision and appointment outcome vocabulary.

use serde::{Deserialize, Serialize};

/// Doctor triage decision recorded on the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctorDecision {
    Accept,
    Deny,
}

impl DoctorDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Deny => "deny",
        }
    }
}

/// Anesthetic support requested alongside an accepted case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportFlag {
    None,
    Anesthesist,
    AnesthesistIcu,
}

impl SupportFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Anesthesist => "anesthesist",
            Self::AnesthesistIcu => "anesthesist_icu",
        }
    }
}

/// Scheduler outcome for an accepted case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Denied,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Denied => "denied",
        }
    }
}

/// Origin of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    System,
    Human,
    Bot,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Human => "human",
            Self::Bot => "bot",
        }
    }
}

impl std::str::FromStr for DoctorDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(Self::Accept),
            "deny" => Ok(Self::Deny),
            other => Err(format!("unknown doctor decision: {other}")),
        }
    }
}

impl std::str::FromStr for SupportFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "anesthesist" => Ok(Self::Anesthesist),
            "anesthesist_icu" => Ok(Self::AnesthesistIcu),
            other => Err(format!("unknown support flag: {other}")),
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(Self::Confirmed),
            "denied" => Ok(Self::Denied),
            other => Err(format!("unknown appointment status: {other}")),
        }
    }
}
