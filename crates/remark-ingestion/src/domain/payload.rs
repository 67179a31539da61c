//! # Emergency Payload
//!
//! Typed form of an `EMERGENCY:` envelope.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::EnvelopeError;

/// Longest accepted non-UUID emergency id.
pub const MAX_TOKEN_ID_LEN: usize = 64;

/// Emergency category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    /// Caught in or witnessed an avalanche.
    Avalanche,
    /// Fall on rock, ice or a crevasse.
    Fall,
    /// Traumatic injury.
    Injury,
    /// Altitude sickness or other illness.
    Illness,
    /// Lost or disoriented party.
    Lost,
    /// Trapped by weather.
    Weather,
    /// Critical equipment failure.
    Equipment,
    /// Anything else.
    Other,
}

impl EmergencyType {
    /// Envelope spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyType::Avalanche => "avalanche",
            EmergencyType::Fall => "fall",
            EmergencyType::Injury => "injury",
            EmergencyType::Illness => "illness",
            EmergencyType::Lost => "lost",
            EmergencyType::Weather => "weather",
            EmergencyType::Equipment => "equipment",
            EmergencyType::Other => "other",
        }
    }
}

impl FromStr for EmergencyType {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avalanche" => Ok(EmergencyType::Avalanche),
            "fall" => Ok(EmergencyType::Fall),
            "injury" => Ok(EmergencyType::Injury),
            "illness" => Ok(EmergencyType::Illness),
            "lost" => Ok(EmergencyType::Lost),
            "weather" => Ok(EmergencyType::Weather),
            "equipment" => Ok(EmergencyType::Equipment),
            "other" => Ok(EmergencyType::Other),
            _ => Err(EnvelopeError::Invalid(format!("unknown emergency type '{}'", s))),
        }
    }
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emergency severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Assistance wanted, no danger.
    Low,
    /// Situation could deteriorate.
    Medium,
    /// Urgent assistance required.
    High,
    /// Life-threatening.
    Critical,
}

impl Severity {
    /// Envelope spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl FromStr for Severity {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(EnvelopeError::Invalid(format!("unknown severity '{}'", s))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Degrees, within [-90, 90].
    pub latitude: f64,
    /// Degrees, within [-180, 180].
    pub longitude: f64,
    /// Meters above sea level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Fix time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: u64,
}

/// Parsed emergency envelope. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyPayload {
    /// UUID or short token identifying the emergency.
    pub emergency_id: String,
    /// Category.
    #[serde(rename = "type", default = "default_type")]
    pub emergency_type: EmergencyType,
    /// Severity.
    pub severity: Severity,
    /// Free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Position.
    pub location: Location,
    /// Reporting account; empty until filled from the remark sender.
    #[serde(default)]
    pub reporter_account: String,
    /// Related logbook entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_log_id: Option<String>,
    /// Related expedition milestone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_milestone_id: Option<String>,
    /// Arbitrary extra fields.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Report time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub reported_at: u64,
}

fn default_type() -> EmergencyType {
    EmergencyType::Other
}

impl EmergencyPayload {
    /// Check every field invariant.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        validate_emergency_id(&self.emergency_id)?;

        let loc = &self.location;
        if !loc.latitude.is_finite() || !(-90.0..=90.0).contains(&loc.latitude) {
            return Err(EnvelopeError::Invalid(format!(
                "latitude {} out of range",
                loc.latitude
            )));
        }
        if !loc.longitude.is_finite() || !(-180.0..=180.0).contains(&loc.longitude) {
            return Err(EnvelopeError::Invalid(format!(
                "longitude {} out of range",
                loc.longitude
            )));
        }
        if loc.altitude.is_some_and(|a| !a.is_finite()) {
            return Err(EnvelopeError::Invalid("altitude is not finite".to_string()));
        }
        if loc.accuracy.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Err(EnvelopeError::Invalid(
                "accuracy must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }

    /// Fill an empty reporter with the remark sender.
    pub fn with_reporter_fallback(mut self, sender: &str) -> Self {
        if self.reporter_account.is_empty() {
            self.reporter_account = sender.to_string();
        }
        self
    }

    /// Replace zero timestamps with the observation time.
    pub fn with_observed_time(mut self, observed_ms: u64) -> Self {
        if self.reported_at == 0 {
            self.reported_at = observed_ms;
        }
        if self.location.timestamp == 0 {
            self.location.timestamp = self.reported_at;
        }
        self
    }
}

/// Ids containing `-` must be canonical UUIDs; anything else must be a
/// short token of ASCII alphanumerics and `_`.
pub fn validate_emergency_id(id: &str) -> Result<(), EnvelopeError> {
    if id.contains('-') {
        return Uuid::try_parse(id)
            .map(|_| ())
            .map_err(|e| EnvelopeError::Invalid(format!("malformed uuid '{}': {}", id, e)));
    }
    let valid_token = !id.is_empty()
        && id.len() <= MAX_TOKEN_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid_token {
        Ok(())
    } else {
        Err(EnvelopeError::Invalid(format!("invalid emergency id '{}'", id)))
    }
}
