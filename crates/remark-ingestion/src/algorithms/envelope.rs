//! # Emergency Envelope Parser
//!
//! Recognizes `EMERGENCY:` envelopes in normalized remark text.
//!
//! ## Format
//!
//! ```text
//! EMERGENCY:id=e1;type=fall;severity=high;lat=-33.45;lon=-70.66;ts=1700000000000
//! EMERGENCY:{"emergencyId":"e1","severity":"high","location":{...}}
//! ```
//!
//! The `key=value` form is canonical and is what [`encode`] produces.
//! Values escape `%`, `;`, `=` and newline as `%25`, `%3B`, `%3D`, `%0A`.
//! Keys prefixed `meta.` populate the metadata map with JSON values.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{EmergencyPayload, EmergencyType, EnvelopeError, Location, Severity};

/// Literal prefix every envelope starts with.
pub const ENVELOPE_PREFIX: &str = "EMERGENCY:";

/// Longest envelope body accepted.
pub const MAX_ENVELOPE_LEN: usize = 16 * 1024;

const META_PREFIX: &str = "meta.";

const ESCAPES: [(char, &str); 4] = [('%', "%25"), (';', "%3B"), ('=', "%3D"), ('\n', "%0A")];

/// Parse envelope text into a payload; `None` for anything else.
pub fn parse(text: &str) -> Option<EmergencyPayload> {
    parse_detailed(text).ok()
}

/// Like [`parse`], but says why a text was rejected.
pub fn parse_detailed(text: &str) -> Result<EmergencyPayload, EnvelopeError> {
    // Prefix check first: almost no remark is an emergency.
    let body = text
        .strip_prefix(ENVELOPE_PREFIX)
        .ok_or(EnvelopeError::Mismatch)?
        .trim();

    if body.len() > MAX_ENVELOPE_LEN {
        return Err(EnvelopeError::Invalid(format!(
            "envelope body of {} bytes exceeds {}",
            body.len(),
            MAX_ENVELOPE_LEN
        )));
    }

    let payload = if body.starts_with('{') {
        serde_json::from_str::<EmergencyPayload>(body)
            .map_err(|e| EnvelopeError::Invalid(format!("json body: {}", e)))?
    } else {
        parse_fields(body)?
    };

    payload.validate()?;
    Ok(payload)
}

/// Encode a payload in the canonical `key=value` form.
pub fn encode(payload: &EmergencyPayload) -> String {
    let loc = &payload.location;
    let mut fields: Vec<(String, String)> = vec![
        ("id".into(), payload.emergency_id.clone()),
        ("type".into(), payload.emergency_type.as_str().into()),
        ("severity".into(), payload.severity.as_str().into()),
        ("lat".into(), loc.latitude.to_string()),
        ("lon".into(), loc.longitude.to_string()),
    ];

    if let Some(alt) = loc.altitude {
        fields.push(("alt".into(), alt.to_string()));
    }
    if let Some(acc) = loc.accuracy {
        fields.push(("acc".into(), acc.to_string()));
    }
    if let Some(desc) = &payload.description {
        fields.push(("desc".into(), desc.clone()));
    }
    if !payload.reporter_account.is_empty() {
        fields.push(("reporter".into(), payload.reporter_account.clone()));
    }
    if let Some(log) = &payload.related_log_id {
        fields.push(("log".into(), log.clone()));
    }
    if let Some(milestone) = &payload.related_milestone_id {
        fields.push(("milestone".into(), milestone.clone()));
    }
    for (name, value) in &payload.metadata {
        fields.push((format!("{}{}", META_PREFIX, escape(name)), value.to_string()));
    }
    fields.push(("ts".into(), loc.timestamp.to_string()));
    fields.push(("at".into(), payload.reported_at.to_string()));

    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, escape(v)))
        .collect::<Vec<_>>()
        .join(";");
    format!("{}{}", ENVELOPE_PREFIX, body)
}

fn parse_fields(body: &str) -> Result<EmergencyPayload, EnvelopeError> {
    let mut fields: HashMap<&str, String> = HashMap::new();
    let mut metadata = BTreeMap::new();

    for pair in body.split(';') {
        let pair = pair.trim_start();
        if pair.is_empty() {
            continue;
        }
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| EnvelopeError::Invalid(format!("field '{}' has no value", pair)))?;
        let value = unescape(raw);

        // Metadata names are kept verbatim, whitespace included.
        if let Some(name) = key.strip_prefix(META_PREFIX) {
            let parsed = serde_json::from_str(&value).unwrap_or(serde_json::Value::String(value));
            metadata.insert(unescape(name), parsed);
            continue;
        }
        let key = key.trim();
        if fields.insert(key, value).is_some() {
            return Err(EnvelopeError::Invalid(format!("duplicate field '{}'", key)));
        }
    }

    let mut take = |key: &str| fields.remove(key);

    let emergency_id = take("id").ok_or_else(|| missing("id"))?;
    let severity: Severity = take("severity").ok_or_else(|| missing("severity"))?.parse()?;
    let emergency_type = match take("type") {
        Some(t) => t.parse()?,
        None => EmergencyType::Other,
    };
    let latitude = number::<f64>("lat", take("lat").ok_or_else(|| missing("lat"))?)?;
    let longitude = number::<f64>("lon", take("lon").ok_or_else(|| missing("lon"))?)?;
    let altitude = take("alt").map(|v| number::<f64>("alt", v)).transpose()?;
    let accuracy = take("acc").map(|v| number::<f64>("acc", v)).transpose()?;
    let timestamp = take("ts").map(|v| number::<u64>("ts", v)).transpose()?;
    let reported_at = take("at").map(|v| number::<u64>("at", v)).transpose()?;

    Ok(EmergencyPayload {
        emergency_id,
        emergency_type,
        severity,
        description: take("desc"),
        location: Location {
            latitude,
            longitude,
            altitude,
            accuracy,
            timestamp: timestamp.or(reported_at).unwrap_or(0),
        },
        reporter_account: take("reporter").unwrap_or_default(),
        related_log_id: take("log"),
        related_milestone_id: take("milestone"),
        metadata,
        reported_at: reported_at.or(timestamp).unwrap_or(0),
    })
}

fn missing(key: &str) -> EnvelopeError {
    EnvelopeError::Invalid(format!("missing required field '{}'", key))
}

fn number<T: std::str::FromStr>(key: &str, value: String) -> Result<T, EnvelopeError> {
    value
        .trim()
        .parse()
        .map_err(|_| {
            EnvelopeError::Invalid(format!("field '{}' is not a number: '{}'", key, value))
        })
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match ESCAPES.iter().find(|(raw, _)| *raw == c) {
            Some((_, escaped)) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    out
}

/// Undo [`escape`]. Unknown `%` sequences are kept literally.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        let known = ESCAPES.iter().find(|(_, escaped)| {
            tail.get(..3)
                .is_some_and(|seq| seq.eq_ignore_ascii_case(escaped))
        });
        match known {
            Some((raw, _)) => {
                out.push(*raw);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
