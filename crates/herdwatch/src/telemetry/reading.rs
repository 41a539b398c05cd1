//! Reading Model
//!
//! Normalizes the loosely shaped JSON published by collar devices into one
//! record. Devices disagree on field names, so each logical field is looked
//! up under a list of keys and the first usable value wins:
//!
//! | field         | keys (in precedence order)   |
//! |---------------|------------------------------|
//! | `entity_id`   | `entity_id`, `animal_id`     |
//! | `temperature` | `temperature`                |
//! | `heart_rate`  | `heart_rate`, `BPM`          |
//! | `step_count`  | `step_count`, `motion`       |
//! | `weight`      | `weight`                     |
//!
//! Missing or unusable values become `null`. Any other field is carried
//! through untouched.

use serde::Serialize;
use serde_json::{Map, Number, Value};

const ENTITY_ID_KEYS: &[&str] = &["entity_id", "animal_id"];
const TEMPERATURE_KEYS: &[&str] = &["temperature"];
const HEART_RATE_KEYS: &[&str] = &["heart_rate", "BPM"];
const ACTIVITY_KEYS: &[&str] = &["step_count", "motion"];
const WEIGHT_KEYS: &[&str] = &["weight"];

/// Error type for reading decoding
#[derive(Debug, thiserror::Error)]
pub enum ReadingError {
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// One telemetry sample
///
/// Readings are built once from an upstream payload and then only read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    entity_id: Option<i64>,
    temperature: Option<f64>,
    heart_rate: Option<u32>,
    #[serde(rename = "step_count")]
    activity: Option<Number>,
    weight: Option<f64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl Reading {
    /// Decode a raw upstream payload
    pub fn from_slice(raw: &[u8]) -> Result<Self, ReadingError> {
        let value: Value = serde_json::from_slice(raw)?;
        Self::from_value(value)
    }

    /// Normalize an already parsed JSON document
    pub fn from_value(value: Value) -> Result<Self, ReadingError> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => return Err(ReadingError::NotAnObject(kind_of(&other))),
        };

        let entity_id = take_first(&mut fields, ENTITY_ID_KEYS, as_integer);
        let temperature = take_first(&mut fields, TEMPERATURE_KEYS, as_float);
        let heart_rate = take_first(&mut fields, HEART_RATE_KEYS, |v| {
            as_float(v)
                .filter(|bpm| *bpm >= 0.0 && *bpm <= u32::MAX as f64)
                .map(|bpm| bpm.round() as u32)
        });
        let activity = take_first(&mut fields, ACTIVITY_KEYS, as_number);
        let weight = take_first(&mut fields, WEIGHT_KEYS, as_float);

        Ok(Self {
            entity_id,
            temperature,
            heart_rate,
            activity,
            weight,
            extra: fields,
        })
    }

    pub fn entity_id(&self) -> Option<i64> {
        self.entity_id
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn heart_rate(&self) -> Option<u32> {
        self.heart_rate
    }

    /// Step count or motion metric, in whatever unit the device reports
    pub fn activity(&self) -> Option<&Number> {
        self.activity.as_ref()
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    /// Fields that are not part of the normalized record
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Serialize into the JSON frame sent to live-view sessions
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Remove every alias of a field and keep the first value that converts
fn take_first<T>(
    fields: &mut Map<String, Value>,
    keys: &[&str],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let mut found = None;
    for key in keys {
        if let Some(value) = fields.remove(*key) {
            if found.is_none() {
                found = convert(&value);
            }
        }
    }
    found
}

fn as_float(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    as_float(value)
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
        .map(|f| f as i64)
}

fn as_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        _ => as_float(value).and_then(Number::from_f64),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_device_payload() {
        let raw = br#"{"animal_id":4,"temperature":99.12,"heart_rate":87,"step_count":6120,"weight":22.4}"#;
        let reading = Reading::from_slice(raw).unwrap();

        assert_eq!(reading.entity_id(), Some(4));
        assert_eq!(reading.temperature(), Some(99.12));
        assert_eq!(reading.heart_rate(), Some(87));
        assert_eq!(reading.activity().and_then(|n| n.as_u64()), Some(6120));
        assert_eq!(reading.weight(), Some(22.4));
        assert!(reading.extra().is_empty());
    }

    #[test]
    fn test_aliases_and_precedence() {
        let reading = Reading::from_value(json!({
            "entity_id": 9,
            "animal_id": 4,
            "BPM": 70,
            "heart_rate": 88,
            "motion": 0.35
        }))
        .unwrap();

        assert_eq!(reading.entity_id(), Some(9));
        assert_eq!(reading.heart_rate(), Some(88));
        assert_eq!(reading.activity().and_then(|n| n.as_f64()), Some(0.35));
        // Aliases are folded into the normalized fields
        assert!(reading.extra().is_empty());
    }

    #[test]
    fn test_alias_used_when_preferred_unusable() {
        let reading = Reading::from_value(json!({ "heart_rate": "fast", "BPM": 91 })).unwrap();
        assert_eq!(reading.heart_rate(), Some(91));
    }

    #[test]
    fn test_missing_fields_serialize_as_null() {
        let reading = Reading::from_value(json!({ "temperature": 101.5 })).unwrap();
        let frame: Value = serde_json::from_str(&reading.to_frame().unwrap()).unwrap();

        assert_eq!(
            frame,
            json!({
                "entity_id": null,
                "temperature": 101.5,
                "heart_rate": null,
                "step_count": null,
                "weight": null
            })
        );
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let reading = Reading::from_value(json!({
            "animal_id": 2,
            "humidity": 41,
            "SpO2": 97.5,
            "temperature": "not a number"
        }))
        .unwrap();

        assert_eq!(reading.temperature(), None);
        let frame: Value = serde_json::from_str(&reading.to_frame().unwrap()).unwrap();
        assert_eq!(frame["humidity"], 41);
        assert_eq!(frame["SpO2"], 97.5);
        assert_eq!(frame["entity_id"], 2);
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let reading = Reading::from_value(json!({ "animal_id": "12", "weight": "21.75" })).unwrap();
        assert_eq!(reading.entity_id(), Some(12));
        assert_eq!(reading.weight(), Some(21.75));
    }

    #[test]
    fn test_invalid_payloads() {
        assert!(matches!(
            Reading::from_slice(b"{not json"),
            Err(ReadingError::InvalidJson(_))
        ));
        assert!(matches!(
            Reading::from_slice(b"[1,2,3]"),
            Err(ReadingError::NotAnObject("array"))
        ));
        assert!(matches!(
            Reading::from_slice(b"42"),
            Err(ReadingError::NotAnObject("number"))
        ));
    }

    #[test]
    fn test_fractional_entity_id_dropped() {
        let reading = Reading::from_value(json!({ "animal_id": 4.5 })).unwrap();
        assert_eq!(reading.entity_id(), None);
    }
}
