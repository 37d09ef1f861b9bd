//! Remote record types and list normalization

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Fields checked, in order, for a shade's position
pub const POSITION_FIELDS: [&str; 4] = [
    "current_position",
    "percentage",
    "position",
    "shade_position",
];

/// Remote identifier; numbers and strings both normalize to a string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(serde_json::Number),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Ok(Self(n.to_string())),
            RawId::Text(s) if !s.trim().is_empty() => Ok(Self(s.trim().to_string())),
            RawId::Text(_) => Err(de::Error::custom("empty entity id")),
        }
    }
}

/// A shade as reported by `/shades/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shade {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    /// Everything else the API sent, position fields included
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Shade {
    /// Position in percent from the first recognised position field
    pub fn position(&self) -> Option<u8> {
        POSITION_FIELDS
            .iter()
            .find_map(|key| self.attributes.get(*key).and_then(percent_value))
    }
}

/// A group as reported by `/groups/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    /// Member shade ids
    #[serde(default)]
    pub shades: Vec<EntityId>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Group {
    /// Rounded mean of the member positions known in `shades`.
    ///
    /// Members that are missing from the list or report no position are left
    /// out; `None` when no member contributes.
    pub fn average_position(&self, shades: &[Shade]) -> Option<u8> {
        let positions: HashMap<&EntityId, u8> = shades
            .iter()
            .filter_map(|s| s.position().map(|p| (&s.id, p)))
            .collect();

        let members: Vec<f64> = self
            .shades
            .iter()
            .filter_map(|id| positions.get(id).map(|p| f64::from(*p)))
            .collect();
        if members.is_empty() {
            return None;
        }
        let mean = members.iter().sum::<f64>() / members.len() as f64;
        Some(mean.round().clamp(0.0, 100.0) as u8)
    }
}

/// A scene as reported by `/scenes/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// A schedule as reported by `/schedules/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Clamp a requested percentage into `0..=100`
pub fn clamp_percentage(percentage: i64) -> u8 {
    percentage.clamp(0, 100) as u8
}

fn percent_value(value: &Value) -> Option<u8> {
    let n = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))?;
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, 100.0) as u8)
}

/// Items of a list response: a bare array, or the `results` array of an
/// envelope object. Any other shape is an empty list.
pub fn list_items(body: Option<Value>) -> Vec<Value> {
    match body {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut envelope)) => match envelope.remove("results") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Typed list items; records that do not deserialize are dropped.
/// Returns the parsed records and the number skipped.
pub fn normalize_list<T: DeserializeOwned>(body: Option<Value>) -> (Vec<T>, usize) {
    let items = list_items(body);
    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    let skipped = total - parsed.len();
    (parsed, skipped)
}
