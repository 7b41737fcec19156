use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw vehicle row as supplied by the record store.
///
/// Field names are kept exactly as the store delivered them; lookups of the
/// identifying fields are case-insensitive. The record is never mutated by
/// the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawVehicleRecord {
    fields: BTreeMap<String, Value>,
}

impl RawVehicleRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Exact-name lookup
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Case-insensitive lookup
    pub fn get_ignore_case(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Vehicle identifier, accepting string or numeric ids
    pub fn vehicle_id(&self) -> Option<String> {
        self.identifier("vehicle_id")
    }

    /// Owning user, used by stores for scoping
    pub fn user_id(&self) -> Option<String> {
        self.identifier("user_id")
    }

    /// Raw last-service date string, if any
    pub fn last_serviced_date(&self) -> Option<&str> {
        self.get_ignore_case("last_serviced_date")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn identifier(&self, name: &str) -> Option<String> {
        match self.get_ignore_case(name)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<BTreeMap<String, Value>> for RawVehicleRecord {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for RawVehicleRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
