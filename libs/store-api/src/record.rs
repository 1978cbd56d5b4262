use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Value;

/// Одна запись хранилища: имя поля → значение.
///
/// Schemaless: the store and the harness only care that fields survive a
/// read-modify-write round trip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builder-style insert.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_flat_object() {
        let rec = Record::new().with("name", "Grand").with("stars", 4i64).with("ratings", 4.5);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"name":"Grand","ratings":4.5,"stars":4}"#);
        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
