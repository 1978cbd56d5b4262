use base64::Engine;
use serde::{Deserialize, Serialize};

/// Ключ JSON-обёртки для бинарных значений: `{"$bytes": "<base64>"}`.
pub const BYTES_TAG: &str = "$bytes";

/// Скалярное значение поля записи.
///
/// The store treats values as opaque; only the mutator looks inside, and
/// only at strings.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Название типа для сообщений об ошибках.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Конвертация из произвольного JSON. Вложенные объекты и массивы не
    /// поддерживаются, кроме обёртки `$bytes`.
    pub fn from_json(value: serde_json::Value) -> Result<Self, String> {
        match value {
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(format!("unsupported number: {n}"))
                }
            }
            serde_json::Value::Object(map) => {
                let encoded = match (map.len(), map.get(BYTES_TAG)) {
                    (1, Some(serde_json::Value::String(b64))) => b64,
                    _ => return Err("objects are only allowed as {\"$bytes\": \"...\"}".into()),
                };
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map(Value::Bytes)
                    .map_err(|e| format!("bad base64 in {BYTES_TAG}: {e}"))
            }
            serde_json::Value::Bool(_) | serde_json::Value::Array(_) | serde_json::Value::Null => {
                Err(format!("unsupported value: {value}"))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Float(v) }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self { Value::Bytes(v) }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Bytes(b) => {
                use serde::ser::SerializeMap;
                let encoded = base64::engine::general_purpose::STANDARD.encode(b);
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry(BYTES_TAG, &encoded)?;
                m.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_keeps_int_and_float_apart() {
        let int: Value = serde_json::from_str("42").unwrap();
        let float: Value = serde_json::from_str("42.5").unwrap();
        let whole_float: Value = serde_json::from_str(&serde_json::to_string(&Value::Float(3.0)).unwrap()).unwrap();
        assert_eq!(int, Value::Int(42));
        assert_eq!(float, Value::Float(42.5));
        assert_eq!(whole_float, Value::Float(3.0));
    }

    #[test]
    fn bytes_use_base64_wrapper() {
        let json = serde_json::to_string(&Value::Bytes(vec![0, 1, 2, 255])).unwrap();
        assert_eq!(json, r#"{"$bytes":"AAEC/w=="}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Bytes(vec![0, 1, 2, 255]));
    }

    #[test]
    fn rejects_nested_and_null() {
        assert!(serde_json::from_str::<Value>("null").is_err());
        assert!(serde_json::from_str::<Value>("[1,2]").is_err());
        assert!(serde_json::from_str::<Value>(r#"{"a":1}"#).is_err());
        assert!(serde_json::from_str::<Value>("true").is_err());
    }
}
