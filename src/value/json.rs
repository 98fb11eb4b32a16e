//! Text forms: `Display`, the `serde_json` bridge and serde impls.
//!
//! The JSON bridge is lossy for kinds JSON has no syntax for (decimals,
//! dates, binaries, regexes, functions, host objects); they become strings or
//! small objects. Round trips are exact for null, booleans, longs, doubles,
//! strings, arrays and records.

use std::fmt::{self, Write as _};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat};
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number};

use super::{RecordValue, Value};

pub(crate) fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

/// RFC 3339 text for a millisecond timestamp; out-of-range values fall back
/// to the raw number.
pub(crate) fn format_date(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Boolean(b) => Json::Bool(*b),
            Value::Long(v) => Json::Number((*v).into()),
            Value::Double(v) => Number::from_f64(*v).map_or_else(|| Json::String(v.to_string()), Json::Number),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::String(s) => Json::String(s.to_string()),
            Value::Binary(b) => Json::String(hex(b)),
            Value::Date(ms) => Json::String(format_date(*ms)),
            Value::Array(a) => Json::Array(a.iter().map(|v| v.to_json()).collect()),
            Value::Record(r) => Json::Object(
                r.iter()
                    .map(|(n, v)| (n.to_string(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            Value::Function(f) => Json::String(f.source().to_string()),
            Value::Schema(s) => s.to_value().to_json(),
            Value::Regex(r) => Json::String(format!("/{}/{}", r.pattern(), r.flags())),
            Value::Span(s) => Json::Array(vec![s.begin().into(), s.end().into()]),
            Value::JavaObject(o) => {
                let mut map = Map::new();
                map.insert("class".to_string(), Json::String(o.class_name().to_string()));
                map.insert("payload".to_string(), Json::String(hex(o.payload())));
                Json::Object(map)
            }
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(*b),
            Json::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Value::Long(v)
                } else if let Some(v) = n.as_u64() {
                    Value::Decimal(Decimal::from(v))
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Json::String(s) => Value::string(s),
            Json::Array(items) => Value::array(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => {
                let mut fields: Vec<(Arc<str>, Value)> = map
                    .iter()
                    .map(|(k, v)| (Arc::from(k.as_str()), Value::from_json(v)))
                    .collect();
                // JSON object keys are unique
                fields.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
                Value::Record(RecordValue::from_sorted(fields))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v:?}d"),
            Value::Decimal(d) => write!(f, "{d}m"),
            Value::String(s) => write!(f, "{}", serde_json::Value::String(s.to_string())),
            Value::Binary(b) => write!(f, "hex('{}')", hex(b)),
            Value::Date(ms) => write!(f, "date('{}')", format_date(*ms)),
            Value::Array(a) => {
                write!(f, "[")?;
                for (i, v) in a.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Record(r) => {
                write!(f, "{{")?;
                for (i, (name, v)) in r.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {v}", serde_json::Value::String(name.to_string()))?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "{}", func.source()),
            Value::Schema(s) => write!(f, "schema {s}"),
            Value::Regex(r) => write!(f, "/{}/{}", r.pattern(), r.flags()),
            Value::Span(s) => write!(f, "span({}, {})", s.begin(), s.end()),
            Value::JavaObject(o) => write!(f, "javaobject('{}', {} bytes)", o.class_name(), o.payload().len()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Long(v) => serializer.serialize_i64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(a) => {
                let mut seq = serializer.serialize_seq(Some(a.len()))?;
                for v in a.iter() {
                    seq.serialize_element(&v)?;
                }
                seq.end()
            }
            Value::Record(r) => {
                let mut map = serializer.serialize_map(Some(r.len()))?;
                for (name, v) in r.iter() {
                    map.serialize_entry(name, v)?;
                }
                map.end()
            }
            other => other.to_json().serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        Ok(Value::from_json(&json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_json_round_trip_for_plain_kinds() {
        let json = serde_json::json!({
            "name": "x",
            "tags": [1, 2.5, null, true],
            "nested": {"b": 1, "a": "z"}
        });
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
        let rec = value.as_record().unwrap();
        assert_eq!(rec.names().collect::<Vec<_>>(), vec!["name", "nested", "tags"]);
    }

    #[test]
    fn test_serde_matches_bridge() {
        let value = Value::record([
            ("a", Value::Long(1)),
            ("b", Value::array(vec![Value::from("x"), Value::Double(0.5)])),
        ])
        .unwrap();
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"a":1,"b":["x",0.5]}"#);
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_display_extended_kinds() {
        assert_eq!(Value::Double(1.0).to_string(), "1.0d");
        assert_eq!(Value::Decimal(Decimal::from_str("2.50").unwrap()).to_string(), "2.50m");
        assert_eq!(Value::binary([0x0a, 0xff]).to_string(), "hex('0AFF')");
        assert_eq!(Value::Date(0).to_string(), "date('1970-01-01T00:00:00.000Z')");
        assert_eq!(Value::from("a\"b").to_string(), r#""a\"b""#);
        assert_eq!(
            Value::array(vec![Value::Long(1), Value::Null]).to_string(),
            "[1, null]"
        );
        assert_eq!(Value::span(1, 4).unwrap().to_string(), "span(1, 4)");
    }

    #[test]
    fn test_large_unsigned_becomes_decimal() {
        let json: serde_json::Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(
            Value::from_json(&json),
            Value::Decimal(Decimal::from(u64::MAX))
        );
    }
}
