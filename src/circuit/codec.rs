//! Conversion between boolean signals and the display encodings found in older circuit files
//!
//! Inside the engine a signal is always a `bool`. Older documents may store pin values as
//! `"1"`/`"0"`, `"true"`/`"false"`, `"HIGH"`/`"LOW"` or as numbers; they are decoded here and
//! nowhere else.

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Decode a single JSON value into a signal
pub fn decode(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(x) if x == 0.0 => Some(false),
            Some(x) if x == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => decode_str(s),
        Value::Null => Some(false),
        _ => None,
    }
}

/// Decode a display string into a signal
pub fn decode_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "high" | "on" => Some(true),
        "0" | "false" | "low" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Display encoding of a signal
pub fn encode(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Display encoding of several signals, most significant first as written
pub fn encode_all(values: &[bool]) -> String {
    values.iter().map(|v| encode(*v)).collect()
}

/// Parse a bit pattern such as `"0110"`
pub fn decode_pattern(s: &str) -> Option<Vec<bool>> {
    s.chars()
        .map(|c| match c {
            '1' => Some(true),
            '0' => Some(false),
            _ => None,
        })
        .collect()
}

/// Serde adapter for a list of signals in any accepted encoding
pub fn deserialize_signals<'de, D>(deserializer: D) -> Result<Vec<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SignalsVisitor;

    impl<'de> Visitor<'de> for SignalsVisitor {
        type Value = Vec<bool>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a list of signals")
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<bool>, A::Error> {
            let mut ret = Vec::new();
            while let Some(v) = seq.next_element::<Value>()? {
                match decode(&v) {
                    Some(b) => ret.push(b),
                    None => return Err(de::Error::custom(format!("invalid signal value {v}"))),
                }
            }
            Ok(ret)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Vec<bool>, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(SignalsVisitor)
}

/// Serde adapter for a single signal in any accepted encoding
pub fn deserialize_signal<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(v) => decode(&v)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("invalid signal value {v}"))),
    }
}
