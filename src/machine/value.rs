//! # Tree of active state ids.
//!
//! A [`StateValue`] names the active configuration of a machine: a single
//! id for an atomic state, or a nested chain for compound states
//! (`{"fetch": "loading"}` in serialized form, `fetch.loading` in dotted
//! form).

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Active-configuration tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateValue {
    /// A leaf state.
    Atomic(String),
    /// A compound state with its active child.
    Compound(String, Box<StateValue>),
}

impl StateValue {
    /// Builds a value from dotted path segments, root first.
    ///
    /// Returns `None` for an empty path.
    pub fn from_segments<I>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut iter = segments.into_iter().rev();
        let leaf = iter.next()?;
        let mut value = StateValue::Atomic(leaf);
        for segment in iter {
            value = StateValue::Compound(segment, Box::new(value));
        }
        Some(value)
    }

    /// Active state ids, root first.
    pub fn path(&self) -> Vec<&str> {
        let mut out = Vec::new();
        let mut current = self;
        loop {
            match current {
                StateValue::Atomic(id) => {
                    out.push(id.as_str());
                    return out;
                }
                StateValue::Compound(id, child) => {
                    out.push(id.as_str());
                    current = child;
                }
            }
        }
    }

    /// The deepest active id.
    pub fn leaf(&self) -> &str {
        match self {
            StateValue::Atomic(id) => id,
            StateValue::Compound(_, child) => child.leaf(),
        }
    }

    /// Dotted form of the active path (`fetch.loading`).
    pub fn dotted(&self) -> String {
        self.path().join(".")
    }

    /// True when `descriptor` (dotted, possibly partial) matches the active
    /// path: `"fetch"` matches `fetch.loading`, `"fetch.loading"` matches
    /// exactly, `"fetch.load"` matches nothing.
    pub fn matches(&self, descriptor: &str) -> bool {
        let dotted = self.dotted();
        dotted == descriptor
            || (dotted.starts_with(descriptor)
                && dotted.as_bytes().get(descriptor.len()) == Some(&b'.'))
    }
}

impl From<&str> for StateValue {
    fn from(id: &str) -> Self {
        match StateValue::from_segments(id.split('.').map(str::to_string)) {
            Some(v) => v,
            None => StateValue::Atomic(String::new()),
        }
    }
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            StateValue::Atomic(id) => serializer.serialize_str(id),
            StateValue::Compound(id, child) => {
                use serde::ser::SerializeMap;
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(id, child)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        from_json(&raw).map_err(D::Error::custom)
    }
}

fn from_json(raw: &serde_json::Value) -> Result<StateValue, String> {
    match raw {
        serde_json::Value::String(id) => Ok(StateValue::Atomic(id.clone())),
        serde_json::Value::Object(map) if map.len() == 1 => {
            let (id, child) = map.iter().next().ok_or("empty object")?;
            Ok(StateValue::Compound(
                id.clone(),
                Box::new(from_json(child)?),
            ))
        }
        other => Err(format!(
            "expected string or single-key object, got {other}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_round_trip() {
        let value: StateValue = "fetch.loading".into();
        assert_eq!(value.dotted(), "fetch.loading");
        assert_eq!(value.leaf(), "loading");
        assert_eq!(value.path(), vec!["fetch", "loading"]);
    }

    #[test]
    fn matches_respects_segment_boundaries() {
        let value: StateValue = "fetch.loading".into();
        assert!(value.matches("fetch"));
        assert!(value.matches("fetch.loading"));
        assert!(!value.matches("fetch.load"));
        assert!(!value.matches("loading"));
    }

    #[test]
    fn serde_forms() {
        let atomic: StateValue = "green".into();
        assert_eq!(serde_json::to_value(&atomic).unwrap(), serde_json::json!("green"));

        let nested: StateValue = "fetch.loading".into();
        let json = serde_json::to_value(&nested).unwrap();
        assert_eq!(json, serde_json::json!({"fetch": "loading"}));

        let back: StateValue = serde_json::from_value(json).unwrap();
        assert_eq!(back, nested);
    }
}
