//! Dynamic property-bag value type.
//!
//! Entities, relationships, and event parameter bags all carry string-keyed
//! values of mixed shape. `PropertyValue` is the tagged variant that covers
//! every shape observed in scenario templates: numbers, booleans, strings,
//! and nested bags. The only contract the core requires (see design notes)
//! is that values preserve equality and round-trip through the snapshot
//! serializer, which an untagged `serde` representation gives for free.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Bool(bool),
    String(String),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

pub type PropertyBag = BTreeMap<String, PropertyValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut bag = PropertyBag::new();
        bag.insert("count".into(), PropertyValue::Number(3.0));
        bag.insert("label".into(), PropertyValue::String("x".into()));
        let mut nested = BTreeMap::new();
        nested.insert("flag".into(), PropertyValue::Bool(true));
        bag.insert("nested".into(), PropertyValue::Map(nested));

        let json = serde_json::to_string(&bag).unwrap();
        let back: PropertyBag = serde_json::from_str(&json).unwrap();
        assert_eq!(bag, back);
    }
}
