use crate::decoder::DecodeError;
use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use std::time::SystemTime;

/// A keyed field collection, as carried by the legacy counter protocol.
pub type FieldMap = HashMap<String, FieldValue, FnvBuildHasher>;

/// A single field value of a raw event.
///
/// Depending on the protocol, fields are either text or already-unboxed primitives.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Map(FieldMap),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Gets this field as a float, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&FieldMap> {
        match self {
            FieldValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::Str(s.to_owned()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::Str(s) }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self { FieldValue::Int(i) }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self { FieldValue::Float(f) }
}

impl From<FieldMap> for FieldValue {
    fn from(m: FieldMap) -> Self { FieldValue::Map(m) }
}

/// A raw named event handed over by the transport.
///
/// Fields are positional, in the order the event source declared them.
#[derive(Clone, Debug, PartialEq)]
pub struct RawEvent {
    pub name: String,
    pub provider: String,
    pub timestamp: SystemTime,
    pub version: u32,
    pub fields: Vec<FieldValue>,
}

impl RawEvent {
    /// Creates an event with no fields, at protocol version `0`.
    pub fn new<N, P>(name: N, provider: P, timestamp: SystemTime) -> RawEvent
    where
        N: Into<String>,
        P: Into<String>,
    {
        RawEvent {
            name: name.into(),
            provider: provider.into(),
            timestamp,
            version: 0,
            fields: Vec::new(),
        }
    }

    /// Sets the protocol version.
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Appends a positional field.
    pub fn field<F: Into<FieldValue>>(mut self, value: F) -> Self {
        self.fields.push(value.into());
        self
    }

    /// Reads field `index` as text.
    pub fn str_field(&self, index: usize) -> Result<&str, DecodeError> {
        self.fields
            .get(index)
            .ok_or(DecodeError::MissingField { index })?
            .as_str()
            .ok_or(DecodeError::FieldType { index, expected: "string" })
    }

    /// Reads field `index` as text, treating an absent field as `None`.
    ///
    /// A field that is present but is not text is still an error.
    pub fn optional_str_field(&self, index: usize) -> Result<Option<&str>, DecodeError> {
        match self.fields.get(index) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or(DecodeError::FieldType { index, expected: "string" }),
        }
    }

    /// Reads field `index` as a keyed field collection.
    pub fn map_field(&self, index: usize) -> Result<&FieldMap, DecodeError> {
        self.fields
            .get(index)
            .ok_or(DecodeError::MissingField { index })?
            .as_map()
            .ok_or(DecodeError::FieldType { index, expected: "map" })
    }
}

pub(crate) fn lookup<'a>(map: &'a FieldMap, key: &'static str) -> Result<&'a FieldValue, DecodeError> {
    map.get(key).ok_or(DecodeError::MissingKey { key })
}

pub(crate) fn lookup_str<'a>(map: &'a FieldMap, key: &'static str) -> Result<&'a str, DecodeError> {
    lookup(map, key)?
        .as_str()
        .ok_or(DecodeError::KeyType { key, expected: "string" })
}

pub(crate) fn lookup_optional_str<'a>(map: &'a FieldMap, key: &'static str) -> Result<Option<&'a str>, DecodeError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or(DecodeError::KeyType { key, expected: "string" }),
    }
}

pub(crate) fn lookup_f64(map: &FieldMap, key: &'static str) -> Result<f64, DecodeError> {
    lookup(map, key)?
        .as_f64()
        .ok_or(DecodeError::KeyType { key, expected: "number" })
}

pub(crate) fn lookup_map<'a>(map: &'a FieldMap, key: &'static str) -> Result<&'a FieldMap, DecodeError> {
    lookup(map, key)?
        .as_map()
        .ok_or(DecodeError::KeyType { key, expected: "map" })
}
