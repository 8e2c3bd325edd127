// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-powermeter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Snapshot data model
//!
//! A snapshot is the flat set of channel readings produced by one acquisition
//! cycle, keyed `<GROUP>_Channel<N>` with `N` starting at 1. It travels as a
//! plain JSON object between the agent and the collector:
//!
//! ```json
//! { "FREQUENCY_Channel1": 50.0, "VOLTAGE_Channel1": 230.0 }
//! ```
//!
//! Values are either numbers or arrays of numbers, the latter being what older
//! agents sent (`{"VOLTAGE": [11]}`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CollectorError;

/// A single snapshot value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    /// One numeric reading
    Scalar(f64),
    /// A numeric array, usually holding a single element
    Series(Vec<f64>),
}

impl From<f32> for Reading {
    fn from(value: f32) -> Self {
        Reading::Scalar(f64::from(value))
    }
}

impl From<f64> for Reading {
    fn from(value: f64) -> Self {
        Reading::Scalar(value)
    }
}

impl From<Vec<f64>> for Reading {
    fn from(values: Vec<f64>) -> Self {
        Reading::Series(values)
    }
}

/// Build the snapshot key of a channel, `channel` being 1-based.
pub fn channel_key(group: &str, channel: usize) -> String {
    format!("{}_Channel{}", group, channel)
}

/// Flat mapping from channel key to reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Reading>);

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, reading: impl Into<Reading>) {
        self.0.insert(key.into(), reading.into());
    }

    /// Insert the decoded channels of one measurement group.
    ///
    /// `readings[0]` becomes `<group>_Channel1`. Values that JSON cannot carry
    /// (NaN, infinities) are skipped and their keys returned.
    pub fn insert_group(&mut self, group: &str, readings: &[f32]) -> Vec<String> {
        let mut skipped = Vec::new();
        for (index, value) in readings.iter().enumerate() {
            let key = channel_key(group, index + 1);
            if value.is_finite() {
                self.insert(key, *value);
            } else {
                skipped.push(key);
            }
        }
        skipped
    }

    pub fn get(&self, key: &str) -> Option<&Reading> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Reading)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a request body into a snapshot.
    ///
    /// ### Errors
    ///
    /// Returns [`CollectorError::MalformedPayload`] if the body is not JSON,
    /// is not a JSON object, or holds a value that is neither a number nor an
    /// array of numbers.
    pub fn from_json_str(body: &str) -> Result<Self, CollectorError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| CollectorError::malformed(format!("body is not valid JSON: {}", e)))?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, CollectorError> {
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(CollectorError::malformed(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )))
            }
        };

        let mut snapshot = Snapshot::new();
        for (key, value) in object {
            let reading: Reading = serde_json::from_value(value).map_err(|_| {
                CollectorError::malformed(format!(
                    "value of '{}' is neither a number nor an array of numbers",
                    key
                ))
            })?;
            snapshot.0.insert(key, reading);
        }
        Ok(snapshot)
    }
}

impl FromIterator<(String, Reading)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Reading)>>(iter: I) -> Self {
        Snapshot(iter.into_iter().collect())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
