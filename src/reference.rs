use std::fs;
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::error::PipelineError;
use crate::utils::mean;

/// Reference signal kept as an ordered `(key, value)` list.
///
/// The order of the source mapping is the shape of the signal, so entries are
/// never re-sorted by key.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceVector {
    entries: Vec<(String, f64)>,
    /// Numbers as written in the source, echoed back by `to_json_pretty`.
    numbers: Vec<Number>,
}

/// Column offset applied when projecting peak indices back onto a strip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalShift(pub usize);

fn is_digit_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

fn numeric_value(key: &str, number: &Number) -> Result<f64, PipelineError> {
    number
        .as_f64()
        .ok_or_else(|| PipelineError::validation(key, format!("{number} is not representable as f64")))
}

impl ReferenceVector {
    pub fn from_entries<I, K>(entries: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut numbers = Vec::new();
        for (key, value) in entries {
            let key = key.into();
            let number = Number::from_f64(value)
                .ok_or_else(|| PipelineError::validation(&key, "value is not finite"))?;
            numbers.push((key, number));
        }
        Self::from_numbers(numbers)
    }

    fn from_numbers(source: Vec<(String, Number)>) -> Result<Self, PipelineError> {
        let mut entries = Vec::with_capacity(source.len());
        let mut numbers = Vec::with_capacity(source.len());
        for (key, number) in source {
            if !is_digit_key(&key) {
                return Err(PipelineError::validation(&key, "key is not a decimal digit string"));
            }
            let value = numeric_value(&key, &number)?;
            if !value.is_finite() {
                return Err(PipelineError::validation(&key, "value is not finite"));
            }
            entries.push((key, value));
            numbers.push(number);
        }
        if entries.is_empty() {
            return Err(PipelineError::validation("", "reference mapping is empty"));
        }
        Ok(Self { entries, numbers })
    }

    pub fn from_map(map: &Map<String, Value>) -> Result<Self, PipelineError> {
        let mut entries = Vec::with_capacity(map.len());
        for (key, value) in map {
            if !is_digit_key(key) {
                return Err(PipelineError::validation(key, "key is not a decimal digit string"));
            }
            match value {
                Value::Number(number) => entries.push((key.clone(), number.clone())),
                other => {
                    return Err(PipelineError::validation(
                        key,
                        format!("value {other} is not an integer or real number"),
                    ))
                }
            }
        }
        Self::from_numbers(entries)
    }

    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Self::from_map(&map),
            other => Err(PipelineError::validation(
                "",
                format!("expected a JSON object, found {}", json_kind(&other)),
            )),
        }
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Err(PipelineError::missing(path));
        }
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|(_, v)| *v).collect()
    }

    pub fn entries(&self) -> &[(String, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values()).unwrap_or(0.0)
    }

    pub fn global_shift(&self) -> GlobalShift {
        GlobalShift(self.len() / 2)
    }

    /// Pretty JSON in input key order.
    pub fn to_json_pretty(&self) -> Result<String, PipelineError> {
        let mut map = Map::with_capacity(self.entries.len());
        for ((key, _), number) in self.entries.iter().zip(&self.numbers) {
            map.insert(key.clone(), Value::Number(number.clone()));
        }
        Ok(serde_json::to_string_pretty(&Value::Object(map))?)
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

#[cfg(test)]
mod tests {
    use super::{GlobalShift, ReferenceVector};
    use crate::error::PipelineError;

    #[test]
    fn values_keep_insertion_order() {
        let reference = ReferenceVector::parse(r#"{"10": 3, "2": 1.5, "0": -4}"#).unwrap();
        assert_eq!(reference.values(), vec![3.0, 1.5, -4.0]);
        let keys: Vec<&str> = reference.entries().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["10", "2", "0"]);
    }

    #[test]
    fn non_digit_key_fails_validation() {
        let err = ReferenceVector::parse(r#"{"0": 1, "a1": 2}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Validation { ref key, .. } if key == "a1"));
        assert!(ReferenceVector::parse(r#"{"": 1}"#).is_err());
        assert!(ReferenceVector::parse(r#"{"-1": 1}"#).is_err());
    }

    #[test]
    fn non_numeric_value_fails_validation() {
        for text in [
            r#"{"0": "1"}"#,
            r#"{"0": true}"#,
            r#"{"0": null}"#,
            r#"{"0": [1]}"#,
            r#"{"0": 1, "1": {"x": 2}}"#,
        ] {
            let err = ReferenceVector::parse(text).unwrap_err();
            assert!(matches!(err, PipelineError::Validation { .. }), "{text}");
        }
    }

    #[test]
    fn non_object_and_empty_inputs_are_rejected() {
        assert!(matches!(
            ReferenceVector::parse("[1, 2]").unwrap_err(),
            PipelineError::Validation { .. }
        ));
        assert!(matches!(
            ReferenceVector::parse("{}").unwrap_err(),
            PipelineError::Validation { .. }
        ));
    }

    #[test]
    fn shift_is_half_the_cardinality() {
        let reference =
            ReferenceVector::from_entries((0..7).map(|i| (i.to_string(), i as f64))).unwrap();
        assert_eq!(reference.len(), 7);
        assert_eq!(reference.global_shift(), GlobalShift(3));
        assert!((reference.mean() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn pretty_json_round_trips_in_order() {
        let reference = ReferenceVector::parse(r#"{"5": 1, "1": 2.25}"#).unwrap();
        let text = reference.to_json_pretty().unwrap();
        assert!(text.find("\"5\"").unwrap() < text.find("\"1\"").unwrap());
        assert_eq!(ReferenceVector::parse(&text).unwrap(), reference);
    }

    #[test]
    fn pretty_json_keeps_number_spelling() {
        let reference = ReferenceVector::parse(r#"{"0": 1.0, "1": -0.0, "2": 3, "3": 0.5}"#).unwrap();
        let value: serde_json::Value = serde_json::from_str(&reference.to_json_pretty().unwrap()).unwrap();
        assert!(value["0"].is_f64());
        assert_eq!(value["0"].as_f64(), Some(1.0));
        assert!(value["1"].as_f64().unwrap().is_sign_negative());
        assert!(value["2"].is_u64());
        let text = reference.to_json_pretty().unwrap();
        assert!(text.contains("\"0\": 1.0"));
        assert!(text.contains("\"1\": -0.0"));
        assert!(text.contains("\"2\": 3"));
    }
}
