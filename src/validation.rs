//! Classification of raw prediction request bodies.
//!
//! Rules run in a fixed order and the first match wins, which decides the
//! status code of a body that is invalid in more than one way:
//!
//! 1. `input` missing or falsy → 422
//! 2. `input` not a list → 400
//! 3. a sample without exactly four entries → 422
//! 4. a non-numeric entry → 415

use std::ops::Deref;

use axum::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::iris::FEATURE_COUNT;

/// sepal length, sepal width, petal length, petal width
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Non-empty, validated sequence of feature vectors in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch(Vec<FeatureVector>);

impl Batch {
    pub fn new(rows: Vec<FeatureVector>) -> Self {
        Self(rows)
    }
}

impl Deref for Batch {
    type Target = [FeatureVector];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Request body is not valid JSON.")]
    MalformedBody,

    #[error("No 'input' provided.")]
    MissingInput,

    #[error("'input' must be a list of feature lists.")]
    NotAList,

    #[error("Sample {index} must have exactly {} features.", FEATURE_COUNT)]
    WrongFeatureCount { index: usize },

    #[error("Sample {index} contains a non-numeric feature.")]
    NonNumericFeature { index: usize },
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::MalformedBody => StatusCode::BAD_REQUEST,
            Rejection::MissingInput => StatusCode::UNPROCESSABLE_ENTITY,
            Rejection::NotAList => StatusCode::BAD_REQUEST,
            Rejection::WrongFeatureCount { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Rejection::NonNumericFeature { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

/// Decodes a request body regardless of its declared content type.
pub fn decode(body: &[u8]) -> Result<Batch, Rejection> {
    let value = serde_json::from_slice::<Value>(body).map_err(|_| Rejection::MalformedBody)?;
    validate(&value)
}

pub fn validate(body: &Value) -> Result<Batch, Rejection> {
    let input = match body.get("input") {
        Some(input) if !is_falsy(input) => input,
        _ => return Err(Rejection::MissingInput),
    };

    let rows = input.as_array().ok_or(Rejection::NotAList)?;

    let rows = rows
        .iter()
        .enumerate()
        .map(|(index, row)| match row.as_array() {
            Some(entries) if entries.len() == FEATURE_COUNT => Ok(entries),
            _ => Err(Rejection::WrongFeatureCount { index }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .enumerate()
        .map(|(index, entries)| {
            let mut vector = [0.0; FEATURE_COUNT];
            for (slot, entry) in vector.iter_mut().zip(entries) {
                *slot = entry.as_f64().ok_or(Rejection::NonNumericFeature { index })?;
            }
            Ok(vector)
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Batch)
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejection(body: Value) -> Rejection {
        validate(&body).unwrap_err()
    }

    #[test]
    fn accepts_integers_and_floats() {
        let batch = validate(&json!({"input": [[5.1, 3.5, 1.4, 0.2], [6, 3, 4, 1]]})).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1], [6.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn missing_or_falsy_input() {
        for body in [json!({}), json!({"input": []}), json!({"input": null}), json!({"input": ""}), json!({"input": 0}), json!([1, 2])] {
            let r = rejection(body);
            assert_eq!(r, Rejection::MissingInput);
            assert_eq!(r.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn input_must_be_a_list() {
        let r = rejection(json!({"input": "not a list"}));
        assert_eq!(r, Rejection::NotAList);
        assert_eq!(r.status(), StatusCode::BAD_REQUEST);

        assert_eq!(rejection(json!({"input": {"a": 1}})), Rejection::NotAList);
    }

    #[test]
    fn every_sample_needs_four_entries() {
        let r = rejection(json!({"input": [[1.0, 2.0, 3.0]]}));
        assert_eq!(r, Rejection::WrongFeatureCount { index: 0 });
        assert_eq!(r.status(), StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(
            rejection(json!({"input": [[1, 2, 3, 4], 5]})),
            Rejection::WrongFeatureCount { index: 1 }
        );
    }

    #[test]
    fn entries_must_be_numbers() {
        let r = rejection(json!({"input": [["a", "b", "c", "d"]]}));
        assert_eq!(r, Rejection::NonNumericFeature { index: 0 });
        assert_eq!(r.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        assert_eq!(
            rejection(json!({"input": [[1, 2, 3, 4], [1, true, 3, 4]]})),
            Rejection::NonNumericFeature { index: 1 }
        );
    }

    #[test]
    fn feature_count_is_checked_before_types() {
        // Both rules fail; the arity check runs first for every sample.
        let r = rejection(json!({"input": [["a", "b", "c", "d"], [1.0]]}));
        assert_eq!(r, Rejection::WrongFeatureCount { index: 1 });
    }

    #[test]
    fn malformed_json_is_a_bad_request() {
        assert_eq!(decode(b"{\"input\": [").unwrap_err(), Rejection::MalformedBody);
        assert_eq!(decode(b"").unwrap_err().status(), StatusCode::BAD_REQUEST);
    }
}
