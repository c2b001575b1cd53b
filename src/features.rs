//! Ordered feature lists and conversion of records into dense vectors.

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView2};
use serde::Serialize;
use serde_json::{Map, Value};

/// A heterogeneous record: named fields, some numeric features, some
/// passthrough identifiers such as `gamepk` or `team`.
pub type Record = Map<String, Value>;

/// The five game features, in the order the engine expects them.
pub const GAME_FEATURES: [&str; 5] = [
    "time",
    "ex_base_hit_cnt",
    "total_score",
    "diff_score",
    "lead_change_cnt",
];

/// Fields carried through unchanged for display.
pub const PASSTHROUGH_FIELDS: [&str; 3] = ["gamepk", "date", "team"];

/// Ordered list of feature names. Column `i` of every vector is the value of
/// feature `i`; the order never comes from record key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureList(Vec<String>);

impl FeatureList {
    /// Build a list, rejecting empty lists and duplicate names.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::EmptyInput);
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(Error::invalid_parameter(
                    "features",
                    format!("duplicate feature '{name}'"),
                ));
            }
        }
        Ok(Self(names))
    }

    /// Number of features, i.e. the vector dimensionality.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for FeatureList {
    fn default() -> Self {
        Self(GAME_FEATURES.iter().map(|s| s.to_string()).collect())
    }
}

/// Read the named features of every record, in order, into an `N x d` matrix.
///
/// The adapter does not impute: an absent field fails with
/// [`Error::MissingFeature`], a non-number with [`Error::NonNumericFeature`].
pub fn records_to_matrix(records: &[Record], features: &FeatureList) -> Result<Array2<f64>> {
    if records.is_empty() {
        return Err(Error::EmptyInput);
    }

    let d = features.len();
    let mut flat = Vec::with_capacity(records.len() * d);
    for (index, record) in records.iter().enumerate() {
        for feature in features.iter() {
            flat.push(feature_value(record, index, feature)?);
        }
    }

    Array2::from_shape_vec((records.len(), d), flat)
        .map_err(|e| Error::DegenerateData(e.to_string()))
}

/// Pack already-numeric vectors into a matrix, checking that all share the
/// first vector's dimensionality and hold finite values.
pub fn vectors_to_matrix(vectors: &[Vec<f64>]) -> Result<Array2<f64>> {
    let first = vectors.first().ok_or(Error::EmptyInput)?;
    let d = first.len();
    if d == 0 {
        return Err(Error::EmptyInput);
    }

    let mut flat = Vec::with_capacity(vectors.len() * d);
    for (index, v) in vectors.iter().enumerate() {
        if v.len() != d {
            return Err(Error::DimensionMismatch {
                expected: d,
                found: v.len(),
            });
        }
        if let Some(coordinate) = v.iter().position(|x| !x.is_finite()) {
            return Err(Error::NonFiniteValue { index, coordinate });
        }
        flat.extend_from_slice(v);
    }

    Array2::from_shape_vec((vectors.len(), d), flat)
        .map_err(|e| Error::DegenerateData(e.to_string()))
}

/// Numeric value of `feature` in the record at position `index`. `null`
/// counts as absent.
pub(crate) fn feature_value(record: &Record, index: usize, feature: &str) -> Result<f64> {
    match record.get(feature) {
        None | Some(Value::Null) => Err(Error::MissingFeature {
            index,
            feature: feature.to_string(),
        }),
        Some(v) => v.as_f64().ok_or_else(|| Error::NonNumericFeature {
            index,
            feature: feature.to_string(),
        }),
    }
}

/// JSON number for a finite value, `null` otherwise.
pub(crate) fn json_number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Reject empty or non-finite matrices before any engine touches them.
pub(crate) fn validate_matrix(data: ArrayView2<'_, f64>) -> Result<()> {
    if data.nrows() == 0 || data.ncols() == 0 {
        return Err(Error::EmptyInput);
    }
    for (index, row) in data.outer_iter().enumerate() {
        if let Some(coordinate) = row.iter().position(|x| !x.is_finite()) {
            return Err(Error::NonFiniteValue { index, coordinate });
        }
    }
    Ok(())
}

/// Copy a record keeping only the passthrough identifiers and the features.
pub fn extract_features(record: &Record, features: &FeatureList) -> Record {
    let mut out = Record::new();
    for key in PASSTHROUGH_FIELDS.iter().copied().chain(features.iter()) {
        if let Some(v) = record.get(key) {
            out.insert(key.to_string(), v.clone());
        }
    }
    out
}
