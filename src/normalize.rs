//! Min-max scaling of record features into `[0, 1]`.
//!
//! The engines assume normalized input: KMeans draws its initial and
//! reseeded centroids from `[0, 1)`, which only covers the data when every
//! feature has been scaled this way.

use crate::error::{Error, Result};
use crate::features::{feature_value, json_number, FeatureList, Record};
use serde::Serialize;
use std::collections::BTreeMap;

/// Inverse-scaling parameters for one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScalingParams {
    pub min: f64,
    pub max: f64,
    pub range: f64,
}

impl ScalingParams {
    /// Map a raw value into `[0, 1]`. A zero-range feature maps to 0.
    pub fn scale(&self, value: f64) -> f64 {
        if self.range == 0.0 {
            0.0
        } else {
            (value - self.min) / self.range
        }
    }

    pub fn unscale(&self, value: f64) -> f64 {
        value * self.range + self.min
    }
}

/// Per-feature scaling table keyed by feature name.
pub type ScalingTable = BTreeMap<String, ScalingParams>;

/// Normalized records plus the table needed to undo the scaling.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Normalized {
    pub normalized_data: Vec<Record>,
    pub scaling_params: ScalingTable,
}

/// Compute the scaling table and rewrite every feature field to its scaled
/// value. Other fields are copied untouched.
pub fn normalize(records: &[Record], features: &FeatureList) -> Result<Normalized> {
    if records.is_empty() {
        return Err(Error::EmptyInput);
    }

    let mut scaling_params = ScalingTable::new();
    for feature in features.iter() {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (index, record) in records.iter().enumerate() {
            let v = feature_value(record, index, feature)?;
            min = min.min(v);
            max = max.max(v);
        }
        scaling_params.insert(
            feature.to_string(),
            ScalingParams {
                min,
                max,
                range: max - min,
            },
        );
        tracing::trace!(feature, min, max, "scaling parameters");
    }

    let mut normalized_data = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let mut item = record.clone();
        for (feature, params) in &scaling_params {
            let v = feature_value(record, index, feature)?;
            item.insert(feature.clone(), json_number(params.scale(v)));
        }
        normalized_data.push(item);
    }

    Ok(Normalized {
        normalized_data,
        scaling_params,
    })
}

/// Map normalized feature values back onto their original scale.
pub fn denormalize(
    records: &[Record],
    scaling_params: &ScalingTable,
    features: &FeatureList,
) -> Result<Vec<Record>> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let mut item = record.clone();
            for feature in features.iter() {
                let params = scaling_params.get(feature).ok_or_else(|| {
                    Error::invalid_parameter(
                        "scaling_params",
                        format!("no scaling parameters for '{feature}'"),
                    )
                })?;
                let v = feature_value(record, index, feature)?;
                item.insert(feature.to_string(), json_number(params.unscale(v)));
            }
            Ok(item)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::{json, Value};

    fn records() -> Vec<Record> {
        [
            json!({"gamepk": 1, "time": 160.0, "total_score": 4}),
            json!({"gamepk": 2, "time": 200.0, "total_score": 4}),
            json!({"gamepk": 3, "time": 180.0, "total_score": 4}),
        ]
        .into_iter()
        .map(|v| match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        })
        .collect()
    }

    #[test]
    fn scales_into_unit_interval() {
        let features = FeatureList::new(["time", "total_score"]).unwrap();
        let out = normalize(&records(), &features).unwrap();

        let time = out.scaling_params["time"];
        assert_eq!((time.min, time.max, time.range), (160.0, 200.0, 40.0));

        let times: Vec<f64> = out
            .normalized_data
            .iter()
            .map(|r| r["time"].as_f64().unwrap())
            .collect();
        assert_eq!(times, vec![0.0, 1.0, 0.5]);
        assert_eq!(out.normalized_data[1]["gamepk"], json!(2));
    }

    #[test]
    fn zero_range_feature_maps_to_zero() {
        let features = FeatureList::new(["total_score"]).unwrap();
        let out = normalize(&records(), &features).unwrap();
        assert_eq!(out.scaling_params["total_score"].range, 0.0);
        for r in &out.normalized_data {
            assert_eq!(r["total_score"].as_f64(), Some(0.0));
        }
    }

    #[test]
    fn denormalize_restores_original_scale() {
        let features = FeatureList::new(["time"]).unwrap();
        let out = normalize(&records(), &features).unwrap();
        let back = denormalize(&out.normalized_data, &out.scaling_params, &features).unwrap();
        for (orig, restored) in records().iter().zip(&back) {
            assert_abs_diff_eq!(
                orig["time"].as_f64().unwrap(),
                restored["time"].as_f64().unwrap(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn missing_feature_fails() {
        let features = FeatureList::new(["lead_change_cnt"]).unwrap();
        assert!(matches!(
            normalize(&records(), &features),
            Err(Error::MissingFeature { index: 0, .. })
        ));
    }
}
