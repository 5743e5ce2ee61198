use serde_json::{Number, Value};

use super::domain::{FeatureKind, FeatureVector, RawZoneRecord, FEATURE_COUNT};

pub const POSTCODE_KEY: &str = "postcode";

/// Batch-level failure: the request body is not a row or a list of rows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputShapeError {
    #[error("expected a zone object or a list of zone objects, got {found}")]
    UnsupportedShape { found: &'static str },
    #[error("row {index} is {found}, expected a zone object")]
    NonObjectRow { index: usize, found: &'static str },
}

/// Row-level failure; the orchestrator degrades just this row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowNormalizationError {
    #[error("postcode is missing")]
    MissingPostcode,
    #[error("postcode {value} contains no digits")]
    InvalidPostcode { value: String },
    #[error("{field} value {value} is not numeric")]
    InvalidField { field: &'static str, value: String },
    #[error("{field} value {value} is not finite")]
    NonFinite { field: &'static str, value: String },
}

/// Outcome of normalising one raw row. Failures keep whatever postcode
/// could be extracted so the degraded record still lines up with its input.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub postcode: Option<String>,
    pub features: Result<FeatureVector, RowNormalizationError>,
}

/// Splits a request body into raw rows. A bare object is a batch of one.
pub fn rows_from_value(input: &Value) -> Result<Vec<RawZoneRecord>, InputShapeError> {
    match input {
        Value::Object(map) => Ok(vec![RawZoneRecord::from(map.clone())]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(map) => Ok(RawZoneRecord::from(map.clone())),
                other => Err(InputShapeError::NonObjectRow {
                    index,
                    found: json_kind(other),
                }),
            })
            .collect(),
        other => Err(InputShapeError::UnsupportedShape {
            found: json_kind(other),
        }),
    }
}

/// Normalises every row independently, preserving input order.
pub fn normalize(records: &[RawZoneRecord]) -> Vec<NormalizedRow> {
    records.iter().map(normalize_row).collect()
}

pub fn normalize_row(record: &RawZoneRecord) -> NormalizedRow {
    let postcode = extract_postcode(record);
    let features = postcode
        .clone()
        .and_then(|postcode| build_vector(record, postcode));

    NormalizedRow {
        postcode: postcode.ok(),
        features,
    }
}

pub fn normalize_record(record: &RawZoneRecord) -> Result<FeatureVector, RowNormalizationError> {
    normalize_row(record).features
}

fn build_vector(
    record: &RawZoneRecord,
    postcode: String,
) -> Result<FeatureVector, RowNormalizationError> {
    let mut values = [0.0; FEATURE_COUNT];
    for kind in FeatureKind::ALL {
        values[kind.index()] = feature_value(record, kind)?;
    }
    Ok(FeatureVector::from_parts(postcode, values))
}

fn extract_postcode(record: &RawZoneRecord) -> Result<String, RowNormalizationError> {
    let raw = match record.get(POSTCODE_KEY) {
        None | Some(Value::Null) => return Err(RowNormalizationError::MissingPostcode),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number_text(number),
        Some(other) => {
            return Err(RowNormalizationError::InvalidPostcode {
                value: other.to_string(),
            })
        }
    };

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(RowNormalizationError::InvalidPostcode { value: raw });
    }
    Ok(digits)
}

fn number_text(number: &Number) -> String {
    if let Some(value) = number.as_u64() {
        return value.to_string();
    }
    if let Some(value) = number.as_i64() {
        return value.to_string();
    }
    match number.as_f64() {
        Some(value) if value.is_finite() && value.fract() == 0.0 => format!("{value:.0}"),
        _ => number.to_string(),
    }
}

fn feature_value(record: &RawZoneRecord, kind: FeatureKind) -> Result<f64, RowNormalizationError> {
    let mut candidate = record.get(kind.key()).filter(|value| !value.is_null());
    if candidate.is_none() {
        candidate = kind
            .alias()
            .and_then(|alias| record.get(alias))
            .filter(|value| !value.is_null());
    }

    let Some(raw) = candidate else {
        return Ok(kind.default_value());
    };

    let value = match coerce(kind, raw)? {
        Some(value) => value,
        None => return Ok(kind.default_value()),
    };

    if !value.is_finite() {
        return Err(RowNormalizationError::NonFinite {
            field: kind.key(),
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// `Ok(None)` means the field was effectively blank and takes its default.
fn coerce(kind: FeatureKind, raw: &Value) -> Result<Option<f64>, RowNormalizationError> {
    let invalid = || RowNormalizationError::InvalidField {
        field: kind.key(),
        value: raw.to_string(),
    };

    match raw {
        Value::Number(number) => number.as_f64().map(Some).ok_or_else(invalid),
        Value::Bool(flag) => Ok(Some(if *flag { 1.0 } else { 0.0 })),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if let Ok(value) = trimmed.parse::<f64>() {
                return Ok(Some(value));
            }
            encoded_label(kind, trimmed).map(Some).ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn encoded_label(kind: FeatureKind, label: &str) -> Option<f64> {
    let label = label.to_ascii_lowercase();
    match (kind, label.as_str()) {
        (FeatureKind::HousingSupply, "high") => Some(1.0),
        (FeatureKind::HousingSupply, "moderate") => Some(0.5),
        (FeatureKind::HousingSupply, "low") => Some(0.0),
        (FeatureKind::Immigration, "increasing") => Some(1.0),
        (FeatureKind::Immigration, "stable") => Some(0.5),
        (FeatureKind::Immigration, "decreasing") => Some(0.0),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawZoneRecord {
        serde_json::from_value(value).expect("object record")
    }

    #[test]
    fn missing_fields_take_defaults() {
        let vector = normalize_record(&record(json!({ "postcode": "2000" }))).expect("valid row");
        assert_eq!(vector.postcode(), "2000");
        for kind in FeatureKind::ALL {
            assert_eq!(vector.value(kind), kind.default_value(), "{}", kind.key());
        }
    }

    #[test]
    fn each_missing_field_is_defaulted_independently() {
        for missing in FeatureKind::ALL {
            let mut row = RawZoneRecord::new().with("postcode", "2026");
            for kind in FeatureKind::ALL.into_iter().filter(|kind| *kind != missing) {
                row.insert(kind.key(), 42.0);
            }
            let vector = normalize_record(&row).expect("valid row");
            assert_eq!(vector.value(missing), missing.default_value());
            for kind in FeatureKind::ALL.into_iter().filter(|kind| *kind != missing) {
                assert_eq!(vector.value(kind), 42.0);
            }
        }
    }

    #[test]
    fn postcode_keeps_only_digits() {
        let vector = normalize_record(&record(json!({ "postcode": "NSW 2000-A" }))).expect("valid");
        assert_eq!(vector.postcode(), "2000");

        let vector = normalize_record(&record(json!({ "postcode": 2028 }))).expect("valid");
        assert_eq!(vector.postcode(), "2028");

        let vector = normalize_record(&record(json!({ "postcode": 2026.0 }))).expect("valid");
        assert_eq!(vector.postcode(), "2026");
    }

    #[test]
    fn postcode_without_digits_is_rejected() {
        let row = normalize_row(&record(json!({ "postcode": "abc" })));
        assert_eq!(row.postcode, None);
        assert_eq!(
            row.features,
            Err(RowNormalizationError::InvalidPostcode {
                value: "abc".to_string()
            })
        );

        let row = normalize_row(&record(json!({ "growth_rate": 0.1 })));
        assert_eq!(row.features, Err(RowNormalizationError::MissingPostcode));
    }

    #[test]
    fn uncoercible_metric_flags_the_row_but_keeps_postcode() {
        let row = normalize_row(&record(json!({ "postcode": "2000", "wages": "lots" })));
        assert_eq!(row.postcode.as_deref(), Some("2000"));
        assert!(matches!(
            row.features,
            Err(RowNormalizationError::InvalidField { field: "wages", .. })
        ));
    }

    #[test]
    fn numeric_strings_booleans_and_labels_are_coerced() {
        let vector = normalize_record(&record(json!({
            "postcode": "2000",
            "growth_rate": " 0.05 ",
            "crime_rate": null,
            "sentiment": true,
            "housing_supply_encoded": "High",
            "immigration": "decreasing",
        })))
        .expect("valid row");

        assert_eq!(vector.growth_rate(), 0.05);
        assert_eq!(vector.crime_rate(), FeatureKind::CrimeRate.default_value());
        assert_eq!(vector.sentiment(), 1.0);
        assert_eq!(vector.housing_supply(), 1.0);
        assert_eq!(vector.immigration(), 0.0);
    }

    #[test]
    fn non_finite_strings_are_rejected() {
        let row = normalize_row(&record(json!({ "postcode": "2000", "growth_rate": "NaN" })));
        assert!(matches!(
            row.features,
            Err(RowNormalizationError::NonFinite {
                field: "growth_rate",
                ..
            })
        ));
    }

    #[test]
    fn normalize_is_idempotent_and_order_preserving() {
        let rows = vec![
            record(json!({ "postcode": "2000", "growth_rate": 0.05 })),
            record(json!({ "postcode": "abc" })),
            record(json!({ "postcode": "2028", "wages": 90000 })),
        ];

        let first = normalize(&rows);
        let second = normalize(&rows);
        assert_eq!(first, second);
        assert_eq!(first[0].postcode.as_deref(), Some("2000"));
        assert!(first[1].features.is_err());
        assert_eq!(first[2].postcode.as_deref(), Some("2028"));
    }

    #[test]
    fn rows_from_value_accepts_objects_and_lists() {
        assert_eq!(rows_from_value(&json!({ "postcode": "2000" })).expect("object").len(), 1);
        assert!(rows_from_value(&json!([])).expect("empty list").is_empty());
        assert_eq!(
            rows_from_value(&json!([{ "postcode": "1" }, { "postcode": "2" }]))
                .expect("list")
                .len(),
            2
        );
    }

    #[test]
    fn rows_from_value_rejects_other_shapes() {
        assert_eq!(
            rows_from_value(&json!("2000")),
            Err(InputShapeError::UnsupportedShape { found: "a string" })
        );
        assert_eq!(
            rows_from_value(&json!([{ "postcode": "2000" }, 7])),
            Err(InputShapeError::NonObjectRow {
                index: 1,
                found: "a number"
            })
        );
    }
}
