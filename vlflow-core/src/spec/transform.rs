/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::spec::aggregate::AggregateOp;
use crate::spec::bin::BinSpec;
use crate::spec::data::DataDef;
use crate::spec::predicate::Predicate;
use crate::vega::values::StringOrStringList;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A view-level transform directive, applied in the order given
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformDirective {
    Filter(FilterTransform),
    Calculate(CalculateTransform),
    Bin(BinTransform),
    TimeUnit(TimeUnitTransform),
    Aggregate(AggregateTransform),
    Lookup(LookupTransform),
    Sample(SampleTransform),
    /// Older `{field, expr}` form of calculate
    LegacyCalculate(LegacyCalculateTransform),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterTransform {
    pub filter: Predicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculateTransform {
    pub calculate: String,

    #[serde(rename = "as")]
    pub as_: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCalculateTransform {
    pub field: String,
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinTransform {
    pub bin: BinSpec,
    pub field: String,

    #[serde(rename = "as")]
    pub as_: StringOrStringList,
}

impl BinTransform {
    /// Start and end column names. A single name is the start column, and the end column
    /// gets an `_end` suffix.
    pub fn as_pair(&self) -> (String, String) {
        match &self.as_ {
            StringOrStringList::String(start) => (start.clone(), format!("{start}_end")),
            StringOrStringList::StringList(names) => {
                let start = names.first().cloned().unwrap_or_default();
                let end = names
                    .get(1)
                    .cloned()
                    .unwrap_or_else(|| format!("{start}_end"));
                (start, end)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeUnitTransform {
    #[serde(rename = "timeUnit")]
    pub time_unit: String,
    pub field: String,

    #[serde(rename = "as")]
    pub as_: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedFieldDef {
    pub op: AggregateOp,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(rename = "as")]
    pub as_: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateTransform {
    pub aggregate: Vec<AggregatedFieldDef>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groupby: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupFrom {
    pub data: DataDef,
    pub key: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupTransform {
    pub lookup: String,
    pub from: LookupFrom,

    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    pub as_: Option<StringOrStringList>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleTransform {
    pub sample: f64,
}

#[cfg(test)]
mod tests {
    use crate::spec::transform::TransformDirective;
    use serde_json::json;

    fn directive(value: serde_json::Value) -> TransformDirective {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_directive_variants() {
        assert!(matches!(
            directive(json!({"filter": "datum.a > 0"})),
            TransformDirective::Filter(_)
        ));
        assert!(matches!(
            directive(json!({"calculate": "datum.b * 2", "as": "b2"})),
            TransformDirective::Calculate(_)
        ));
        assert!(matches!(
            directive(json!({"bin": true, "field": "b", "as": "binned_b"})),
            TransformDirective::Bin(_)
        ));
        assert!(matches!(
            directive(json!({"timeUnit": "year", "field": "d", "as": "year_d"})),
            TransformDirective::TimeUnit(_)
        ));
        assert!(matches!(
            directive(json!({"aggregate": [{"op": "mean", "field": "b", "as": "mean_b"}], "groupby": ["a"]})),
            TransformDirective::Aggregate(_)
        ));
        assert!(matches!(
            directive(json!({"lookup": "id", "from": {"data": {"url": "people.csv"}, "key": "id"}})),
            TransformDirective::Lookup(_)
        ));
        assert!(matches!(
            directive(json!({"sample": 500})),
            TransformDirective::Sample(_)
        ));
        assert!(matches!(
            directive(json!({"field": "b2", "expr": "datum.b * 2"})),
            TransformDirective::LegacyCalculate(_)
        ));
    }

    #[test]
    fn test_bin_as_pair() {
        let TransformDirective::Bin(bin) =
            directive(json!({"bin": true, "field": "b", "as": "bb"}))
        else {
            panic!("expected bin")
        };
        assert_eq!(bin.as_pair(), ("bb".to_string(), "bb_end".to_string()));
    }
}
