/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Count,
    Valid,
    Missing,
    Distinct,
    Sum,
    Product,
    Mean,
    Average,
    Variance,
    Variancep,
    Stdev,
    Stdevp,
    Stderr,
    Median,
    Q1,
    Q3,
    Ci0,
    Ci1,
    Min,
    Max,
    Argmin,
    Argmax,
    Values,
    Exponential,
    Exponentialb,
}

impl AggregateOp {
    pub fn name(&self) -> &'static str {
        use AggregateOp::*;
        match self {
            Count => "count",
            Valid => "valid",
            Missing => "missing",
            Distinct => "distinct",
            Sum => "sum",
            Product => "product",
            Mean => "mean",
            Average => "average",
            Variance => "variance",
            Variancep => "variancep",
            Stdev => "stdev",
            Stdevp => "stdevp",
            Stderr => "stderr",
            Median => "median",
            Q1 => "q1",
            Q3 => "q3",
            Ci0 => "ci0",
            Ci1 => "ci1",
            Min => "min",
            Max => "max",
            Argmin => "argmin",
            Argmax => "argmax",
            Values => "values",
            Exponential => "exponential",
            Exponentialb => "exponentialb",
        }
    }

    /// Whether the op accepts a numeric parameter
    pub fn takes_param(&self) -> bool {
        matches!(self, AggregateOp::Exponential | AggregateOp::Exponentialb)
    }
}

/// The `aggregate` property of an encoding field definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateSpec {
    Op(AggregateOp),
    ArgMin { argmin: String },
    ArgMax { argmax: String },
    Exponential { exponential: f64 },
}

impl AggregateSpec {
    pub fn op(&self) -> AggregateOp {
        match self {
            AggregateSpec::Op(op) => *op,
            AggregateSpec::ArgMin { .. } => AggregateOp::Argmin,
            AggregateSpec::ArgMax { .. } => AggregateOp::Argmax,
            AggregateSpec::Exponential { .. } => AggregateOp::Exponential,
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(self, AggregateSpec::Op(AggregateOp::Count))
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::aggregate::{AggregateOp, AggregateSpec};
    use serde_json::json;

    #[test]
    fn test_op_name_matches_serde() {
        for op in [AggregateOp::Q1, AggregateOp::Variancep, AggregateOp::Exponentialb] {
            assert_eq!(serde_json::to_value(op).unwrap(), json!(op.name()));
        }
    }

    #[test]
    fn test_parse_aggregate_spec() {
        let spec: AggregateSpec = serde_json::from_value(json!("mean")).unwrap();
        assert_eq!(spec, AggregateSpec::Op(AggregateOp::Mean));

        let spec: AggregateSpec = serde_json::from_value(json!({"argmax": "price"})).unwrap();
        assert_eq!(spec.op(), AggregateOp::Argmax);

        let spec: AggregateSpec = serde_json::from_value(json!({"exponential": 0.5})).unwrap();
        assert_eq!(spec.op(), AggregateOp::Exponential);
        assert!(spec.op().takes_param());
    }
}
