/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::spec::encoding::Channel;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use vlflow_common::escape::var_name;

/// Explicit binning parameters. Two bin operations with equal parameters over the same field
/// compute identical columns, so the parameters (together with the field) form the bin key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BinParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extent: Option<[OrderedFloat<f64>; 2]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxbins: Option<OrderedFloat<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<OrderedFloat<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<OrderedFloat<f64>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minstep: Option<OrderedFloat<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<OrderedFloat<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub divide: Option<Vec<OrderedFloat<f64>>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<OrderedFloat<f64>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nice: Option<bool>,
}

/// The `bin` property of a field definition or bin transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinSpec {
    Bool(bool),
    Params(BinParams),
}

impl BinSpec {
    /// Resolve to explicit parameters. `true` picks the default bin count for the channel.
    pub fn to_params(&self, channel: Option<Channel>, default_maxbins: f64) -> Option<BinParams> {
        match self {
            BinSpec::Bool(false) => None,
            BinSpec::Bool(true) => Some(BinParams {
                maxbins: Some(OrderedFloat(auto_max_bins(channel, default_maxbins))),
                ..Default::default()
            }),
            BinSpec::Params(params) => Some(params.clone()),
        }
    }
}

/// Default number of bins for a channel. Channels whose values map onto a small discrete
/// range (facets, color, size, opacity and shape) get fewer bins.
pub fn auto_max_bins(channel: Option<Channel>, default_maxbins: f64) -> f64 {
    match channel {
        Some(
            Channel::Row
            | Channel::Column
            | Channel::Color
            | Channel::Size
            | Channel::Opacity
            | Channel::Shape,
        ) => 6.0,
        _ => default_maxbins,
    }
}

fn fmt_number(v: &OrderedFloat<f64>) -> String {
    v.0.to_string()
}

fn fmt_numbers<'a>(vals: impl IntoIterator<Item = &'a OrderedFloat<f64>>) -> String {
    vals.into_iter().map(fmt_number).join("_")
}

impl BinParams {
    /// Stable string for the parameters, e.g. `bin_maxbins_10`
    pub fn key_prefix(&self) -> String {
        let mut parts = vec!["bin".to_string()];
        if let Some(extent) = &self.extent {
            parts.push(format!("extent_{}", fmt_numbers(extent.iter())));
        }
        if let Some(maxbins) = &self.maxbins {
            parts.push(format!("maxbins_{}", fmt_number(maxbins)));
        }
        if let Some(step) = &self.step {
            parts.push(format!("step_{}", fmt_number(step)));
        }
        if let Some(steps) = &self.steps {
            parts.push(format!("steps_{}", fmt_numbers(steps.iter())));
        }
        if let Some(minstep) = &self.minstep {
            parts.push(format!("minstep_{}", fmt_number(minstep)));
        }
        if let Some(base) = &self.base {
            parts.push(format!("base_{}", fmt_number(base)));
        }
        if let Some(divide) = &self.divide {
            parts.push(format!("divide_{}", fmt_numbers(divide.iter())));
        }
        if let Some(anchor) = &self.anchor {
            parts.push(format!("anchor_{}", fmt_number(anchor)));
        }
        if let Some(nice) = &self.nice {
            parts.push(format!("nice_{nice}"));
        }
        var_name(&parts.join("_"))
    }

    /// Key identifying the columns computed by binning `field` with these parameters
    pub fn bin_key(&self, field: &str) -> String {
        var_name(&format!("{}_{}", self.key_prefix(), field))
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::bin::{BinParams, BinSpec};
    use crate::spec::encoding::Channel;
    use ordered_float::OrderedFloat;
    use serde_json::json;

    #[test]
    fn test_bin_key() {
        let params = BinParams {
            maxbins: Some(OrderedFloat(10.0)),
            ..Default::default()
        };
        assert_eq!(params.key_prefix(), "bin_maxbins_10");
        assert_eq!(params.bin_key("b"), "bin_maxbins_10_b");

        let params = BinParams {
            extent: Some([OrderedFloat(0.0), OrderedFloat(1.5)]),
            nice: Some(false),
            ..Default::default()
        };
        assert_eq!(params.bin_key("a.b"), "bin_extent_0_1_5_nice_false_a_b");
    }

    #[test]
    fn test_bin_true_uses_channel_default() {
        let spec: BinSpec = serde_json::from_value(json!(true)).unwrap();
        let x_params = spec.to_params(Some(Channel::X), 10.0).unwrap();
        let color_params = spec.to_params(Some(Channel::Color), 10.0).unwrap();
        assert_eq!(x_params.maxbins, Some(OrderedFloat(10.0)));
        assert_eq!(color_params.maxbins, Some(OrderedFloat(6.0)));

        let spec: BinSpec = serde_json::from_value(json!(false)).unwrap();
        assert_eq!(spec.to_params(Some(Channel::X), 10.0), None);
    }

    #[test]
    fn test_explicit_params_parse() {
        let spec: BinSpec = serde_json::from_value(json!({"maxbins": 20, "nice": true})).unwrap();
        let params = spec.to_params(Some(Channel::Y), 10.0).unwrap();
        assert_eq!(params.key_prefix(), "bin_maxbins_20_nice_true");
    }
}
