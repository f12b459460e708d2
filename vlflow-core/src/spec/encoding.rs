/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::spec::aggregate::AggregateSpec;
use crate::spec::bin::{BinParams, BinSpec};
use crate::spec::timeunit::TimeUnit;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Encoding channels, declared in the order in which they are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    X,
    Y,
    X2,
    Y2,
    Row,
    Column,
    Color,
    Fill,
    Stroke,
    Opacity,
    Size,
    Shape,
    Detail,
    Key,
    Text,
    Tooltip,
    Href,
    Order,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::X => "x",
            Channel::Y => "y",
            Channel::X2 => "x2",
            Channel::Y2 => "y2",
            Channel::Row => "row",
            Channel::Column => "column",
            Channel::Color => "color",
            Channel::Fill => "fill",
            Channel::Stroke => "stroke",
            Channel::Opacity => "opacity",
            Channel::Size => "size",
            Channel::Shape => "shape",
            Channel::Detail => "detail",
            Channel::Key => "key",
            Channel::Text => "text",
            Channel::Tooltip => "tooltip",
            Channel::Href => "href",
            Channel::Order => "order",
        }
    }

    pub fn is_position(&self) -> bool {
        matches!(self, Channel::X | Channel::Y)
    }

    pub fn is_facet(&self) -> bool {
        matches!(self, Channel::Row | Channel::Column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Quantitative,
    Temporal,
    Ordinal,
    Nominal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleDef {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Value>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl ScaleDef {
    pub fn is_log(&self) -> bool {
        self.type_.as_deref() == Some("log")
    }

    /// Whether the scale domain is computed from the data before aggregation
    pub fn is_unaggregated_domain(&self) -> bool {
        matches!(&self.domain, Some(Value::String(s)) if s == "unaggregated")
    }
}

/// Stack offset requested by a field definition. `false` and `"none"` both disable stacking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StackSpec {
    Bool(bool),
    Offset(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<FieldType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateSpec>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<BinSpec>,

    #[serde(rename = "timeUnit", skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleDef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackSpec>,

    #[serde(rename = "bandPosition", skip_serializing_if = "Option::is_none")]
    pub band_position: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl FieldDef {
    pub fn is_count(&self) -> bool {
        matches!(&self.aggregate, Some(agg) if agg.is_count())
    }

    /// A definition that names no data (neither a field, nor a constant, nor a count)
    pub fn is_empty(&self) -> bool {
        self.field.is_none() && self.value.is_none() && !self.is_count()
    }

    /// Whether this definition reads a column of the input data
    pub fn has_field(&self) -> bool {
        self.field.is_some() && !self.is_count()
    }

    /// Parsed time unit. Invalid units are removed while the model is normalized.
    pub fn time_unit(&self) -> Option<TimeUnit> {
        self.time_unit
            .as_deref()
            .and_then(|tu| TimeUnit::from_str(tu).ok())
    }

    /// Bin parameters. `bin: true` is replaced by explicit parameters while the model is
    /// normalized, so only explicit parameters are reported here.
    pub fn bin_params(&self) -> Option<&BinParams> {
        match &self.bin {
            Some(BinSpec::Params(params)) => Some(params),
            _ => None,
        }
    }

    pub fn is_binned(&self) -> bool {
        self.bin_params().is_some()
    }

    pub fn is_continuous(&self) -> bool {
        matches!(
            self.type_,
            Some(FieldType::Quantitative | FieldType::Temporal)
        )
    }

    pub fn is_descending(&self) -> bool {
        matches!(&self.sort, Some(Value::String(s)) if s == "descending")
    }

    pub fn is_unaggregated_domain(&self) -> bool {
        self.scale
            .as_ref()
            .map(|s| s.is_unaggregated_domain())
            .unwrap_or(false)
    }

    pub fn has_log_scale(&self) -> bool {
        self.scale.as_ref().map(|s| s.is_log()).unwrap_or(false)
    }

    /// Name of the column holding this definition's values after all derived fields have been
    /// computed, e.g. `sum_b`, `yearmonth_date`, `bin_maxbins_10_b` or `count_*`
    pub fn field_ref(&self) -> String {
        self.field_ref_with_suffix(None)
    }

    /// Like [`FieldDef::field_ref`], but selects a companion column: for binned fields
    /// `end`, `mid` and `range` select the corresponding bin column, any other suffix is
    /// appended to the name.
    pub fn field_ref_with_suffix(&self, suffix: Option<&str>) -> String {
        if self.is_count() {
            return "count_*".to_string();
        }
        let field = self.field.clone().unwrap_or_default();
        if let Some(agg) = &self.aggregate {
            let inner = match agg {
                AggregateSpec::ArgMin { argmin } => argmin.clone(),
                AggregateSpec::ArgMax { argmax } => argmax.clone(),
                _ => self.unaggregated_ref(&field),
            };
            let name = format!("{}_{}", agg.op().name(), inner);
            return append_suffix(name, suffix);
        }
        if let Some(params) = self.bin_params() {
            let prefix = params.bin_key(&field);
            return match suffix {
                None => format!("{prefix}_start"),
                Some(s @ ("start" | "end" | "mid" | "range")) => format!("{prefix}_{s}"),
                Some(s) => format!("{prefix}_start_{s}"),
            };
        }
        append_suffix(self.unaggregated_ref(&field), suffix)
    }

    fn unaggregated_ref(&self, field: &str) -> String {
        match self.time_unit() {
            Some(tu) => tu.field_alias(field),
            None => field.to_string(),
        }
    }
}

fn append_suffix(name: String, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{name}_{suffix}"),
        None => name,
    }
}

/// A channel maps to a single field definition, or to a list for `detail` and `tooltip`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelDef {
    Field(FieldDef),
    Fields(Vec<FieldDef>),
}

impl ChannelDef {
    pub fn field_defs(&self) -> Vec<&FieldDef> {
        match self {
            ChannelDef::Field(fd) => vec![fd],
            ChannelDef::Fields(fds) => fds.iter().collect(),
        }
    }

    pub fn field_defs_mut(&mut self) -> Vec<&mut FieldDef> {
        match self {
            ChannelDef::Field(fd) => vec![fd],
            ChannelDef::Fields(fds) => fds.iter_mut().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Encoding(pub BTreeMap<Channel, ChannelDef>);

impl Encoding {
    /// All field definitions in channel order
    pub fn field_defs(&self) -> Vec<(Channel, &FieldDef)> {
        self.0
            .iter()
            .flat_map(|(channel, def)| def.field_defs().into_iter().map(|fd| (*channel, fd)))
            .collect()
    }

    /// The first field definition of a channel
    pub fn get(&self, channel: Channel) -> Option<&FieldDef> {
        self.0
            .get(&channel)
            .and_then(|def| def.field_defs().into_iter().next())
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0.contains_key(&channel)
    }

    pub fn is_aggregate(&self) -> bool {
        self.field_defs()
            .iter()
            .any(|(_, fd)| fd.aggregate.is_some())
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::encoding::{Channel, Encoding, FieldDef};
    use serde_json::json;

    fn field_def(value: serde_json::Value) -> FieldDef {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_field_refs() {
        let fd = field_def(json!({"field": "b", "type": "quantitative", "aggregate": "sum"}));
        assert_eq!(fd.field_ref(), "sum_b");

        let fd = field_def(json!({"aggregate": "count", "type": "quantitative"}));
        assert_eq!(fd.field_ref(), "count_*");
        assert!(!fd.has_field());

        let fd = field_def(json!({"field": "date", "type": "temporal", "timeUnit": "yearmonth"}));
        assert_eq!(fd.field_ref(), "yearmonth_date");
        assert_eq!(fd.field_ref_with_suffix(Some("end")), "yearmonth_date_end");

        let fd = field_def(json!({"field": "b", "type": "quantitative", "bin": {"maxbins": 10}}));
        assert_eq!(fd.field_ref(), "bin_maxbins_10_b_start");
        assert_eq!(fd.field_ref_with_suffix(Some("end")), "bin_maxbins_10_b_end");
        assert_eq!(fd.field_ref_with_suffix(Some("range")), "bin_maxbins_10_b_range");
    }

    #[test]
    fn test_encoding_channel_order() {
        let encoding: Encoding = serde_json::from_value(json!({
            "tooltip": [{"field": "c", "type": "nominal"}, {"field": "d", "type": "nominal"}],
            "y": {"field": "b", "type": "quantitative"},
            "x": {"field": "a", "type": "ordinal"}
        }))
        .unwrap();
        let channels: Vec<_> = encoding
            .field_defs()
            .iter()
            .map(|(channel, fd)| (*channel, fd.field.clone().unwrap()))
            .collect();
        assert_eq!(
            channels,
            vec![
                (Channel::X, "a".to_string()),
                (Channel::Y, "b".to_string()),
                (Channel::Tooltip, "c".to_string()),
                (Channel::Tooltip, "d".to_string()),
            ]
        );
    }
}
