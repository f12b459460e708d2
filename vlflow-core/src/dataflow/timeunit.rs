/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::config::TimeUnitOutput;
use crate::compile::context::{CompileContext, DiagnosticKind};
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use crate::spec::encoding::Encoding;
use crate::spec::timeunit::TimeUnit;
use crate::spec::transform::TimeUnitTransform;
use crate::vega::transform::formula::FormulaTransformSpec;
use crate::vega::transform::timeunit::{TimeUnitTransformSpec, TimeZone};
use crate::vega::transform::TransformSpec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;
use vlflow_common::escape::unescape_field;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeUnitComponent {
    pub field: String,
    pub time_unit: TimeUnit,
}

/// Time unit projections keyed by output alias
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeUnitNode {
    formula: BTreeMap<String, TimeUnitComponent>,
}

impl TimeUnitNode {
    pub fn make_from_encoding(encoding: &Encoding) -> Option<Self> {
        let mut formula = BTreeMap::new();
        for (_, field_def) in encoding.field_defs() {
            let (Some(time_unit), Some(field)) = (field_def.time_unit(), &field_def.field) else {
                continue;
            };
            if !field_def.has_field() {
                continue;
            }
            formula.insert(
                time_unit.field_alias(field),
                TimeUnitComponent {
                    field: field.clone(),
                    time_unit,
                },
            );
        }
        if formula.is_empty() {
            None
        } else {
            Some(Self { formula })
        }
    }

    pub fn make_from_transform(
        transform: &TimeUnitTransform,
        ctx: &mut CompileContext,
    ) -> Option<Self> {
        match TimeUnit::from_str(&transform.time_unit) {
            Ok(time_unit) => Some(Self {
                formula: vec![(
                    transform.as_.clone(),
                    TimeUnitComponent {
                        field: transform.field.clone(),
                        time_unit,
                    },
                )]
                .into_iter()
                .collect(),
            }),
            Err(err) => {
                ctx.warn(DiagnosticKind::InvalidTimeUnit, err.to_string());
                None
            }
        }
    }

    pub fn components(&self) -> &BTreeMap<String, TimeUnitComponent> {
        &self.formula
    }

    /// Keep only the components for which `f` returns true
    pub fn retain<F: FnMut(&String, &TimeUnitComponent) -> bool>(&mut self, mut f: F) {
        self.formula.retain(|alias, component| f(alias, component));
    }

    pub fn is_empty(&self) -> bool {
        self.formula.is_empty()
    }

    pub fn merge(&mut self, other: &TimeUnitNode) {
        self.formula.extend(
            other
                .formula
                .iter()
                .map(|(alias, component)| (alias.clone(), component.clone())),
        );
    }
}

impl DataflowNodeTrait for TimeUnitNode {
    fn dependent_fields(&self) -> ColumnUsage {
        self.formula.values().map(|c| c.field.clone()).collect()
    }

    fn produced_fields(&self) -> ColumnUsage {
        self.formula
            .keys()
            .flat_map(|alias| [alias.clone(), format!("{alias}_end")])
            .collect()
    }

    fn hash(&self) -> Result<String> {
        node_hash("TimeUnit", self)
    }

    fn assemble(&self, ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        Ok(self
            .formula
            .iter()
            .map(|(alias, component)| {
                let TimeUnitComponent { field, time_unit } = component;
                if ctx.config.time_unit_output == TimeUnitOutput::Transform
                    || time_unit.requires_transform()
                {
                    let alias = unescape_field(alias);
                    TransformSpec::TimeUnit(TimeUnitTransformSpec {
                        field: unescape_field(field),
                        units: time_unit.vega_units(),
                        timezone: if time_unit.utc {
                            TimeZone::Utc
                        } else {
                            TimeZone::Local
                        },
                        as_: [alias.clone(), format!("{alias}_end")],
                    })
                } else {
                    TransformSpec::Formula(FormulaTransformSpec::new(
                        time_unit.field_expr(field),
                        unescape_field(alias),
                    ))
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::{CompileConfig, TimeUnitOutput};
    use crate::compile::context::CompileContext;
    use crate::dataflow::node::DataflowNodeTrait;
    use crate::dataflow::timeunit::TimeUnitNode;
    use crate::spec::encoding::Encoding;
    use serde_json::json;

    fn encoding() -> Encoding {
        serde_json::from_value(json!({
            "x": {"field": "date", "type": "temporal", "timeUnit": "yearmonth"},
            "y": {"field": "date", "type": "temporal", "timeUnit": "utcweek"}
        }))
        .unwrap()
    }

    #[test]
    fn test_formula_output() {
        let ctx = CompileContext::new(CompileConfig::default());
        let node = TimeUnitNode::make_from_encoding(&encoding()).unwrap();
        assert_eq!(
            serde_json::to_value(node.assemble(&ctx).unwrap()).unwrap(),
            json!([
                {
                    "type": "timeunit",
                    "field": "date",
                    "units": ["week"],
                    "timezone": "utc",
                    "as": ["utcweek_date", "utcweek_date_end"]
                },
                {
                    "type": "formula",
                    "expr": "datetime(year(datum[\"date\"]), month(datum[\"date\"]), 1, 0, 0, 0, 0)",
                    "as": "yearmonth_date"
                }
            ])
        );
    }

    #[test]
    fn test_transform_output() {
        let ctx = CompileContext::new(CompileConfig {
            time_unit_output: TimeUnitOutput::Transform,
            ..Default::default()
        });
        let node = TimeUnitNode::make_from_encoding(&encoding()).unwrap();
        let transforms = serde_json::to_value(node.assemble(&ctx).unwrap()).unwrap();
        assert_eq!(transforms[1]["units"], json!(["year", "month"]));
        assert_eq!(transforms[1]["timezone"], json!("local"));
    }

    #[test]
    fn test_merge_unions() {
        let mut node = TimeUnitNode::make_from_encoding(&encoding()).unwrap();
        let other: Encoding = serde_json::from_value(json!({
            "x": {"field": "other", "type": "temporal", "timeUnit": "year"}
        }))
        .unwrap();
        node.merge(&TimeUnitNode::make_from_encoding(&other).unwrap());
        assert_eq!(node.components().len(), 3);
    }
}
