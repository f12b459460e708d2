/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::compile::context::{CompileContext, DiagnosticKind};
use crate::dataflow::node::{node_hash, DataflowNodeTrait};
use crate::spec::data::{DataDef, ParseDirective};
use crate::spec::encoding::{Encoding, FieldType};
use crate::spec::predicate::Predicate;
use crate::vega::transform::formula::FormulaTransformSpec;
use crate::vega::transform::TransformSpec;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use vlflow_common::column::ColumnUsage;
use vlflow_common::error::Result;
use vlflow_common::escape::{datum_ref, unescape_field};

/// Parse state inherited from enclosing models. A field maps to the directive it was already
/// coerced with, or to None when it must not be coerced (explicit null, or a derived field).
pub type AncestorParse = BTreeMap<String, Option<ParseDirective>>;

/// Coerces raw field values to typed values in place
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseNode {
    parse: BTreeMap<String, ParseDirective>,
}

impl ParseNode {
    pub fn new(parse: BTreeMap<String, ParseDirective>) -> Self {
        Self { parse }
    }

    pub fn parse(&self) -> &BTreeMap<String, ParseDirective> {
        &self.parse
    }

    pub fn is_empty(&self) -> bool {
        self.parse.is_empty()
    }

    /// Parse node for the `format.parse` entries of a data definition. Explicit nulls are
    /// recorded in `ancestor` so no implicit parse is added for those fields later on.
    pub fn make_explicit(
        data: &DataDef,
        ancestor: &mut AncestorParse,
        ctx: &mut CompileContext,
    ) -> Option<Self> {
        let mut parse = BTreeMap::new();
        for (field, directive) in data.explicit_parse()? {
            match directive {
                None => {
                    ancestor.insert(field.clone(), None);
                }
                Some(directive) => match ParseDirective::from_str(directive) {
                    Ok(directive) => {
                        parse.insert(field.clone(), directive);
                    }
                    Err(_) => ctx.warn(
                        DiagnosticKind::UnrecognizedParse,
                        format!("Unrecognized parse directive {directive:?} for field {field}"),
                    ),
                },
            }
        }
        Self::non_empty(parse, ancestor)
    }

    /// Parse node for the fields an encoding reads: temporal fields (and fields with a time
    /// unit) become dates, quantitative fields become numbers
    pub fn make_implicit_from_encoding(
        encoding: &Encoding,
        ancestor: &mut AncestorParse,
    ) -> Option<Self> {
        let mut parse = BTreeMap::new();
        for (_, field_def) in encoding.field_defs() {
            if !field_def.has_field() {
                continue;
            }
            let Some(field) = &field_def.field else {
                continue;
            };
            let directive = if field_def.time_unit.is_some()
                || field_def.type_ == Some(FieldType::Temporal)
            {
                ParseDirective::Date
            } else if field_def.type_ == Some(FieldType::Quantitative) {
                ParseDirective::Number
            } else {
                continue;
            };
            if Self::inherited(ancestor, field, &directive) {
                continue;
            }
            parse.insert(field.clone(), directive);
        }
        Self::non_empty(parse, ancestor)
    }

    /// Parse node for the fields a filter compares against literals
    pub fn make_implicit_from_predicate(
        predicate: &Predicate,
        ancestor: &mut AncestorParse,
    ) -> Option<Self> {
        let parse = predicate
            .implied_parse()
            .into_iter()
            .filter(|(field, directive)| !Self::inherited(ancestor, field, directive))
            .collect();
        Self::non_empty(parse, ancestor)
    }

    fn inherited(ancestor: &AncestorParse, field: &str, directive: &ParseDirective) -> bool {
        match ancestor.get(field) {
            Some(None) => true,
            Some(Some(existing)) => existing == directive,
            None => false,
        }
    }

    fn non_empty(
        parse: BTreeMap<String, ParseDirective>,
        ancestor: &mut AncestorParse,
    ) -> Option<Self> {
        if parse.is_empty() {
            return None;
        }
        for (field, directive) in &parse {
            ancestor.insert(field.clone(), Some(directive.clone()));
        }
        Some(Self { parse })
    }

    /// Union the two maps. Refused when a shared field is coerced differently.
    pub fn merge(&mut self, other: &ParseNode) -> bool {
        let conflict = other.parse.iter().any(|(field, directive)| {
            matches!(self.parse.get(field), Some(existing) if existing != directive)
        });
        if conflict {
            return false;
        }
        self.parse
            .extend(other.parse.iter().map(|(k, v)| (k.clone(), v.clone())));
        true
    }

    /// Directives in the form accepted by a data source's `format.parse`
    pub fn assemble_format_parse(&self) -> BTreeMap<String, String> {
        self.parse
            .iter()
            .map(|(field, directive)| (unescape_field(field), directive.to_string()))
            .collect()
    }

    fn coerce_expr(field: &str, directive: &ParseDirective) -> String {
        let datum = datum_ref(field);
        match directive {
            ParseDirective::Number => format!("toNumber({datum})"),
            ParseDirective::Boolean => format!("toBoolean({datum})"),
            ParseDirective::Date => format!("toDate({datum})"),
            ParseDirective::String => format!("toString({datum})"),
            ParseDirective::DateFormat(fmt) => format!("timeParse({datum}, '{fmt}')"),
            ParseDirective::UtcFormat(fmt) => format!("utcParse({datum}, '{fmt}')"),
        }
    }
}

impl DataflowNodeTrait for ParseNode {
    fn dependent_fields(&self) -> ColumnUsage {
        self.parse.keys().cloned().collect()
    }

    fn produced_fields(&self) -> ColumnUsage {
        self.parse.keys().cloned().collect()
    }

    fn hash(&self) -> Result<String> {
        node_hash("Parse", self)
    }

    fn assemble(&self, _ctx: &CompileContext) -> Result<Vec<TransformSpec>> {
        Ok(self
            .parse
            .iter()
            .map(|(field, directive)| {
                TransformSpec::Formula(FormulaTransformSpec::new(
                    Self::coerce_expr(field, directive),
                    unescape_field(field),
                ))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::CompileConfig;
    use crate::compile::context::{CompileContext, DiagnosticKind};
    use crate::dataflow::node::DataflowNodeTrait;
    use crate::dataflow::parse::{AncestorParse, ParseNode};
    use crate::spec::data::{DataDef, ParseDirective};
    use crate::spec::encoding::Encoding;
    use crate::spec::predicate::Predicate;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_implicit_from_encoding() {
        let encoding: Encoding = serde_json::from_value(json!({
            "x": {"field": "a", "type": "temporal"},
            "y": {"field": "b", "type": "quantitative"},
            "color": {"field": "c", "type": "nominal"},
            "size": {"aggregate": "count", "type": "quantitative"},
            "opacity": {"field": "d", "type": "ordinal", "timeUnit": "month"}
        }))
        .unwrap();
        let mut ancestor = AncestorParse::new();
        let node = ParseNode::make_implicit_from_encoding(&encoding, &mut ancestor).unwrap();
        let expected: BTreeMap<_, _> = vec![
            ("a".to_string(), ParseDirective::Date),
            ("b".to_string(), ParseDirective::Number),
            ("d".to_string(), ParseDirective::Date),
        ]
        .into_iter()
        .collect();
        assert_eq!(node.parse(), &expected);
        assert_eq!(ancestor.get("b"), Some(&Some(ParseDirective::Number)));
    }

    #[test]
    fn test_derived_and_inherited_fields_skipped() {
        let encoding: Encoding = serde_json::from_value(json!({
            "x": {"field": "b2", "type": "quantitative"},
            "y": {"field": "b", "type": "quantitative"}
        }))
        .unwrap();
        let mut ancestor = AncestorParse::new();
        ancestor.insert("b2".to_string(), None);
        ancestor.insert("b".to_string(), Some(ParseDirective::Number));
        assert!(ParseNode::make_implicit_from_encoding(&encoding, &mut ancestor).is_none());
    }

    #[test]
    fn test_from_predicate() {
        let predicate: Predicate = serde_json::from_value(json!({
            "and": [{"field": "a", "equal": 3}, {"field": "s", "oneOf": ["x", "y"]}]
        }))
        .unwrap();
        let node = ParseNode::make_implicit_from_predicate(&predicate, &mut AncestorParse::new())
            .unwrap();
        assert_eq!(node.parse().get("a"), Some(&ParseDirective::Number));
        assert_eq!(node.parse().get("s"), Some(&ParseDirective::String));
    }

    #[test]
    fn test_explicit_drops_unrecognized() {
        let data: DataDef = serde_json::from_value(json!({
            "url": "data.csv",
            "format": {"parse": {"a": "date:'%Y'", "b": "flarp", "c": null}}
        }))
        .unwrap();
        let mut ctx = CompileContext::new(CompileConfig::default());
        let mut ancestor = AncestorParse::new();
        let node = ParseNode::make_explicit(&data, &mut ancestor, &mut ctx).unwrap();
        assert_eq!(
            node.assemble_format_parse(),
            vec![("a".to_string(), "date:'%Y'".to_string())]
                .into_iter()
                .collect()
        );
        assert_eq!(ctx.diagnostics.len(), 1);
        assert_eq!(ctx.diagnostics[0].kind, DiagnosticKind::UnrecognizedParse);
        assert_eq!(ancestor.get("c"), Some(&None));

        let transforms = node.assemble(&ctx).unwrap();
        assert_eq!(
            serde_json::to_value(transforms).unwrap(),
            json!([{"type": "formula", "expr": "timeParse(datum[\"a\"], '%Y')", "as": "a"}])
        );
    }

    #[test]
    fn test_merge_conflict_refused() {
        let number = ParseNode::new(vec![("a".to_string(), ParseDirective::Number)].into_iter().collect());
        let date = ParseNode::new(vec![("a".to_string(), ParseDirective::Date)].into_iter().collect());
        let other = ParseNode::new(vec![("b".to_string(), ParseDirective::Date)].into_iter().collect());

        let mut node = number.clone();
        assert!(!node.merge(&date));
        assert_eq!(node, number);
        assert!(node.merge(&other));
        assert_eq!(node.parse().len(), 2);
    }
}
