/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::spec::data::ParseDirective;
use crate::spec::timeunit::{SingleTimeUnit, TimeUnit};
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use vlflow_common::error::{Result, VlFlowError};
use vlflow_common::escape::{datum_ref, quote_string};

lazy_static! {
    static ref DATUM_DOT_RE: Regex =
        Regex::new(r"datum\.([A-Za-z_$][A-Za-z0-9_$]*)").expect("valid regex");
    static ref DATUM_BRACKET_RE: Regex =
        Regex::new(r#"datum\[\s*(?:"([^"]*)"|'([^']*)')\s*\]"#).expect("valid regex");
}

/// Fields of the current row referenced by an expression, as `datum.x` or `datum["x"]`
pub fn expression_fields(expr: &str) -> BTreeSet<String> {
    let mut fields: BTreeSet<String> = DATUM_DOT_RE
        .captures_iter(expr)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();
    for cap in DATUM_BRACKET_RE.captures_iter(expr) {
        if let Some(m) = cap.get(1).or_else(|| cap.get(2)) {
            fields.insert(m.as_str().to_string());
        }
    }
    fields
}

/// A filter predicate. Field predicates compare a field, optionally truncated to a time unit,
/// against literals. Logical composition nests predicates. Any other string is a raw
/// expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Predicate {
    And {
        and: Vec<Predicate>,
    },
    Or {
        or: Vec<Predicate>,
    },
    Not {
        not: Box<Predicate>,
    },
    Equal {
        field: String,
        equal: Value,
        #[serde(rename = "timeUnit", skip_serializing_if = "Option::is_none")]
        time_unit: Option<TimeUnit>,
    },
    Range {
        field: String,
        range: [Value; 2],
        #[serde(rename = "timeUnit", skip_serializing_if = "Option::is_none")]
        time_unit: Option<TimeUnit>,
    },
    OneOf {
        field: String,
        #[serde(rename = "oneOf")]
        one_of: Vec<Value>,
        #[serde(rename = "timeUnit", skip_serializing_if = "Option::is_none")]
        time_unit: Option<TimeUnit>,
    },
    Expr(String),
}

impl Predicate {
    /// Vega expression that evaluates the predicate against `datum`
    pub fn to_expr(&self) -> Result<String> {
        Ok(match self {
            Predicate::And { and } => {
                let parts = and.iter().map(|p| p.to_expr()).collect::<Result<Vec<_>>>()?;
                parts.iter().map(|p| format!("({p})")).join(" && ")
            }
            Predicate::Or { or } => {
                let parts = or.iter().map(|p| p.to_expr()).collect::<Result<Vec<_>>>()?;
                parts.iter().map(|p| format!("({p})")).join(" || ")
            }
            Predicate::Not { not } => format!("!({})", not.to_expr()?),
            Predicate::Equal {
                field,
                equal,
                time_unit,
            } => {
                let (lhs, rhs) = compared_pair(field, time_unit, equal)?;
                format!("{lhs}==={rhs}")
            }
            Predicate::Range {
                field,
                range,
                time_unit,
            } => {
                let lower = if range[0].is_null() {
                    None
                } else {
                    Some(compared_pair(field, time_unit, &range[0])?)
                };
                let upper = if range[1].is_null() {
                    None
                } else {
                    Some(compared_pair(field, time_unit, &range[1])?)
                };
                match (lower, upper) {
                    (Some((lhs, lo)), Some((_, hi))) => format!("inrange({lhs}, [{lo}, {hi}])"),
                    (Some((lhs, lo)), None) => format!("{lhs} >= {lo}"),
                    (None, Some((lhs, hi))) => format!("{lhs} <= {hi}"),
                    (None, None) => "true".to_string(),
                }
            }
            Predicate::OneOf {
                field,
                one_of,
                time_unit,
            } => {
                let mut lhs = field_expr(field, time_unit, false);
                let mut values = Vec::with_capacity(one_of.len());
                for v in one_of {
                    let (l, r) = compared_pair(field, time_unit, v)?;
                    lhs = l;
                    values.push(r);
                }
                format!("indexof([{}], {lhs}) !== -1", values.join(", "))
            }
            Predicate::Expr(expr) => expr.clone(),
        })
    }

    /// Fields read by the predicate
    pub fn fields(&self) -> BTreeSet<String> {
        match self {
            Predicate::And { and: preds } | Predicate::Or { or: preds } => {
                preds.iter().flat_map(|p| p.fields()).collect()
            }
            Predicate::Not { not } => not.fields(),
            Predicate::Equal { field, .. }
            | Predicate::Range { field, .. }
            | Predicate::OneOf { field, .. } => vec![field.clone()].into_iter().collect(),
            Predicate::Expr(expr) => expression_fields(expr),
        }
    }

    /// Parse directives implied by comparing fields against literals. A field compared under a
    /// time unit, or against a date-time object, must be parsed as a date.
    pub fn implied_parse(&self) -> BTreeMap<String, ParseDirective> {
        let mut parse = BTreeMap::new();
        self.collect_implied_parse(&mut parse);
        parse
    }

    fn collect_implied_parse(&self, parse: &mut BTreeMap<String, ParseDirective>) {
        let (field, time_unit, literal) = match self {
            Predicate::And { and: preds } | Predicate::Or { or: preds } => {
                for p in preds {
                    p.collect_implied_parse(parse);
                }
                return;
            }
            Predicate::Not { not } => {
                not.collect_implied_parse(parse);
                return;
            }
            Predicate::Expr(_) => return,
            Predicate::Equal {
                field,
                equal,
                time_unit,
            } => (field, time_unit, Some(equal)),
            Predicate::Range {
                field,
                range,
                time_unit,
            } => (field, time_unit, range.iter().find(|v| !v.is_null())),
            Predicate::OneOf {
                field,
                one_of,
                time_unit,
            } => (field, time_unit, one_of.first()),
        };
        let directive = if time_unit.is_some() {
            Some(ParseDirective::Date)
        } else {
            literal.and_then(ParseDirective::for_literal)
        };
        if let Some(directive) = directive {
            parse.entry(field.clone()).or_insert(directive);
        }
    }
}

fn field_expr(field: &str, time_unit: &Option<TimeUnit>, as_time: bool) -> String {
    match time_unit {
        Some(tu) => format!("time({})", tu.field_expr(field)),
        None if as_time => format!("time({})", datum_ref(field)),
        None => datum_ref(field),
    }
}

/// The compared field expression and the literal expression. Dates are compared by their
/// timestamps.
fn compared_pair(
    field: &str,
    time_unit: &Option<TimeUnit>,
    literal: &Value,
) -> Result<(String, String)> {
    if let Value::Object(_) = literal {
        let dt: DateTime = serde_json::from_value(literal.clone())?;
        let rhs = match time_unit {
            Some(tu) => dt.truncated(tu).to_expr()?,
            None => dt.to_expr()?,
        };
        return Ok((field_expr(field, time_unit, true), format!("time({rhs})")));
    }
    if let Some(tu) = time_unit {
        let rhs = match literal {
            Value::String(s) => format!("time({})", quote_string(s)),
            Value::Number(n) => match (tu.units.as_slice(), n.as_f64()) {
                ([unit], Some(v)) => match DateTime::from_component(*unit, v, tu.utc) {
                    Some(dt) => format!("time({})", dt.to_expr()?),
                    None => format!("time({n})"),
                },
                _ => format!("time({n})"),
            },
            other => format!("time({other})"),
        };
        return Ok((field_expr(field, time_unit, true), rhs));
    }
    Ok((field_expr(field, time_unit, false), literal_expr(literal)))
}

fn literal_expr(value: &Value) -> String {
    match value {
        Value::String(s) => quote_string(s),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MonthSpec {
    Number(f64),
    Name(String),
}

/// A date-time literal object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarter: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<MonthSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milliseconds: Option<f64>,
    #[serde(default)]
    pub utc: bool,
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

fn num(v: f64) -> String {
    v.to_string()
}

impl DateTime {
    /// Date-time with a single component set, used for numeric literals compared under a
    /// single time unit (e.g. `3` under `month` is March)
    pub fn from_component(unit: SingleTimeUnit, value: f64, utc: bool) -> Option<DateTime> {
        let mut dt = DateTime {
            utc,
            ..Default::default()
        };
        match unit {
            SingleTimeUnit::Year => dt.year = Some(value),
            SingleTimeUnit::Quarter => dt.quarter = Some(value),
            SingleTimeUnit::Month => dt.month = Some(MonthSpec::Number(value)),
            SingleTimeUnit::Date | SingleTimeUnit::DayOfYear => dt.date = Some(value),
            SingleTimeUnit::Day => dt.day = Some(Value::from(value as i64)),
            SingleTimeUnit::Hours => dt.hours = Some(value),
            SingleTimeUnit::Minutes => dt.minutes = Some(value),
            SingleTimeUnit::Seconds => dt.seconds = Some(value),
            SingleTimeUnit::Milliseconds => dt.milliseconds = Some(value),
            SingleTimeUnit::Week => return None,
        }
        Some(dt)
    }

    /// Keep only the components selected by a time unit
    pub fn truncated(&self, time_unit: &TimeUnit) -> DateTime {
        use SingleTimeUnit::*;
        let keep = |unit| time_unit.contains(unit);
        DateTime {
            year: self.year.filter(|_| keep(Year)),
            quarter: self.quarter.filter(|_| keep(Quarter)),
            month: self.month.clone().filter(|_| keep(Month)),
            date: self.date.filter(|_| keep(Date) || keep(DayOfYear)),
            day: self.day.clone().filter(|_| keep(Day)),
            hours: self.hours.filter(|_| keep(Hours)),
            minutes: self.minutes.filter(|_| keep(Minutes)),
            seconds: self.seconds.filter(|_| keep(Seconds)),
            milliseconds: self.milliseconds.filter(|_| keep(Milliseconds)),
            utc: time_unit.utc,
        }
    }

    fn month_index(&self) -> Result<Option<String>> {
        match &self.month {
            None => Ok(None),
            Some(MonthSpec::Number(m)) => Ok(Some(num(m - 1.0))),
            Some(MonthSpec::Name(name)) => {
                let lower = name.to_lowercase();
                let index = MONTHS
                    .iter()
                    .position(|m| lower.len() >= 3 && m.starts_with(&lower))
                    .ok_or_else(|| {
                        VlFlowError::specification(format!("Invalid month name: {name}"))
                    })?;
                Ok(Some(index.to_string()))
            }
        }
    }

    /// Vega `datetime(...)` expression for this literal
    pub fn to_expr(&self) -> Result<String> {
        if self.quarter.is_some() && self.month.is_some() {
            return Err(VlFlowError::specification(
                "A date-time literal can't have both quarter and month",
            ));
        }
        let year = match (self.year, &self.day) {
            (Some(y), _) => num(y),
            (None, Some(_)) => "2006".to_string(),
            (None, None) => "2012".to_string(),
        };
        let month = match (self.month_index()?, self.quarter) {
            (Some(m), _) => m,
            (None, Some(q)) => num((q - 1.0) * 3.0),
            (None, None) => "0".to_string(),
        };
        let date = match (self.date, &self.day) {
            (Some(d), _) => num(d),
            (None, Some(day)) => {
                let day = day_index(day)?;
                format!("{}", day + 1)
            }
            (None, None) => "1".to_string(),
        };
        let slots = [
            year,
            month,
            date,
            num(self.hours.unwrap_or(0.0)),
            num(self.minutes.unwrap_or(0.0)),
            num(self.seconds.unwrap_or(0.0)),
            num(self.milliseconds.unwrap_or(0.0)),
        ];
        let func = if self.utc { "utcdatetime" } else { "datetime" };
        Ok(format!("{func}({})", slots.join(", ")))
    }
}

const DAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

fn day_index(day: &Value) -> Result<i64> {
    match day {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| VlFlowError::specification(format!("Invalid day: {n}"))),
        Value::String(name) => {
            let lower = name.to_lowercase();
            DAYS.iter()
                .position(|d| lower.len() >= 3 && d.starts_with(&lower))
                .map(|i| i as i64)
                .ok_or_else(|| VlFlowError::specification(format!("Invalid day name: {name}")))
        }
        other => Err(VlFlowError::specification(format!("Invalid day: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::data::ParseDirective;
    use crate::spec::predicate::{expression_fields, Predicate};
    use serde_json::json;

    fn predicate(value: serde_json::Value) -> Predicate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_expression_fields() {
        let fields = expression_fields(r#"datum.a + datum["b c"] * datum['d'] > 0"#);
        let fields: Vec<_> = fields.into_iter().collect();
        assert_eq!(fields, vec!["a", "b c", "d"]);
    }

    #[test]
    fn test_field_predicate_exprs() {
        let p = predicate(json!({"field": "a", "equal": "x"}));
        assert_eq!(p.to_expr().unwrap(), r#"datum["a"]==="x""#);

        let p = predicate(json!({"field": "b", "range": [0, 5]}));
        assert_eq!(p.to_expr().unwrap(), r#"inrange(datum["b"], [0, 5])"#);

        let p = predicate(json!({"field": "b", "range": [null, 5]}));
        assert_eq!(p.to_expr().unwrap(), r#"datum["b"] <= 5"#);

        let p = predicate(json!({"field": "c", "oneOf": [1, 2]}));
        assert_eq!(p.to_expr().unwrap(), r#"indexof([1, 2], datum["c"]) !== -1"#);

        let p = predicate(json!({"not": {"and": [{"field": "a", "equal": 1}, "datum.b > 2"]}}));
        assert_eq!(p.to_expr().unwrap(), r#"!((datum["a"]===1) && (datum.b > 2))"#);
    }

    #[test]
    fn test_date_time_predicate() {
        let p = predicate(json!({"field": "d", "equal": {"year": 2005, "month": "feb", "date": 3}}));
        assert_eq!(
            p.to_expr().unwrap(),
            r#"time(datum["d"])===time(datetime(2005, 1, 3, 0, 0, 0, 0))"#
        );

        let p = predicate(json!({"field": "d", "timeUnit": "year", "equal": {"year": 2005, "month": 3}}));
        assert_eq!(
            p.to_expr().unwrap(),
            r#"time(datetime(year(datum["d"]), 0, 1, 0, 0, 0, 0))===time(datetime(2005, 0, 1, 0, 0, 0, 0))"#
        );
    }

    #[test]
    fn test_numeric_literal_under_time_unit() {
        let p = predicate(json!({"field": "d", "timeUnit": "month", "equal": 3}));
        assert_eq!(
            p.to_expr().unwrap(),
            r#"time(datetime(2012, month(datum["d"]), 1, 0, 0, 0, 0))===time(datetime(2012, 2, 1, 0, 0, 0, 0))"#
        );
    }

    #[test]
    fn test_implied_parse() {
        let p = predicate(json!({"and": [
            {"field": "a", "range": [0, 5]},
            {"field": "d", "equal": {"year": 2005}},
            {"field": "e", "oneOf": ["x", "y"]},
            {"field": "t", "timeUnit": "month", "equal": 3},
            "datum.z > 1"
        ]}));
        let parse = p.implied_parse();
        assert_eq!(parse.get("a"), Some(&ParseDirective::Number));
        assert_eq!(parse.get("d"), Some(&ParseDirective::Date));
        assert_eq!(parse.get("e"), Some(&ParseDirective::String));
        assert_eq!(parse.get("t"), Some(&ParseDirective::Date));
        assert_eq!(parse.get("z"), None);
        assert_eq!(
            p.fields().into_iter().collect::<Vec<_>>(),
            vec!["a", "d", "e", "t", "z"]
        );
    }
}
