/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use vlflow_common::error::VlFlowError;
use vlflow_common::escape::datum_ref;

/// A single calendar component. Variants are declared in canonical order, and a composite
/// time unit must list its components in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SingleTimeUnit {
    Year,
    Quarter,
    Month,
    Week,
    DayOfYear,
    Date,
    Day,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
}

impl SingleTimeUnit {
    pub fn name(&self) -> &'static str {
        match self {
            SingleTimeUnit::Year => "year",
            SingleTimeUnit::Quarter => "quarter",
            SingleTimeUnit::Month => "month",
            SingleTimeUnit::Week => "week",
            SingleTimeUnit::DayOfYear => "dayofyear",
            SingleTimeUnit::Date => "date",
            SingleTimeUnit::Day => "day",
            SingleTimeUnit::Hours => "hours",
            SingleTimeUnit::Minutes => "minutes",
            SingleTimeUnit::Seconds => "seconds",
            SingleTimeUnit::Milliseconds => "milliseconds",
        }
    }
}

// Longest names first so that greedy matching never stops at a prefix
const UNIT_TOKENS: [SingleTimeUnit; 11] = [
    SingleTimeUnit::Milliseconds,
    SingleTimeUnit::DayOfYear,
    SingleTimeUnit::Quarter,
    SingleTimeUnit::Minutes,
    SingleTimeUnit::Seconds,
    SingleTimeUnit::Hours,
    SingleTimeUnit::Month,
    SingleTimeUnit::Year,
    SingleTimeUnit::Week,
    SingleTimeUnit::Date,
    SingleTimeUnit::Day,
];

/// A possibly composite time unit such as `yearmonth` or `utchoursminutes`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeUnit {
    pub utc: bool,
    pub units: Vec<SingleTimeUnit>,
}

impl FromStr for TimeUnit {
    type Err = VlFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (utc, mut rest) = match s.strip_prefix("utc") {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let mut units: Vec<SingleTimeUnit> = Vec::new();
        while !rest.is_empty() {
            let Some(unit) = UNIT_TOKENS.iter().find(|u| rest.starts_with(u.name())) else {
                return Err(VlFlowError::specification(format!("Invalid time unit: {s}")));
            };
            if let Some(last) = units.last() {
                if last >= unit {
                    return Err(VlFlowError::specification(format!(
                        "Invalid time unit: {s}"
                    )));
                }
            }
            units.push(*unit);
            rest = &rest[unit.name().len()..];
        }
        if units.is_empty() {
            return Err(VlFlowError::specification(format!("Invalid time unit: {s}")));
        }
        Ok(Self { utc, units })
    }
}

impl TryFrom<String> for TimeUnit {
    type Error = VlFlowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TimeUnit::from_str(&value)
    }
}

impl From<TimeUnit> for String {
    fn from(value: TimeUnit) -> Self {
        value.to_string()
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.utc {
            write!(f, "utc")?;
        }
        for unit in &self.units {
            write!(f, "{}", unit.name())?;
        }
        Ok(())
    }
}

impl TimeUnit {
    pub fn contains(&self, unit: SingleTimeUnit) -> bool {
        self.units.contains(&unit)
    }

    /// Units that can't be expressed as a `datetime(...)` formula and need Vega's
    /// `timeunit` transform instead
    pub fn requires_transform(&self) -> bool {
        self.contains(SingleTimeUnit::Week)
    }

    /// Column alias for this time unit applied to `field`, e.g. `yearmonth_date`
    pub fn field_alias(&self, field: &str) -> String {
        format!("{self}_{field}")
    }

    pub fn vega_units(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name().to_string()).collect()
    }

    /// Expression that truncates `field` to this time unit by rebuilding a date from the
    /// selected components, filling the others with their start values
    pub fn field_expr(&self, field: &str) -> String {
        let datum = datum_ref(field);
        let prefix = if self.utc { "utc" } else { "" };
        let get = |name: &str| format!("{prefix}{name}({datum})");

        let year = if self.contains(SingleTimeUnit::Year) {
            get("year")
        } else if self.contains(SingleTimeUnit::Day) {
            // 2006-01-01 is a Sunday, so day-of-week offsets land on the right weekday
            "2006".to_string()
        } else {
            "2012".to_string()
        };
        let month = if self.contains(SingleTimeUnit::Month) {
            get("month")
        } else if self.contains(SingleTimeUnit::Quarter) {
            format!("floor({} / 3) * 3", get("month"))
        } else {
            "0".to_string()
        };
        let date = if self.contains(SingleTimeUnit::Date) {
            get("date")
        } else if self.contains(SingleTimeUnit::DayOfYear) {
            get("dayofyear")
        } else if self.contains(SingleTimeUnit::Day) {
            format!("{} + 1", get("day"))
        } else {
            "1".to_string()
        };
        let component = |unit: SingleTimeUnit, name: &str| {
            if self.contains(unit) {
                get(name)
            } else {
                "0".to_string()
            }
        };
        let slots = [
            year,
            month,
            date,
            component(SingleTimeUnit::Hours, "hours"),
            component(SingleTimeUnit::Minutes, "minutes"),
            component(SingleTimeUnit::Seconds, "seconds"),
            component(SingleTimeUnit::Milliseconds, "milliseconds"),
        ];
        format!("{prefix}datetime({})", slots.join(", "))
    }
}
