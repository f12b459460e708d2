/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use vlflow_common::error::VlFlowError;

/// The `data` property of a view: inline values, a URL, or a named dataset supplied at runtime
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<DataFormatDef>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataFormatDef {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    /// Explicit parse directives. A `null` directive disables parsing for the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse: Option<BTreeMap<String, Option<String>>>,
}

impl DataDef {
    /// The format type, inferred from the URL path extension when not given explicitly.
    /// URL data defaults to json.
    pub fn format_type(&self) -> Option<String> {
        if let Some(type_) = self.format.as_ref().and_then(|fmt| fmt.type_.clone()) {
            return Some(type_);
        }
        let url = self.url.as_ref()?;
        let path = match url::Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            // Relative URLs have no base to resolve against
            Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
        };
        let extension = path.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
        match extension.as_deref() {
            Some(ext @ ("json" | "csv" | "tsv" | "topojson" | "arrow")) => Some(ext.to_string()),
            _ => Some("json".to_string()),
        }
    }

    pub fn explicit_parse(&self) -> Option<&BTreeMap<String, Option<String>>> {
        self.format.as_ref().and_then(|fmt| fmt.parse.as_ref())
    }
}

/// How a raw field value is converted to a typed value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParseDirective {
    Number,
    Boolean,
    Date,
    String,
    /// Date parsed with a local-time format string
    DateFormat(String),
    /// Date parsed with a UTC format string
    UtcFormat(String),
}

impl ParseDirective {
    /// Directive for a literal compared against a field: its type tells how the field must be
    /// parsed for the comparison to be meaningful
    pub fn for_literal(value: &Value) -> Option<Self> {
        match value {
            Value::Number(_) => Some(ParseDirective::Number),
            Value::Bool(_) => Some(ParseDirective::Boolean),
            Value::String(_) => Some(ParseDirective::String),
            Value::Object(_) => Some(ParseDirective::Date),
            _ => None,
        }
    }
}

fn strip_format(s: &str, prefix: &str) -> Option<String> {
    let inner = s.strip_prefix(prefix)?;
    let inner = inner
        .strip_prefix('\'')
        .and_then(|i| i.strip_suffix('\''))
        .or_else(|| inner.strip_prefix('"').and_then(|i| i.strip_suffix('"')))?;
    Some(inner.to_string())
}

impl FromStr for ParseDirective {
    type Err = VlFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(ParseDirective::Number),
            "boolean" => Ok(ParseDirective::Boolean),
            "date" => Ok(ParseDirective::Date),
            "string" => Ok(ParseDirective::String),
            _ => {
                if let Some(fmt) = strip_format(s, "date:") {
                    Ok(ParseDirective::DateFormat(fmt))
                } else if let Some(fmt) = strip_format(s, "utc:") {
                    Ok(ParseDirective::UtcFormat(fmt))
                } else {
                    Err(VlFlowError::specification(format!(
                        "Unrecognized parse directive: {s}"
                    )))
                }
            }
        }
    }
}

impl TryFrom<String> for ParseDirective {
    type Error = VlFlowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ParseDirective::from_str(&value)
    }
}

impl From<ParseDirective> for String {
    fn from(value: ParseDirective) -> Self {
        value.to_string()
    }
}

impl Display for ParseDirective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseDirective::Number => write!(f, "number"),
            ParseDirective::Boolean => write!(f, "boolean"),
            ParseDirective::Date => write!(f, "date"),
            ParseDirective::String => write!(f, "string"),
            ParseDirective::DateFormat(fmt) => write!(f, "date:'{fmt}'"),
            ParseDirective::UtcFormat(fmt) => write!(f, "utc:'{fmt}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::data::{DataDef, ParseDirective};
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_format_type_inference() {
        let data: DataDef =
            serde_json::from_value(json!({"url": "https://example.com/data/cars.csv?x=1"}))
                .unwrap();
        assert_eq!(data.format_type(), Some("csv".to_string()));

        let data: DataDef = serde_json::from_value(json!({"url": "data/stocks.tsv"})).unwrap();
        assert_eq!(data.format_type(), Some("tsv".to_string()));

        let data: DataDef = serde_json::from_value(json!({"url": "data/endpoint"})).unwrap();
        assert_eq!(data.format_type(), Some("json".to_string()));

        let data: DataDef = serde_json::from_value(
            json!({"url": "data/stocks.txt", "format": {"type": "csv"}}),
        )
        .unwrap();
        assert_eq!(data.format_type(), Some("csv".to_string()));

        let data: DataDef = serde_json::from_value(json!({"values": [{"a": 1}]})).unwrap();
        assert_eq!(data.format_type(), None);
    }

    #[test]
    fn test_parse_directives() {
        assert_eq!(
            ParseDirective::from_str("date:'%Y-%m'").unwrap(),
            ParseDirective::DateFormat("%Y-%m".to_string())
        );
        assert_eq!(
            ParseDirective::UtcFormat("%Y".to_string()).to_string(),
            "utc:'%Y'"
        );
        assert!(ParseDirective::from_str("decimal").is_err());
    }
}
