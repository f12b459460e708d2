/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use serde::{Deserialize, Serialize};

/// Stack offset applied when a field definition doesn't pick one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackConfig {
    Zero,
    Center,
    Normalize,
    None,
}

/// How time unit derivations are emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnitOutput {
    /// `formula` transforms that rebuild a truncated date with `datetime(...)`
    Formula,
    /// Vega `timeunit` transforms, which also produce an `_end` column
    Transform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileConfig {
    /// Exclude null and NaN values of quantitative and temporal fields
    pub filter_invalid: bool,
    pub default_maxbins: f64,
    pub stack: StackConfig,
    pub time_unit_output: TimeUnitOutput,
    /// Emit parsing that directly follows a data source as the source's `format.parse`
    pub format_parse: bool,
    pub optimize: bool,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            filter_invalid: true,
            default_maxbins: 10.0,
            stack: StackConfig::Zero,
            time_unit_output: TimeUnitOutput::Formula,
            format_parse: true,
            optimize: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::config::{CompileConfig, StackConfig, TimeUnitOutput};
    use serde_json::json;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CompileConfig =
            serde_json::from_value(json!({"stack": "normalize", "time_unit_output": "transform"}))
                .unwrap();
        assert_eq!(config.stack, StackConfig::Normalize);
        assert_eq!(config.time_unit_output, TimeUnitOutput::Transform);
        assert!(config.filter_invalid);
        assert_eq!(config.default_maxbins, 10.0);
    }
}
