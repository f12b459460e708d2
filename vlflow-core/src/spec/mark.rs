/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use crate::spec::encoding::Channel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Area,
    Bar,
    Circle,
    Line,
    Point,
    Rect,
    Rule,
    Square,
    Text,
    Tick,
    Trail,
}

impl Mark {
    pub fn name(&self) -> &'static str {
        match self {
            Mark::Area => "area",
            Mark::Bar => "bar",
            Mark::Circle => "circle",
            Mark::Line => "line",
            Mark::Point => "point",
            Mark::Rect => "rect",
            Mark::Rule => "rule",
            Mark::Square => "square",
            Mark::Text => "text",
            Mark::Tick => "tick",
            Mark::Trail => "trail",
        }
    }

    pub fn is_stackable(&self) -> bool {
        matches!(self, Mark::Bar | Mark::Area)
    }

    pub fn supports_channel(&self, channel: Channel) -> bool {
        match channel {
            Channel::X2 | Channel::Y2 => {
                matches!(self, Mark::Area | Mark::Bar | Mark::Rect | Mark::Rule)
            }
            Channel::Size => matches!(
                self,
                Mark::Bar
                    | Mark::Circle
                    | Mark::Point
                    | Mark::Rule
                    | Mark::Square
                    | Mark::Text
                    | Mark::Tick
                    | Mark::Trail
            ),
            Channel::Shape => matches!(self, Mark::Point),
            Channel::Text => matches!(self, Mark::Text),
            _ => true,
        }
    }
}

/// The `mark` property of a unit specification: either a mark type or a mark definition
/// object carrying a `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkSpec {
    Type(Mark),
    Def(MarkDef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkDef {
    #[serde(rename = "type")]
    pub type_: Mark,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl MarkSpec {
    pub fn mark(&self) -> Mark {
        match self {
            MarkSpec::Type(mark) => *mark,
            MarkSpec::Def(def) => def.type_,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::spec::encoding::Channel;
    use crate::spec::mark::{Mark, MarkSpec};
    use serde_json::json;

    #[test]
    fn test_mark_spec_forms() {
        let spec: MarkSpec = serde_json::from_value(json!("bar")).unwrap();
        assert_eq!(spec.mark(), Mark::Bar);
        let spec: MarkSpec =
            serde_json::from_value(json!({"type": "area", "interpolate": "monotone"})).unwrap();
        assert_eq!(spec.mark(), Mark::Area);
    }

    #[test]
    fn test_channel_support() {
        assert!(Mark::Point.supports_channel(Channel::Shape));
        assert!(!Mark::Bar.supports_channel(Channel::Shape));
        assert!(!Mark::Line.supports_channel(Channel::Size));
        assert!(Mark::Rule.supports_channel(Channel::X2));
        assert!(Mark::Line.supports_channel(Channel::Color));
    }
}
