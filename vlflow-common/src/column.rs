/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
use std::collections::BTreeSet;

/// Enum storing info on which row fields a dataflow node reads or writes.
/// It's not always possible to statically determine the fields of a node (e.g. the columns
/// of a data source loaded from a URL). In this case the ColumnUsage::Unknown variant is used,
/// and it must be treated as possibly touching every field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ColumnUsage {
    Unknown,
    Known(BTreeSet<String>),
}

impl Default for ColumnUsage {
    fn default() -> Self {
        Self::empty()
    }
}

impl ColumnUsage {
    pub fn empty() -> ColumnUsage {
        ColumnUsage::Known(Default::default())
    }

    pub fn with_column(&self, column: &str) -> ColumnUsage {
        self.union(&ColumnUsage::from(vec![column].as_slice()))
    }

    /// Take the union of two ColumnUsage instances. If both are ColumnUsage::Known, then take
    /// the union of their known columns. If either is ColumnUsage::Unknown, then the union is
    /// also Unknown.
    pub fn union(&self, other: &ColumnUsage) -> ColumnUsage {
        match (self, other) {
            (ColumnUsage::Known(self_cols), ColumnUsage::Known(other_cols)) => {
                let new_cols: BTreeSet<_> = self_cols.union(other_cols).cloned().collect();
                ColumnUsage::Known(new_cols)
            }
            _ => ColumnUsage::Unknown,
        }
    }

    /// Whether the two usages may share a column. Unknown intersects anything non-empty.
    pub fn intersects(&self, other: &ColumnUsage) -> bool {
        match (self, other) {
            (ColumnUsage::Known(self_cols), ColumnUsage::Known(other_cols)) => {
                !self_cols.is_disjoint(other_cols)
            }
            (ColumnUsage::Unknown, ColumnUsage::Known(cols))
            | (ColumnUsage::Known(cols), ColumnUsage::Unknown) => !cols.is_empty(),
            (ColumnUsage::Unknown, ColumnUsage::Unknown) => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ColumnUsage::Known(cols) if cols.is_empty())
    }

    pub fn contains(&self, column: &str) -> bool {
        match self {
            ColumnUsage::Known(cols) => cols.contains(column),
            ColumnUsage::Unknown => true,
        }
    }

    /// Known columns, or None when the usage is Unknown
    pub fn known(&self) -> Option<&BTreeSet<String>> {
        match self {
            ColumnUsage::Known(cols) => Some(cols),
            ColumnUsage::Unknown => None,
        }
    }
}

impl From<&[&str]> for ColumnUsage {
    fn from(columns: &[&str]) -> Self {
        let columns: BTreeSet<_> = columns.iter().map(|s| s.to_string()).collect();
        Self::Known(columns)
    }
}

impl From<&[String]> for ColumnUsage {
    fn from(columns: &[String]) -> Self {
        let columns: BTreeSet<_> = columns.iter().cloned().collect();
        Self::Known(columns)
    }
}

impl From<&str> for ColumnUsage {
    fn from(column: &str) -> Self {
        ColumnUsage::from(vec![column].as_slice())
    }
}

impl FromIterator<String> for ColumnUsage {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::Known(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use crate::column::ColumnUsage;

    #[test]
    fn test_with_column() {
        let left = ColumnUsage::from(vec!["one", "two"].as_slice());
        let result = left.with_column("three").with_column("four");
        let expected = ColumnUsage::from(vec!["one", "two", "three", "four"].as_slice());
        assert_eq!(result, expected)
    }

    #[test]
    fn test_union_known_unknown() {
        let left = ColumnUsage::from(vec!["one", "two"].as_slice());
        let union = left.union(&ColumnUsage::Unknown);
        assert_eq!(union, ColumnUsage::Unknown)
    }

    #[test]
    fn test_intersects() {
        let left = ColumnUsage::from(vec!["one", "two"].as_slice());
        let right = ColumnUsage::from(vec!["two", "three"].as_slice());
        let other = ColumnUsage::from("four");
        assert!(left.intersects(&right));
        assert!(!left.intersects(&other));
        assert!(ColumnUsage::Unknown.intersects(&other));
        assert!(!ColumnUsage::Unknown.intersects(&ColumnUsage::empty()));
    }
}
