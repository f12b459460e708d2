/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
pub mod aggregate;
pub mod bin;
pub mod extent;
pub mod filter;
pub mod formula;
pub mod identifier;
pub mod impute;
pub mod lookup;
pub mod sample;
pub mod stack;
pub mod timeunit;

use crate::vega::transform::aggregate::AggregateTransformSpec;
use crate::vega::transform::bin::BinTransformSpec;
use crate::vega::transform::extent::ExtentTransformSpec;
use crate::vega::transform::filter::FilterTransformSpec;
use crate::vega::transform::formula::FormulaTransformSpec;
use crate::vega::transform::identifier::IdentifierTransformSpec;
use crate::vega::transform::impute::ImputeTransformSpec;
use crate::vega::transform::lookup::LookupTransformSpec;
use crate::vega::transform::sample::SampleTransformSpec;
use crate::vega::transform::stack::StackTransformSpec;
use crate::vega::transform::timeunit::TimeUnitTransformSpec;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// The Vega transforms that a compiled dataflow can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransformSpec {
    Aggregate(AggregateTransformSpec),
    Bin(Box<BinTransformSpec>), // Box since transform is much larger than others
    Extent(ExtentTransformSpec),
    Filter(FilterTransformSpec),
    Formula(FormulaTransformSpec),
    Identifier(IdentifierTransformSpec),
    Impute(ImputeTransformSpec),
    Lookup(LookupTransformSpec),
    Sample(SampleTransformSpec),
    Stack(StackTransformSpec),
    #[serde(rename = "timeunit")]
    TimeUnit(TimeUnitTransformSpec),
}

impl Deref for TransformSpec {
    type Target = dyn TransformSpecTrait;

    fn deref(&self) -> &Self::Target {
        match self {
            TransformSpec::Aggregate(t) => t,
            TransformSpec::Bin(t) => t.as_ref(),
            TransformSpec::Extent(t) => t,
            TransformSpec::Filter(t) => t,
            TransformSpec::Formula(t) => t,
            TransformSpec::Identifier(t) => t,
            TransformSpec::Impute(t) => t,
            TransformSpec::Lookup(t) => t,
            TransformSpec::Sample(t) => t,
            TransformSpec::Stack(t) => t,
            TransformSpec::TimeUnit(t) => t,
        }
    }
}

pub trait TransformSpecTrait {
    /// Signals defined by the transform
    fn output_signals(&self) -> Vec<String> {
        Default::default()
    }

    /// Datasets, other than the input dataset, that the transform reads
    fn input_datasets(&self) -> Vec<String> {
        Default::default()
    }
}
