/*
 * vlflow
 * Copyright (C) 2026 The vlflow Authors
 *
 * This program is distributed under the BSD-3-Clause license.
 * Please consult the license documentation provided alongside
 * this program for the details of the license.
 */
#[macro_use]
extern crate lazy_static;

pub mod compile;
pub mod dataflow;
pub mod planning;
pub mod spec;
pub mod vega;

pub use compile::config::CompileConfig;
pub use planning::plan::{DataflowCompiler, DataflowPlan};
