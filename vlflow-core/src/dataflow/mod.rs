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
pub mod calculate;
pub mod facet;
pub mod filter;
pub mod filter_invalid;
pub mod graph;
pub mod identifier;
pub mod lookup;
pub mod node;
pub mod output;
pub mod parse;
pub mod sample;
pub mod source;
pub mod stack;
pub mod timeunit;
