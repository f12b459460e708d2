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
pub mod chart;
pub mod data;
pub mod encoding;
pub mod mark;
pub mod predicate;
pub mod timeunit;
pub mod transform;
