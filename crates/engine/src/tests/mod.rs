// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Unit tests for the engine crate.
//!
//! These drive a [`GraphEngine`](crate::graph::GraphEngine) directly, one
//! offline iteration at a time, without a scheduler thread.

mod blocking;
mod ordering;
mod sources;
mod support;
mod track_union;
