// Copyright 2026 Gramlens Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gramlens — multi-strategy engagement metadata extraction.
//!
//! This library crate exposes the core modules for integration testing.

pub mod batch;
pub mod classify;
pub mod config;
pub mod orchestrator;
pub mod probes;
pub mod renderer;
pub mod rest;
pub mod search;
pub mod session;
pub mod sniffer;
pub mod stealth;
