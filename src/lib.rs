// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Swap Relay - Rate-limited relay and settlement poller
//!
//! This crate fronts the wallet and bridge back-ends of the swap application.
//! Mutation routes are rate limited per client, and settlement status can be
//! awaited server-side instead of polled from the browser.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `rate_limit` - Fixed-window per-client limiter and its middleware
//! - `poll` - Generic poll-until primitive with backoff and cancellation
//! - `upstream` - HTTP client for the wallet/bridge back-end

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod poll;
pub mod rate_limit;
pub mod state;
pub mod upstream;
