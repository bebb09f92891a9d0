// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`vrouter-core`)
//!
//! HTTP surface that translates external requests into dispatched tasks.
//! **No lifecycle logic lives here**; all real work happens in workers via
//! `crate::application`.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Axum routes under `/api/1/inf/router`, task polling, health |
//! | [`auth`] | `X-Auth` token verification, username to owner scope |

pub mod api;
pub mod auth;
