// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! vrouter core
//!
//! Provisions, inspects and destroys per-tenant router appliances on a
//! virtualization platform through asynchronous tasks.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Lifecycle workflows, task dispatch and the HTTP surface

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
