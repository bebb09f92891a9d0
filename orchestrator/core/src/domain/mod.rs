// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Types, invariants and ports for router lifecycle management.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure logic and trait seams; no I/O

pub mod annotation;
pub mod errors;
pub mod image;
pub mod instance;
pub mod network;
pub mod node_config;
pub mod platform;
pub mod repository;
pub mod task;
