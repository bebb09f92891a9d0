// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the vrouter CLI

pub mod config;
pub mod images;
pub mod router;
pub mod serve;

pub use self::config::ConfigCommand;
pub use self::images::ImagesArgs;
pub use self::router::{RouterCommand, ServerArgs};
pub use self::serve::ServeArgs;
