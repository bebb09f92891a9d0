// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod catalog;
pub mod ova;
pub mod platform;
pub mod repositories;

pub use catalog::FilesystemImageCatalog;
pub use platform::{build_platform, InMemoryPlatform, RestPlatform};
pub use repositories::InMemoryTaskRepository;
