// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod context;
pub mod decommission;
pub mod dispatcher;
pub mod locator;
pub mod name_locks;
pub mod provisioning;
pub mod router_service;

// Re-export use cases for convenience
pub use context::ExecutionContext;
pub use dispatcher::{DispatchError, DispatcherConfig, TaskDispatcher, TaskExecutor};
pub use router_service::RouterService;
