// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::Span;

use crate::domain::errors::LifecycleError;
use crate::domain::instance::OwnerScope;
use crate::domain::platform::{PlatformSession, VirtualizationPlatform};

/// Everything a workflow invocation needs, passed explicitly instead of read
/// from process-wide state.
#[derive(Clone)]
pub struct ExecutionContext {
    pub platform: Arc<dyn VirtualizationPlatform>,
    pub owner: OwnerScope,
    /// Span of the task this invocation belongs to.
    pub span: Span,
}

impl ExecutionContext {
    pub fn new(platform: Arc<dyn VirtualizationPlatform>, owner: OwnerScope) -> Self {
        Self {
            platform,
            owner,
            span: Span::current(),
        }
    }

    /// Open a platform session for this invocation. The caller must call
    /// `release()` on it whatever the outcome.
    pub async fn connect(&self) -> Result<Box<dyn PlatformSession>, LifecycleError> {
        self.platform
            .connect()
            .await
            .map_err(|e| LifecycleError::PlatformUnavailable(e.to_string()))
    }
}
