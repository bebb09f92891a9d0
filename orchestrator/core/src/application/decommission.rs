// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Decommission Workflow
//!
//! Powers off and destroys one managed router. Only instances carrying the
//! router tag inside the caller's folder are eligible; anything else is
//! reported as not found before a single mutation is issued.

use tracing::{debug, info, Instrument};

use crate::application::context::ExecutionContext;
use crate::application::locator::find_instance;
use crate::domain::errors::LifecycleError;
use crate::domain::instance::PowerState;
use crate::domain::platform::{PlatformError, PlatformSession};

#[derive(Debug, Default, Clone, Copy)]
pub struct DecommissionWorkflow;

impl DecommissionWorkflow {
    pub fn new() -> Self {
        Self
    }

    pub async fn delete(&self, ctx: &ExecutionContext, name: &str) -> Result<(), LifecycleError> {
        async {
            let session = ctx.connect().await?;
            let result = Self::decommission(&*session, ctx, name).await;
            session.release().await;
            result
        }
        .instrument(ctx.span.clone())
        .await
    }

    async fn decommission(
        session: &dyn PlatformSession,
        ctx: &ExecutionContext,
        name: &str,
    ) -> Result<(), LifecycleError> {
        let located = find_instance(session, &ctx.owner, name).await?;

        if located.state.power_state != PowerState::Off {
            debug!("Powering off {}", name);
            let handle = session
                .set_power(&located.vm, PowerState::Off)
                .await
                .map_err(decommission_failed)?;
            session
                .wait_for_task(&handle)
                .await
                .map_err(decommission_failed)?;
        }

        let handle = session
            .destroy(&located.vm)
            .await
            .map_err(decommission_failed)?;
        session
            .wait_for_task(&handle)
            .await
            .map_err(decommission_failed)?;

        info!("Destroyed router {} for {}", name, ctx.owner);
        Ok(())
    }
}

fn decommission_failed(err: PlatformError) -> LifecycleError {
    LifecycleError::DecommissionFailed(err.to_string())
}
