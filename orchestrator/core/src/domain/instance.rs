// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::annotation::{self, InstanceTag};

/// Tenant ownership scope. Names the per-user folder on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerScope(String);

impl OwnerScope {
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
    Suspended,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Platform object id of a VM.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VmRef(pub String);

impl VmRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A child object of an ownership scope, as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntity {
    pub id: VmRef,
    pub name: String,
}

/// Read-only snapshot of an instance, re-read from the platform on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub name: String,
    pub id: VmRef,
    #[serde(default)]
    pub power_state: PowerState,
    #[serde(default)]
    pub annotation: String,
    /// Attached networks in adapter order.
    #[serde(default)]
    pub networks: Vec<String>,
    /// Remaining fields reported by the platform, passed through untouched.
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl InstanceState {
    pub fn tag(&self) -> Option<InstanceTag> {
        InstanceTag::parse(&self.annotation).ok()
    }

    /// Whether this instance is an appliance managed by vrouter.
    pub fn is_managed(&self) -> bool {
        annotation::is_managed(&self.annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_power_state_deserializes() {
        let state: PowerState = serde_json::from_str("\"poweredOnButWeird\"").unwrap();
        assert_eq!(state, PowerState::Unknown);
    }

    #[test]
    fn test_extra_platform_fields_are_kept() {
        let json = serde_json::json!({
            "name": "myRouter",
            "id": "vm-42",
            "power_state": "on",
            "annotation": "Router=1.1.8",
            "networks": ["alice_frontend"],
            "console": "https://vcenter/console/vm-42",
            "ips": ["10.1.1.1"],
        });

        let state: InstanceState = serde_json::from_value(json.clone()).unwrap();
        assert!(state.is_managed());
        assert_eq!(state.tag().unwrap().version(), "1.1.8");
        assert_eq!(state.details["console"], "https://vcenter/console/vm-42");
        assert_eq!(serde_json::to_value(&state).unwrap(), json);
    }
}
