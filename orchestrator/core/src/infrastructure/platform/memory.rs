// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process platform simulator.
//!
//! Backs the `memory` platform backend for local development and every
//! workflow test. Long-running operations finish immediately; their outcome is
//! parked under a task handle until `wait_for_task` collects it. Every applied
//! change is appended to a mutation log, and individual operations can be made
//! to fail.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::domain::instance::{ChildEntity, InstanceState, PowerState, VmRef};
use crate::domain::network::NetworkRef;
use crate::domain::platform::{
    DeploySpec, FolderRef, PlatformError, PlatformSession, PlatformTaskHandle, TaskOutcome,
    VirtualizationPlatform,
};

/// A change applied to the simulated inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Deploy { folder: String, name: String },
    Annotate(VmRef, String),
    SetPower(VmRef, PowerState),
    Destroy(VmRef),
}

#[derive(Debug, Clone)]
struct SimVm {
    id: VmRef,
    folder: String,
    name: String,
    power_state: PowerState,
    annotation: String,
    networks: Vec<String>,
}

impl SimVm {
    fn state(&self) -> InstanceState {
        InstanceState {
            name: self.name.clone(),
            id: self.id.clone(),
            power_state: self.power_state,
            annotation: self.annotation.clone(),
            networks: self.networks.clone(),
            details: Map::new(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    connect: bool,
    deploy: bool,
    annotation: bool,
    lost_annotation: bool,
    destroy: bool,
}

#[derive(Default)]
struct Inventory {
    folders: BTreeSet<String>,
    vms: Vec<SimVm>,
    networks: HashMap<String, NetworkRef>,
    tasks: HashMap<PlatformTaskHandle, Result<TaskOutcome, String>>,
    mutations: Vec<Mutation>,
    next_id: u64,
    released: usize,
    faults: Faults,
}

impl Inventory {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn park(&mut self, outcome: Result<TaskOutcome, String>) -> PlatformTaskHandle {
        let handle = PlatformTaskHandle::new(self.next_id("task"));
        self.tasks.insert(handle.clone(), outcome);
        handle
    }

    fn vm_mut(&mut self, vm: &VmRef) -> Result<&mut SimVm, PlatformError> {
        self.vms
            .iter_mut()
            .find(|v| &v.id == vm)
            .ok_or_else(|| PlatformError::NotFound(vm.0.clone()))
    }
}

/// Simulated virtualization platform. Cheap to clone; clones share inventory.
#[derive(Clone, Default)]
pub struct InMemoryPlatform {
    inventory: Arc<Mutex<Inventory>>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, name: &str) {
        self.inventory.lock().folders.insert(name.to_string());
    }

    pub fn add_network(&self, name: &str, id: &str) {
        self.inventory
            .lock()
            .networks
            .insert(name.to_string(), NetworkRef::new(id));
    }

    /// Seed a powered-on VM in `folder`, creating the folder if needed.
    pub fn add_instance(&self, folder: &str, name: &str, annotation: &str) -> VmRef {
        let mut inv = self.inventory.lock();
        inv.folders.insert(folder.to_string());
        let id = VmRef::new(inv.next_id("vm"));
        inv.vms.push(SimVm {
            id: id.clone(),
            folder: folder.to_string(),
            name: name.to_string(),
            power_state: PowerState::On,
            annotation: annotation.to_string(),
            networks: Vec::new(),
        });
        id
    }

    pub fn set_power_state(&self, vm: &VmRef, state: PowerState) {
        if let Ok(v) = self.inventory.lock().vm_mut(vm) {
            v.power_state = state;
        }
    }

    pub fn fail_connect(&self, fail: bool) {
        self.inventory.lock().faults.connect = fail;
    }

    pub fn fail_deploy(&self, fail: bool) {
        self.inventory.lock().faults.deploy = fail;
    }

    pub fn fail_annotation(&self, fail: bool) {
        self.inventory.lock().faults.annotation = fail;
    }

    /// Annotation writes report success but leave the old text in place.
    pub fn lose_annotations(&self, lose: bool) {
        self.inventory.lock().faults.lost_annotation = lose;
    }

    pub fn fail_destroy(&self, fail: bool) {
        self.inventory.lock().faults.destroy = fail;
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.inventory.lock().mutations.clone()
    }

    pub fn instance_count(&self, folder: &str) -> usize {
        self.inventory
            .lock()
            .vms
            .iter()
            .filter(|v| v.folder == folder)
            .count()
    }

    /// Number of sessions released so far.
    pub fn released_sessions(&self) -> usize {
        self.inventory.lock().released
    }
}

#[async_trait]
impl VirtualizationPlatform for InMemoryPlatform {
    async fn connect(&self) -> Result<Box<dyn PlatformSession>, PlatformError> {
        if self.inventory.lock().faults.connect {
            return Err(PlatformError::Connection("simulated outage".to_string()));
        }
        Ok(Box::new(InMemorySession {
            inventory: self.inventory.clone(),
        }))
    }
}

struct InMemorySession {
    inventory: Arc<Mutex<Inventory>>,
}

#[async_trait]
impl PlatformSession for InMemorySession {
    async fn locate_folder(&self, name: &str) -> Result<FolderRef, PlatformError> {
        let inv = self.inventory.lock();
        if inv.folders.contains(name) {
            Ok(FolderRef(name.to_string()))
        } else {
            Err(PlatformError::NotFound(format!("folder {name}")))
        }
    }

    async fn children(&self, folder: &FolderRef) -> Result<Vec<ChildEntity>, PlatformError> {
        let inv = self.inventory.lock();
        if !inv.folders.contains(&folder.0) {
            return Err(PlatformError::NotFound(format!("folder {}", folder.0)));
        }
        Ok(inv
            .vms
            .iter()
            .filter(|v| v.folder == folder.0)
            .map(|v| ChildEntity {
                id: v.id.clone(),
                name: v.name.clone(),
            })
            .collect())
    }

    async fn read_state(&self, vm: &VmRef) -> Result<InstanceState, PlatformError> {
        let mut inv = self.inventory.lock();
        Ok(inv.vm_mut(vm)?.state())
    }

    async fn networks(&self) -> Result<HashMap<String, NetworkRef>, PlatformError> {
        Ok(self.inventory.lock().networks.clone())
    }

    async fn write_annotation(
        &self,
        vm: &VmRef,
        text: &str,
    ) -> Result<PlatformTaskHandle, PlatformError> {
        let mut inv = self.inventory.lock();
        if inv.faults.annotation {
            return Ok(inv.park(Err("reconfigure rejected".to_string())));
        }
        if inv.faults.lost_annotation {
            inv.vm_mut(vm)?;
            return Ok(inv.park(Ok(TaskOutcome::default())));
        }
        inv.vm_mut(vm)?.annotation = text.to_string();
        inv.mutations.push(Mutation::Annotate(vm.clone(), text.to_string()));
        Ok(inv.park(Ok(TaskOutcome::default())))
    }

    async fn set_power(
        &self,
        vm: &VmRef,
        state: PowerState,
    ) -> Result<PlatformTaskHandle, PlatformError> {
        let mut inv = self.inventory.lock();
        inv.vm_mut(vm)?.power_state = state;
        inv.mutations.push(Mutation::SetPower(vm.clone(), state));
        Ok(inv.park(Ok(TaskOutcome::default())))
    }

    async fn destroy(&self, vm: &VmRef) -> Result<PlatformTaskHandle, PlatformError> {
        let mut inv = self.inventory.lock();
        inv.vm_mut(vm)?;
        if inv.faults.destroy {
            return Ok(inv.park(Err("destroy rejected".to_string())));
        }
        inv.vms.retain(|v| &v.id != vm);
        inv.mutations.push(Mutation::Destroy(vm.clone()));
        Ok(inv.park(Ok(TaskOutcome::default())))
    }

    async fn deploy_from_artifact(
        &self,
        spec: DeploySpec<'_>,
    ) -> Result<PlatformTaskHandle, PlatformError> {
        let mut inv = self.inventory.lock();
        if !inv.folders.contains(&spec.folder.0) {
            return Err(PlatformError::NotFound(format!("folder {}", spec.folder.0)));
        }
        if inv.faults.deploy {
            return Ok(inv.park(Err("deployment rejected".to_string())));
        }
        if inv
            .vms
            .iter()
            .any(|v| v.folder == spec.folder.0 && v.name == spec.name)
        {
            return Ok(inv.park(Err(format!("duplicate name {}", spec.name))));
        }

        let networks: Vec<String> = spec
            .bindings
            .iter()
            .map(|b| {
                inv.networks
                    .iter()
                    .find(|(_, r)| *r == &b.network)
                    .map(|(name, _)| name.clone())
                    .unwrap_or_else(|| b.network.0.clone())
            })
            .collect();

        let id = VmRef::new(inv.next_id("vm"));
        debug!(vm = %id.0, name = spec.name, "simulated deployment");
        inv.vms.push(SimVm {
            id: id.clone(),
            folder: spec.folder.0.clone(),
            name: spec.name.to_string(),
            power_state: PowerState::On,
            annotation: String::new(),
            networks,
        });
        inv.mutations.push(Mutation::Deploy {
            folder: spec.folder.0.clone(),
            name: spec.name.to_string(),
        });
        Ok(inv.park(Ok(TaskOutcome { created: Some(id) })))
    }

    async fn wait_for_task(&self, handle: &PlatformTaskHandle) -> Result<TaskOutcome, PlatformError> {
        match self.inventory.lock().tasks.remove(handle) {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(PlatformError::TaskFailed {
                task: handle.0.clone(),
                message,
            }),
            None => Err(PlatformError::NotFound(format!("task {}", handle.0))),
        }
    }

    async fn release(&self) {
        self.inventory.lock().released += 1;
    }
}
