// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-name mutual exclusion for lifecycle mutations.
//!
//! Two creates (or a create and a delete) for the same owner and router name
//! are serialized; everything else runs concurrently. Entries are dropped
//! from the table once nobody holds or waits on them.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::instance::OwnerScope;

type LockKey = (String, String);

#[derive(Clone, Default)]
pub struct NameLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

pub struct NameGuard {
    key: LockKey,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl NameLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, owner: &OwnerScope, name: &str) -> NameGuard {
        let key = (owner.as_str().to_string(), name.to_string());
        let mutex = self.locks.entry(key.clone()).or_default().clone();
        let guard = mutex.lock_owned().await;
        NameGuard {
            key,
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Number of names currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table's own reference left means no holder and no waiter.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_serialized() {
        let locks = NameLocks::new();
        let owner = OwnerScope::new("alice");

        let first = locks.acquire(&owner, "myRouter").await;
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(&owner, "myRouter"))
                .await;
        assert!(blocked.is_err());

        drop(first);
        let _second = locks.acquire(&owner, "myRouter").await;
    }

    #[tokio::test]
    async fn test_different_names_do_not_contend() {
        let locks = NameLocks::new();
        let _a = locks.acquire(&OwnerScope::new("alice"), "r1").await;
        let _b = locks.acquire(&OwnerScope::new("alice"), "r2").await;
        let _c = locks.acquire(&OwnerScope::new("bob"), "r1").await;
        assert_eq!(locks.len(), 3);
    }

    #[tokio::test]
    async fn test_entries_are_released() {
        let locks = NameLocks::new();
        {
            let _guard = locks.acquire(&OwnerScope::new("alice"), "myRouter").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }
}
