// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Network Mapping
//!
//! Binds the network slots an image declares to the networks a tenant asked
//! for. Pairing is positional and truncating: the shorter of the two lists
//! decides how many bindings are produced, and extra slots or extra requested
//! networks are ignored. Resolution is all-or-nothing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Opaque platform reference to a network object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkRef(pub String);

impl NetworkRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One declared slot wired to one platform network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkBinding {
    pub slot: String,
    pub network: NetworkRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("No such network {0}")]
    UnknownNetwork(String),
}

/// Map requested networks onto the image's declared slots.
///
/// Empty or absent entries in `requested` are dropped first (the third and
/// fourth networks are optional), preserving order.
pub fn map_networks(
    slots: &[String],
    requested: &[Option<String>],
    known: &HashMap<String, NetworkRef>,
) -> Result<Vec<NetworkBinding>, MappingError> {
    let wanted = requested
        .iter()
        .filter_map(|name| name.as_deref())
        .filter(|name| !name.is_empty());

    slots
        .iter()
        .zip(wanted)
        .map(|(slot, name)| {
            known
                .get(name)
                .map(|network| NetworkBinding {
                    slot: slot.clone(),
                    network: network.clone(),
                })
                .ok_or_else(|| MappingError::UnknownNetwork(name.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn requested(names: &[Option<&str>]) -> Vec<Option<String>> {
        names.iter().map(|n| n.map(str::to_string)).collect()
    }

    fn known(pairs: &[(&str, &str)]) -> HashMap<String, NetworkRef> {
        pairs
            .iter()
            .map(|(name, id)| (name.to_string(), NetworkRef::new(*id)))
            .collect()
    }

    #[test]
    fn test_pairs_positionally() {
        let out = map_networks(
            &slots(&["a", "b"]),
            &requested(&[Some("x"), Some("y")]),
            &known(&[("x", "X"), ("y", "Y")]),
        )
        .unwrap();

        assert_eq!(
            out,
            vec![
                NetworkBinding { slot: "a".into(), network: NetworkRef::new("X") },
                NetworkBinding { slot: "b".into(), network: NetworkRef::new("Y") },
            ]
        );
    }

    #[test]
    fn test_unknown_network_fails_whole_mapping() {
        let err = map_networks(
            &slots(&["network1", "network2"]),
            &requested(&[Some("neta"), Some("netb")]),
            &known(&[("neta", "net-1")]),
        )
        .unwrap_err();

        assert_eq!(err, MappingError::UnknownNetwork("netb".into()));
        assert_eq!(err.to_string(), "No such network netb");
    }

    #[test]
    fn test_drops_empty_and_absent_entries() {
        let out = map_networks(
            &slots(&["wan", "lan", "dmz"]),
            &requested(&[Some("x"), None, Some(""), Some("y")]),
            &known(&[("x", "X"), ("y", "Y")]),
        )
        .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].slot, "wan");
        assert_eq!(out[1].slot, "lan");
        assert_eq!(out[1].network, NetworkRef::new("Y"));
    }

    #[test]
    fn test_truncates_to_shorter_list() {
        // extra requested networks are ignored, even unknown ones
        let out = map_networks(
            &slots(&["wan", "lan"]),
            &requested(&[Some("x"), Some("y"), Some("does-not-exist")]),
            &known(&[("x", "X"), ("y", "Y")]),
        )
        .unwrap();
        assert_eq!(out.len(), 2);

        // extra declared slots are left unbound
        let out = map_networks(
            &slots(&["wan", "lan", "opt1", "opt2"]),
            &requested(&[Some("x"), Some("y")]),
            &known(&[("x", "X"), ("y", "Y")]),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
    }
}
