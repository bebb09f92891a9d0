// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Instance Tag
//!
//! The hypervisor gives every VM one free-text annotation field. vrouter keeps
//! no metadata store of its own, so ownership of an appliance is re-derived on
//! every request from that field, encoded as `<kind>=<version>`
//! (e.g. `Router=1.1.8`).
//!
//! [`InstanceTag`] is the typed form. It is validated when written and when
//! read back; text that does not parse is simply "not ours".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind literal stamped onto every appliance this service manages.
pub const ROUTER_KIND: &str = "Router";

const SEPARATOR: char = '=';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("annotation '{0}' is not of the form <kind>=<version>")]
    Malformed(String),
    #[error("annotation kind must not be empty")]
    EmptyKind,
    #[error("annotation version must not be empty")]
    EmptyVersion,
    #[error("annotation field '{0}' must not contain '='")]
    ContainsSeparator(String),
}

/// Typed `kind=version` annotation value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceTag {
    kind: String,
    version: String,
}

impl InstanceTag {
    pub fn new(kind: impl Into<String>, version: impl Into<String>) -> Result<Self, TagError> {
        let kind = kind.into();
        let version = version.into();

        if kind.is_empty() {
            return Err(TagError::EmptyKind);
        }
        if version.is_empty() {
            return Err(TagError::EmptyVersion);
        }
        if kind.contains(SEPARATOR) {
            return Err(TagError::ContainsSeparator(kind));
        }
        if version.contains(SEPARATOR) {
            return Err(TagError::ContainsSeparator(version));
        }

        Ok(Self { kind, version })
    }

    /// Tag for a managed appliance running `version`.
    pub fn router(version: impl Into<String>) -> Result<Self, TagError> {
        Self::new(ROUTER_KIND, version)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_router(&self) -> bool {
        self.kind == ROUTER_KIND
    }

    /// Parse an annotation read from the platform.
    pub fn parse(text: &str) -> Result<Self, TagError> {
        let (kind, version) = text
            .split_once(SEPARATOR)
            .ok_or_else(|| TagError::Malformed(text.to_string()))?;
        Self::new(kind, version).map_err(|err| match err {
            TagError::ContainsSeparator(_) => TagError::Malformed(text.to_string()),
            other => other,
        })
    }
}

impl fmt::Display for InstanceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, SEPARATOR, self.version)
    }
}

impl FromStr for InstanceTag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// True when `annotation` carries a well-formed tag of the managed kind.
pub fn is_managed(annotation: &str) -> bool {
    InstanceTag::parse(annotation)
        .map(|tag| tag.is_router())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_tag_formats_as_annotation() {
        let tag = InstanceTag::router("1.0.32").unwrap();
        assert_eq!(tag.to_string(), "Router=1.0.32");
        assert!(tag.is_router());
    }

    #[test]
    fn test_parse_reads_kind_and_version() {
        let tag: InstanceTag = "Router=1.1.8".parse().unwrap();
        assert_eq!(tag.kind(), "Router");
        assert_eq!(tag.version(), "1.1.8");
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        assert_eq!(
            InstanceTag::parse("Router"),
            Err(TagError::Malformed("Router".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_extra_separator() {
        assert!(matches!(
            InstanceTag::parse("Router=1=2"),
            Err(TagError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_parts() {
        assert_eq!(InstanceTag::parse("=1.0"), Err(TagError::EmptyKind));
        assert_eq!(InstanceTag::parse("Router="), Err(TagError::EmptyVersion));
    }

    #[test]
    fn test_new_rejects_separator_in_version() {
        assert!(matches!(
            InstanceTag::router("1.0=evil"),
            Err(TagError::ContainsSeparator(_))
        ));
    }

    #[test]
    fn test_is_managed() {
        assert!(is_managed("Router=1.0.32"));
        assert!(!is_managed("Jumpbox=2.0"));
        assert!(!is_managed("router=1.0.32"));
        assert!(!is_managed(""));
        assert!(!is_managed("some free text left by an operator"));
    }
}
