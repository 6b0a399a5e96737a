//! Permission keys: the validated `action:resource` value type
//!
//! Keys are compared component-wise, never as concatenated strings, so a
//! caller passing `"read:site"` as an action cannot forge a match.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RbacError, Result};

/// Action verbs are lowercase ASCII words: `[a-z0-9_-]+`
pub fn validate_action(action: &str) -> Result<()> {
    if action.is_empty() {
        return Err(RbacError::Invalid("action must not be empty".into()));
    }
    if !action
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    {
        return Err(RbacError::Invalid(format!(
            "action '{}' must be lowercase ascii (a-z, 0-9, '-', '_')",
            action
        )));
    }
    Ok(())
}

/// Resource names keep their casing but may not contain ':' or whitespace
pub fn validate_resource_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RbacError::Invalid("resource name must not be empty".into()));
    }
    if let Some(c) = name.chars().find(|c| *c == ':' || c.is_whitespace() || c.is_control()) {
        return Err(RbacError::Invalid(format!(
            "resource name '{}' contains forbidden character {:?}",
            name, c
        )));
    }
    Ok(())
}

/// One effective grant: `action` on the resource named `resource`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionKey {
    action: String,
    resource: String,
}

impl PermissionKey {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Result<Self> {
        let (action, resource) = (action.into(), resource.into());
        validate_action(&action)?;
        validate_resource_name(&resource)?;
        Ok(Self { action, resource })
    }

    #[inline]
    pub fn action(&self) -> &str {
        &self.action
    }

    #[inline]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[inline]
    pub fn matches(&self, action: &str, resource: &str) -> bool {
        self.action == action && self.resource == resource
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.action, self.resource)
    }
}

impl FromStr for PermissionKey {
    type Err = RbacError;

    fn from_str(s: &str) -> Result<Self> {
        let (action, resource) = s
            .split_once(':')
            .ok_or_else(|| RbacError::Invalid(format!("'{}' is not of the form action:resource", s)))?;
        Self::new(action, resource)
    }
}

impl TryFrom<String> for PermissionKey {
    type Error = RbacError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PermissionKey> for String {
    fn from(k: PermissionKey) -> Self {
        k.to_string()
    }
}

/// Effective permission set of a user. Unordered, duplicate-free.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(HashSet<PermissionKey>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the key was already present
    pub fn insert(&mut self, key: PermissionKey) -> bool {
        self.0.insert(key)
    }

    pub fn contains(&self, action: &str, resource: &str) -> bool {
        // Lookup keys skip validation; an invalid pair simply never matches.
        self.0.contains(&PermissionKey {
            action: action.to_owned(),
            resource: resource.to_owned(),
        })
    }

    pub fn contains_key(&self, key: &PermissionKey) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionKey> {
        self.0.iter()
    }

    pub fn is_subset(&self, other: &PermissionSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        PermissionSet(self.0.union(&other.0).cloned().collect())
    }

    /// Wire form, sorted for stable output
    pub fn to_strings(&self) -> Vec<String> {
        let mut v: Vec<String> = self.0.iter().map(|k| k.to_string()).collect();
        v.sort_unstable();
        v
    }
}

impl FromIterator<PermissionKey> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionKey>>(iter: I) -> Self {
        PermissionSet(iter.into_iter().collect())
    }
}

impl IntoIterator for PermissionSet {
    type Item = PermissionKey;
    type IntoIter = std::collections::hash_set::IntoIter<PermissionKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_renders_wire_form() {
        let k = PermissionKey::new("read", "site").unwrap();
        assert_eq!(k.to_string(), "read:site");
        assert_eq!("read:site".parse::<PermissionKey>().unwrap(), k);
    }

    #[test]
    fn key_rejects_colons_and_bad_actions() {
        assert!(PermissionKey::new("", "site").is_err());
        assert!(PermissionKey::new("Read", "site").is_err());
        assert!(PermissionKey::new("read:all", "site").is_err());
        assert!(PermissionKey::new("read", "").is_err());
        assert!(PermissionKey::new("read", "site:north").is_err());
        assert!(PermissionKey::new("read", "my site").is_err());
        assert!("readsite".parse::<PermissionKey>().is_err());
    }

    #[test]
    fn resource_casing_is_preserved() {
        let k = PermissionKey::new("read", "Site").unwrap();
        assert_eq!(k.resource(), "Site");
        let set: PermissionSet = [k].into_iter().collect();
        assert!(set.contains("read", "Site"));
        assert!(!set.contains("read", "site"));
    }

    #[test]
    fn set_lookup_cannot_be_forged_with_colons() {
        let set: PermissionSet = [PermissionKey::new("read", "site").unwrap()].into_iter().collect();
        assert!(set.contains("read", "site"));
        assert!(!set.contains("read:site", ""));
        assert!(!set.contains("", "read:site"));
    }

    #[test]
    fn set_collapses_duplicates() {
        let mut set = PermissionSet::new();
        assert!(set.insert(PermissionKey::new("read", "engin").unwrap()));
        assert!(!set.insert(PermissionKey::new("read", "engin").unwrap()));
        assert_eq!(set.len(), 1);
        assert_eq!(set.to_strings(), vec!["read:engin".to_string()]);
    }

    #[test]
    fn key_serializes_as_string() {
        let k = PermissionKey::new("update", "panne").unwrap();
        assert_eq!(serde_json::to_string(&k).unwrap(), "\"update:panne\"");
        let back: PermissionKey = serde_json::from_str("\"update:panne\"").unwrap();
        assert_eq!(back, k);
        assert!(serde_json::from_str::<PermissionKey>("\"update:\"").is_err());
    }
}
