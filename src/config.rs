//! Configuration for the RBAC store and guard.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Optional YAML file
//! 3. Environment variables prefixed `FLEET_RBAC_`, `__` between nested keys
//!    (`FLEET_RBAC_POLICY__RESOURCE_DELETE=cascade`)
//!
//! ```ignore
//! let cfg = RbacConfig::load("fleet-rbac.yaml")?;
//! let store = Store::open(&cfg.storage, &cfg.policy)?;
//! ```

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ACTIONS, DEFAULT_PRIVILEGED_ROLES, DEFAULT_RESOURCES};
use crate::error::{RbacError, Result};
use crate::key::{validate_action, validate_resource_name, PermissionKey};

/// What `delete_resource` does when permissions still reference the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDeletePolicy {
    /// Refuse with `RbacError::Restricted`
    #[default]
    Restrict,
    /// Delete the permissions and every role link to them
    Cascade,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbacConfig {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub policy: PolicySettings,
    #[serde(default)]
    pub seed: SeedSettings,
}

/// LMDB environment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_path")]
    pub path: String,
    /// Maximum size of the memory map in bytes
    #[serde(default = "default_map_size")]
    pub map_size: usize,
    #[serde(default = "default_max_readers")]
    pub max_readers: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_path(),
            map_size: default_map_size(),
            max_readers: default_max_readers(),
        }
    }
}

impl StorageSettings {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_string_lossy().into_owned(), ..Default::default() }
    }
}

fn default_path() -> String {
    "./data/fleet-rbac".to_string()
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_max_readers() -> u32 {
    126
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default)]
    pub resource_delete: ResourceDeletePolicy,
    /// Role names created with `privileged = true`
    #[serde(default = "default_privileged_roles")]
    pub privileged_roles: Vec<String>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            resource_delete: ResourceDeletePolicy::default(),
            privileged_roles: default_privileged_roles(),
        }
    }
}

impl PolicySettings {
    pub fn is_privileged_name(&self, role: &str) -> bool {
        self.privileged_roles.iter().any(|r| r == role)
    }
}

fn default_privileged_roles() -> Vec<String> {
    DEFAULT_PRIVILEGED_ROLES.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedResource {
    pub name: String,
    pub label: String,
}

/// Initial graph written by `seed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_seed_resources")]
    pub resources: Vec<SeedResource>,
    /// One permission is created per (action, resource)
    #[serde(default = "default_seed_actions")]
    pub actions: Vec<String>,
    #[serde(default)]
    pub roles: Vec<SeedRole>,
}

/// Named role created by `seed`, with the permissions it is granted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRole {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `action:resource` keys; each must name an existing or seeded permission
    #[serde(default)]
    pub permissions: Vec<PermissionKey>,
}

impl Default for SeedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            resources: default_seed_resources(),
            actions: default_seed_actions(),
            roles: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_seed_resources() -> Vec<SeedResource> {
    DEFAULT_RESOURCES
        .iter()
        .map(|(name, label)| SeedResource { name: name.to_string(), label: label.to_string() })
        .collect()
}

fn default_seed_actions() -> Vec<String> {
    DEFAULT_ACTIONS.iter().map(|s| s.to_string()).collect()
}

impl RbacConfig {
    /// Load from a YAML file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RbacError::Config(format!("configuration file not found: {}", path.display())));
        }
        let cfg = Config::builder()
            .add_source(Config::try_from(&RbacConfig::default())?)
            .add_source(File::from(path).format(FileFormat::Yaml))
            .add_source(env_source())
            .build()?;
        let cfg: RbacConfig = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from defaults and environment only
    pub fn from_env() -> Result<Self> {
        let cfg = Config::builder()
            .add_source(Config::try_from(&RbacConfig::default())?)
            .add_source(env_source())
            .build()?;
        let cfg: RbacConfig = cfg.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.path.trim().is_empty() {
            return Err(RbacError::Config("storage.path must not be empty".into()));
        }
        if self.storage.map_size < (1 << 20) {
            return Err(RbacError::Config("storage.map_size must be at least 1 MiB".into()));
        }
        if self.storage.max_readers == 0 {
            return Err(RbacError::Config("storage.max_readers must be greater than 0".into()));
        }
        if self.policy.privileged_roles.iter().any(|r| r.trim().is_empty()) {
            return Err(RbacError::Config("policy.privileged_roles contains an empty name".into()));
        }
        for r in &self.seed.resources {
            validate_resource_name(&r.name).map_err(|e| RbacError::Config(format!("seed.resources: {}", e)))?;
        }
        for a in &self.seed.actions {
            validate_action(a).map_err(|e| RbacError::Config(format!("seed.actions: {}", e)))?;
        }
        for r in &self.seed.roles {
            if r.name.trim().is_empty() {
                return Err(RbacError::Config("seed.roles contains an empty name".into()));
            }
        }
        Ok(())
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("FLEET_RBAC")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("policy.privileged_roles")
        .with_list_parse_key("seed.actions")
        .try_parsing(true)
}
