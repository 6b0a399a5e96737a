//! Entities of the permission graph

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$m:meta])* $name:ident) => {
        $(#[$m])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[inline]
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }
    };
}

id_type!(
    /// Opaque user identifier
    UserId
);
id_type!(RoleId);
id_type!(PermissionId);
id_type!(ResourceId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A named bundle of permissions.
///
/// `privileged` roles are let through the route guard without a permission
/// check. A role with no permissions is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub privileged: bool,
    pub created_at: u64,
    pub updated_at: u64,
}

/// A protectable category of the application, e.g. `site` or `engin`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    /// Machine key used in permission strings
    pub name: String,
    pub label: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// "May perform `action` on the owning resource"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: Option<String>,
    pub action: String,
    pub resource_id: ResourceId,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub name: String,
}

impl NewUser {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self { email: email.into(), name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub privileged: bool,
}

impl NewRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }

    pub fn privileged(mut self, p: bool) -> Self {
        self.privileged = p;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResource {
    pub name: String,
    pub label: String,
}

impl NewResource {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self { name: name.into(), label: label.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
    pub description: Option<String>,
    pub action: String,
    pub resource_id: ResourceId,
}

impl NewPermission {
    /// Permission named after its wire form, `"<action>:<resource_name>"`
    pub fn for_resource(action: impl Into<String>, resource: &Resource) -> Self {
        let action = action.into();
        Self {
            name: format!("{}:{}", action, resource.name),
            description: None,
            action,
            resource_id: resource.id,
        }
    }

    pub fn description(mut self, d: impl Into<String>) -> Self {
        self.description = Some(d.into());
        self
    }
}
