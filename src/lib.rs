//! fleet-rbac - role-based access control for the fleet maintenance back office
//!
//! The permission graph (users, roles, permissions, resources and the two
//! join relations) lives in LMDB. A user's effective permissions are the union
//! of `action:resource` keys granted by every role they hold, recomputed from
//! a single read snapshot on every check.
//!
//! ```ignore
//! use fleet_rbac::*;
//!
//! let store = Store::open_path("data/rbac")?;
//! let (viewer, read_site) = store.transact(|tx| {
//!     let site = tx.create_resource(NewResource::new("site", "Sites"))?;
//!     let perm = tx.create_permission(NewPermission::for_resource(READ, &site))?;
//!     Ok((tx.create_role(NewRole::new("viewer"))?, perm))
//! })?;
//! store.assign_permission_to_role(viewer.id, read_site.id)?;
//! assert!(store.has_permission(user, "read", "site")?);
//! ```

pub mod config;
pub mod constants;
mod db;
pub mod error;
pub mod guard;
#[cfg(feature = "server")]
pub mod http;
pub mod key;
pub mod model;
mod oracle;
mod read;
pub mod resolver;
pub mod seed;
mod tx;

pub use config::{PolicySettings, RbacConfig, ResourceDeletePolicy, SeedRole, SeedSettings, StorageSettings};
pub use constants::*;
pub use db::Store;
pub use error::{RbacError, Result};
pub use guard::{Decision, Denial, DenialCode, Principal, RouteGuard, SessionProvider};
pub use key::{PermissionKey, PermissionSet};
pub use model::{
    NewPermission, NewResource, NewRole, NewUser, Permission, PermissionId, Resource, ResourceId, Role, RoleId,
    User, UserId,
};
pub use resolver::Grants;
pub use seed::{seed, SeedReport};
pub use tx::Tx;
