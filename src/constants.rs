//! Well-known role names, action verbs and default seed vocabulary

// Privileged role names (seeded with `privileged = true`)
pub const ADMIN_ROLE: &str = "admin";
pub const SUPER_ADMIN_ROLE: &str = "super-admin";

// Action verbs used by the route guard sugars
pub const READ: &str = "read";
pub const WRITE: &str = "write";
pub const CREATE: &str = "create";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";
pub const MANAGE: &str = "manage";

/// Resources of the fleet maintenance application
pub const DEFAULT_RESOURCES: &[(&str, &str)] = &[
    ("site", "Sites"),
    ("engin", "Engins"),
    ("panne", "Pannes"),
    ("performance", "Performances"),
    ("user", "Utilisateurs"),
    ("role", "Rôles"),
    ("permission", "Permissions"),
];

pub const DEFAULT_ACTIONS: &[&str] = &[READ, CREATE, UPDATE, DELETE, MANAGE];

pub const DEFAULT_PRIVILEGED_ROLES: &[&str] = &[SUPER_ADMIN_ROLE, ADMIN_ROLE];

// Meta keys
pub(crate) const NEXT_ID: &str = "next_id";
