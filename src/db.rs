//! LMDB environment, sub-databases and the `Store` handle

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::BigEndian;
use heed::types::{Bytes, SerdeJson, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::info;

use crate::config::{PolicySettings, RbacConfig, StorageSettings};
use crate::error::{err, Result};
use crate::model::{Permission, Resource, Role, User};

/// Join table: 16-byte `(a, b)` key to link timestamp
pub type Db = Database<Bytes, U64<BigEndian>>;
/// Entity table keyed by id
pub type Table<T> = Database<U64<BigEndian>, SerdeJson<T>>;
/// Unique name index
pub type NameIdx = Database<Str, U64<BigEndian>>;

const MAX_DBS: u32 = 16;

/// Create a 16-byte key from two u64 values
#[inline]
pub fn key(a: u64, b: u64) -> [u8; 16] {
    let mut k = [0u8; 16];
    k[..8].copy_from_slice(&a.to_be_bytes());
    k[8..].copy_from_slice(&b.to_be_bytes());
    k
}

#[inline]
fn second_half(k: &[u8]) -> Option<u64> {
    if k.len() != 16 {
        return None;
    }
    let mut b = [0u8; 8];
    b.copy_from_slice(&k[8..16]);
    Some(u64::from_be_bytes(b))
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Many-to-many relation: fwd[a,b] and rev[b,a] stay in sync
pub struct BiPair {
    pub fwd: Db,
    pub rev: Db,
}

impl BiPair {
    #[inline]
    pub fn contains(&self, tx: &RoTxn, a: u64, b: u64) -> Result<bool> {
        Ok(self.fwd.get(tx, &key(a, b)).map_err(err)?.is_some())
    }

    /// Insert the pair; returns false if it was already present
    pub fn insert(&self, tx: &mut RwTxn, a: u64, b: u64, stamp: u64) -> Result<bool> {
        if self.contains(tx, a, b)? {
            return Ok(false);
        }
        self.fwd.put(tx, &key(a, b), &stamp).map_err(err)?;
        self.rev.put(tx, &key(b, a), &stamp).map_err(err)?;
        Ok(true)
    }

    #[inline]
    pub fn del(&self, tx: &mut RwTxn, a: u64, b: u64) -> Result<bool> {
        let r = self.fwd.delete(tx, &key(a, b)).map_err(err)?;
        self.rev.delete(tx, &key(b, a)).map_err(err)?;
        Ok(r)
    }

    pub fn list_fwd(&self, tx: &RoTxn, a: u64) -> Result<Vec<u64>> {
        list_pfx(tx, &self.fwd, a)
    }

    pub fn list_rev(&self, tx: &RoTxn, b: u64) -> Result<Vec<u64>> {
        list_pfx(tx, &self.rev, b)
    }

    fn clear(&self, tx: &mut RwTxn) -> Result<()> {
        self.fwd.clear(tx).map_err(err)?;
        self.rev.clear(tx).map_err(err)
    }
}

/// Second halves of every key in `db` starting with `pfx`
pub(crate) fn list_pfx(tx: &RoTxn, db: &Db, pfx: u64) -> Result<Vec<u64>> {
    let mut r = Vec::new();
    for item in db.prefix_iter(tx, &pfx.to_be_bytes()).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        if let Some(id) = second_half(k) {
            r.push(id);
        }
    }
    Ok(r)
}

/// All database handles
pub struct Dbs {
    pub users: Table<User>,
    pub user_emails: NameIdx,
    pub roles: Table<Role>,
    pub role_names: NameIdx,
    pub permissions: Table<Permission>,
    pub permission_names: NameIdx,
    pub resources: Table<Resource>,
    pub resource_names: NameIdx,
    /// (resource, permission) ownership
    pub resource_perms: Db,
    /// (user, role)
    pub user_roles: BiPair,
    /// (role, permission)
    pub role_perms: BiPair,
    pub meta: Database<Str, Str>,
}

struct Inner {
    env: Env,
    dbs: Dbs,
    policy: PolicySettings,
    path: PathBuf,
}

/// Handle to the permission graph. Cheap to clone and shareable across threads.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.inner.path).finish()
    }
}

impl Store {
    /// Open (or create) the environment described by `storage`
    pub fn open(storage: &StorageSettings, policy: &PolicySettings) -> Result<Self> {
        let path = Path::new(&storage.path);
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other process to open this path with different options concurrently.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(storage.map_size)
                .max_readers(storage.max_readers)
                .max_dbs(MAX_DBS)
                .open(path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            users: env.create_database(&mut tx, Some("users")).map_err(err)?,
            user_emails: env.create_database(&mut tx, Some("user_emails")).map_err(err)?,
            roles: env.create_database(&mut tx, Some("roles")).map_err(err)?,
            role_names: env.create_database(&mut tx, Some("role_names")).map_err(err)?,
            permissions: env.create_database(&mut tx, Some("permissions")).map_err(err)?,
            permission_names: env.create_database(&mut tx, Some("permission_names")).map_err(err)?,
            resources: env.create_database(&mut tx, Some("resources")).map_err(err)?,
            resource_names: env.create_database(&mut tx, Some("resource_names")).map_err(err)?,
            resource_perms: env.create_database(&mut tx, Some("resource_perms")).map_err(err)?,
            user_roles: BiPair {
                fwd: env.create_database(&mut tx, Some("user_roles")).map_err(err)?,
                rev: env.create_database(&mut tx, Some("user_roles_rev")).map_err(err)?,
            },
            role_perms: BiPair {
                fwd: env.create_database(&mut tx, Some("role_perms")).map_err(err)?,
                rev: env.create_database(&mut tx, Some("role_perms_rev")).map_err(err)?,
            },
            meta: env.create_database(&mut tx, Some("meta")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        info!(path = %path.display(), delete_policy = ?policy.resource_delete, "permission graph store opened");
        Ok(Store {
            inner: Arc::new(Inner {
                env,
                dbs,
                policy: policy.clone(),
                path: path.to_path_buf(),
            }),
        })
    }

    /// Open at `path` with default settings
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&StorageSettings::at(path), &PolicySettings::default())
    }

    pub fn from_config(cfg: &RbacConfig) -> Result<Self> {
        Self::open(&cfg.storage, &cfg.policy)
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn policy(&self) -> &PolicySettings {
        &self.inner.policy
    }

    #[inline]
    pub(crate) fn env(&self) -> &Env {
        &self.inner.env
    }

    #[inline]
    pub(crate) fn dbs(&self) -> &Dbs {
        &self.inner.dbs
    }

    /// Run `f` against one read transaction (a consistent snapshot)
    #[inline]
    pub(crate) fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.inner.env.read_txn().map_err(err)?;
        f(&self.inner.dbs, &tx)
    }

    /// Clear all databases (for testing)
    pub fn clear_all(&self) -> Result<()> {
        self.transact(|tx| {
            let (d, t) = tx.parts();
            d.users.clear(t).map_err(err)?;
            d.user_emails.clear(t).map_err(err)?;
            d.roles.clear(t).map_err(err)?;
            d.role_names.clear(t).map_err(err)?;
            d.permissions.clear(t).map_err(err)?;
            d.permission_names.clear(t).map_err(err)?;
            d.resources.clear(t).map_err(err)?;
            d.resource_names.clear(t).map_err(err)?;
            d.resource_perms.clear(t).map_err(err)?;
            d.user_roles.clear(t)?;
            d.role_perms.clear(t)?;
            d.meta.clear(t).map_err(err)
        })
    }
}
