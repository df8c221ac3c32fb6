pub mod loader;

pub use loader::PermissionLoader;

use crate::authority::Authority;
use crate::event::EventStore;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::permission::Permission;
use crate::permission::RolePermissions;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Name of the role every self-registered user receives.
pub const DEFAULT_ROLE_NAME: &str = "Usuario Padrão";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RoleId(u32);

impl RoleId {
    pub fn new(id: u32) -> AppResult<Self> {
        if id == 0 {
            return Err(KnownErrors::invalid("role id must be a positive integer"));
        }
        Ok(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for RoleId {
    type Error = KnownErrors;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleId> for u32 {
    fn from(value: RoleId) -> Self {
        value.0
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum RoleEvent {
    Created {
        name: String,
        permissions: Vec<Permission>,
    },
    Granted {
        permission: Permission,
    },
    Revoked {
        permission: Permission,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RoleState {
    pub id: RoleId,
    pub name: String,
    pub permissions: Vec<Permission>,
}

impl RoleState {
    pub fn apply(&mut self, event: RoleEvent) {
        match event {
            RoleEvent::Created { name, permissions } => {
                self.name = name;
                self.permissions = permissions;
            }
            RoleEvent::Granted { permission } => {
                if !self.permissions.contains(&permission) {
                    self.permissions.push(permission);
                }
            }
            RoleEvent::Revoked { permission } => {
                self.permissions.retain(|p| *p != permission);
            }
        }
    }

    pub fn snapshot(&self) -> RolePermissions {
        RolePermissions {
            role_id: self.id,
            role_name: self.name.clone(),
            permissions: self.permissions.clone(),
        }
    }
}

pub trait RoleStore:
    Clone + Send + Sync + 'static + EventStore<Id = RoleId, Event = RoleEvent, Error = KnownErrors>
{
    async fn get_role(&self, role_id: RoleId) -> AppResult<Option<RoleState>>;

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleState>>;
}

#[derive(Clone)]
pub struct RoleMemoryStore {
    role_table: Arc<DashMap<RoleId, RoleState>>,
}

impl RoleMemoryStore {
    pub fn new() -> Self {
        Self {
            role_table: Arc::new(DashMap::new()),
        }
    }
}

impl Default for RoleMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for RoleMemoryStore {
    type Id = RoleId;
    type Event = RoleEvent;
    type Error = KnownErrors;

    async fn record(&self, id: RoleId, by: Authority, event: RoleEvent) -> AppResult<()> {
        if let RoleEvent::Created { name, permissions } = event.clone() {
            match self.role_table.entry(id) {
                Entry::Occupied(_) => {
                    return Err(KnownErrors::conflict(format!("role {id} already exists")));
                }
                Entry::Vacant(slot) => {
                    slot.insert(RoleState {
                        id,
                        name,
                        permissions,
                    });
                }
            }
        } else if let Some(mut state) = self.role_table.get_mut(&id) {
            state.apply(event.clone());
        } else {
            return Err(KnownErrors::not_found("Role"));
        }

        tracing::debug!(role = %id, ?by, "recorded role event");
        Ok(())
    }
}

impl RoleStore for RoleMemoryStore {
    async fn get_role(&self, role_id: RoleId) -> AppResult<Option<RoleState>> {
        Ok(self.role_table.get(&role_id).map(|s| (*s).clone()))
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleState>> {
        Ok(self
            .role_table
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.value().clone()))
    }
}
