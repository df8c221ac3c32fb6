use crate::authority::UserId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::permission::RolePermissions;
use crate::role::RoleStore;
use crate::user::UserState;
use crate::user::UserStore;
use crate::user::active_actor;

/// Fetches the role snapshot an actor's matrix checks run against.
#[derive(Clone)]
pub struct PermissionLoader<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    user_store: U,
    role_store: R,
}

impl<U, R> PermissionLoader<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    pub fn new(user_store: U, role_store: R) -> Self {
        Self {
            user_store,
            role_store,
        }
    }

    /// A missing or soft deleted actor is a denial, not a lookup miss.
    pub async fn actor(&self, actor: UserId) -> AppResult<UserState> {
        active_actor(&self.user_store, actor).await
    }

    pub async fn permissions_for(&self, user: &UserState) -> AppResult<RolePermissions> {
        let role = self
            .role_store
            .get_role(user.role_id)
            .await?
            .ok_or_else(|| KnownErrors::internal(format!("role {} is missing", user.role_id)))?;

        Ok(role.snapshot())
    }

    pub async fn permissions_of(&self, actor: UserId) -> AppResult<RolePermissions> {
        let user = self.actor(actor).await?;
        self.permissions_for(&user).await
    }
}
