use crate::authority::UserId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::permission::Action;
use crate::permission::Permission;
use crate::permission::Subject;
use crate::role::PermissionLoader;
use crate::role::RoleStore;
use crate::user::UserStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    List,
    View,
    Update,
    Delete,
    ManageRole,
}

impl UserAction {
    /// The grant required when the actor is not acting on themselves.
    pub fn required(self) -> Permission {
        match self {
            UserAction::ManageRole => Permission::new(Action::Manage, Subject::ROLES),
            _ => Permission::new(Action::Manage, Subject::ALL),
        }
    }

    /// Whether acting on one's own account skips the matrix.
    fn self_service(self) -> bool {
        !matches!(self, UserAction::List | UserAction::ManageRole)
    }
}

#[derive(Clone)]
pub struct UserPolicy<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    permissions: PermissionLoader<U, R>,
}

impl<U, R> UserPolicy<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    pub fn new(permissions: PermissionLoader<U, R>) -> Self {
        Self { permissions }
    }

    pub async fn authorize(
        &self,
        actor: UserId,
        action: UserAction,
        target: Option<UserId>,
    ) -> AppResult<()> {
        let user = self.permissions.actor(actor).await?;
        if action.self_service() && target == Some(actor) {
            return Ok(());
        }

        let required = action.required();
        let role = self.permissions.permissions_for(&user).await?;
        if role.allows(required.action, &required.subject) {
            return Ok(());
        }

        tracing::warn!(%actor, ?action, role = %role.role_name, "user access denied");
        Err(KnownErrors::unauthorized(format!(
            "No {} permission for {}",
            required.action, required.subject
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleMemoryStore;
    use crate::test_support;
    use crate::user::UserMemoryStore;

    async fn policy() -> (UserPolicy<UserMemoryStore, RoleMemoryStore>, UserMemoryStore) {
        let users = UserMemoryStore::new();
        let roles = test_support::seeded_roles().await;
        (
            UserPolicy::new(PermissionLoader::new(users.clone(), roles)),
            users,
        )
    }

    #[tokio::test]
    async fn test_self_service_skips_the_matrix() {
        let (policy, users) = policy().await;
        let me = test_support::user_with_role(&users, test_support::RESTRICTED_ROLE).await;

        for action in [UserAction::View, UserAction::Update, UserAction::Delete] {
            policy
                .authorize(me, action, Some(me))
                .await
                .expect("self service is allowed");
        }

        assert!(policy.authorize(me, UserAction::List, None).await.is_err());
        assert!(
            policy
                .authorize(me, UserAction::ManageRole, Some(me))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_default_role_cannot_touch_other_users() {
        let (policy, users) = policy().await;
        let me = test_support::user_with_role(&users, test_support::DEFAULT_ROLE).await;
        let other = test_support::user_with_role(&users, test_support::DEFAULT_ROLE).await;

        // (read, User) and (update, User) are not enough, only (manage, all) is
        let result = policy.authorize(me, UserAction::Update, Some(other)).await;
        assert!(matches!(result, Err(KnownErrors::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_admin_manages_everyone() {
        let (policy, users) = policy().await;
        let admin = test_support::user_with_role(&users, test_support::ADMIN_ROLE).await;
        let other = test_support::user_with_role(&users, test_support::DEFAULT_ROLE).await;

        policy
            .authorize(admin, UserAction::List, None)
            .await
            .expect("admin lists");
        policy
            .authorize(admin, UserAction::Delete, Some(other))
            .await
            .expect("admin deletes");
        policy
            .authorize(admin, UserAction::ManageRole, Some(other))
            .await
            .expect("(manage, all) covers roles");
    }

    #[tokio::test]
    async fn test_soft_deleted_user_loses_self_service() {
        let (policy, users) = policy().await;
        let me = test_support::user_with_role(&users, test_support::DEFAULT_ROLE).await;
        test_support::soft_delete(&users, me).await;

        let result = policy.authorize(me, UserAction::View, Some(me)).await;
        assert_eq!(result, Err(KnownErrors::unauthorized("User not found")));
    }
}
