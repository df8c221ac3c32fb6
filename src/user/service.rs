use crate::authority::Authority;
use crate::authority::UserId;
use crate::event::EventStore;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::query::Paginated;
use crate::role::DEFAULT_ROLE_NAME;
use crate::role::PermissionLoader;
use crate::role::RoleId;
use crate::role::RoleStore;
use crate::user::NewUser;
use crate::user::UserAction;
use crate::user::UserEvent;
use crate::user::UserFilter;
use crate::user::UserPatch;
use crate::user::UserPolicy;
use crate::user::UserStore;
use crate::user::UserUpdate;
use crate::user::UserView;
use crate::user::parse_email;
use chrono::Utc;

#[derive(Clone)]
pub struct UserService<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    user_store: U,
    role_store: R,
    policy: UserPolicy<U, R>,
    hash_cost: u32,
}

impl<U, R> UserService<U, R>
where
    U: UserStore,
    R: RoleStore,
{
    pub fn new(user_store: U, role_store: R) -> Self {
        Self {
            policy: UserPolicy::new(PermissionLoader::new(user_store.clone(), role_store.clone())),
            user_store,
            role_store,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub fn user_store(&self) -> &U {
        &self.user_store
    }

    pub fn permission_loader(&self) -> PermissionLoader<U, R> {
        PermissionLoader::new(self.user_store.clone(), self.role_store.clone())
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn get_all(
        &self,
        actor: UserId,
        filter: &UserFilter,
    ) -> AppResult<Paginated<UserView>> {
        self.policy.authorize(actor, UserAction::List, None).await?;

        Ok(self
            .user_store
            .list_users(filter)
            .await?
            .map(|user| user.view()))
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, actor: UserId, target: UserId) -> AppResult<UserView> {
        self.policy
            .authorize(actor, UserAction::View, Some(target))
            .await?;
        self.fetch(target).await
    }

    /// Public registration; the new account receives the default role.
    #[tracing::instrument(skip(self, user))]
    pub async fn create(&self, user: NewUser) -> AppResult<UserView> {
        let role = self
            .role_store
            .find_role_by_name(DEFAULT_ROLE_NAME)
            .await?
            .ok_or_else(|| KnownErrors::internal("default role is not provisioned"))?;

        self.create_with_role(user, role.id, Authority::system())
            .await
    }

    pub(crate) async fn create_with_role(
        &self,
        user: NewUser,
        role_id: RoleId,
        by: Authority,
    ) -> AppResult<UserView> {
        let email = parse_email(&user.email)?;
        if self.user_store.lookup_user_id(&email).await?.is_some() {
            return Err(KnownErrors::conflict("Email already in use"));
        }

        let password_hash = self.hash_password(user.password).await?;

        let id = UserId::new();
        self.user_store
            .record(
                id,
                by,
                UserEvent::Created {
                    name: user.name,
                    email,
                    password_hash,
                    bio: user.bio,
                    image: user.image,
                    role_id,
                    created_at: Utc::now(),
                },
            )
            .await?;

        tracing::info!(user = %id, %role_id, "registered user");
        self.fetch(id).await
    }

    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        actor: UserId,
        target: UserId,
        update: UserUpdate,
    ) -> AppResult<UserView> {
        self.policy
            .authorize(actor, UserAction::Update, Some(target))
            .await?;
        self.fetch(target).await?;

        let email = match update.email {
            Some(email) => {
                let email = parse_email(&email)?;
                if self
                    .user_store
                    .lookup_user_id(&email)
                    .await?
                    .is_some_and(|owner| owner != target)
                {
                    return Err(KnownErrors::conflict("Email already in use"));
                }
                Some(email)
            }
            None => None,
        };

        let password_hash = match update.password {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        self.user_store
            .record(
                target,
                Authority::user(actor),
                UserEvent::Updated {
                    patch: UserPatch {
                        name: update.name,
                        email,
                        password_hash,
                        bio: update.bio,
                        image: update.image,
                    },
                    updated_at: Utc::now(),
                },
            )
            .await?;

        self.fetch(target).await
    }

    /// Marks the user deleted and inactive; the row is kept.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, actor: UserId, target: UserId) -> AppResult<()> {
        self.policy
            .authorize(actor, UserAction::Delete, Some(target))
            .await?;
        self.fetch(target).await?;

        self.user_store
            .record(
                target,
                Authority::user(actor),
                UserEvent::Deleted {
                    deleted_at: Utc::now(),
                },
            )
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn manage_role(
        &self,
        actor: UserId,
        target: UserId,
        role_id: RoleId,
    ) -> AppResult<UserView> {
        self.policy
            .authorize(actor, UserAction::ManageRole, Some(target))
            .await?;

        if self.role_store.get_role(role_id).await?.is_none() {
            return Err(KnownErrors::not_found("Role"));
        }
        self.fetch(target).await?;

        self.user_store
            .record(
                target,
                Authority::user(actor),
                UserEvent::RoleChanged {
                    role_id,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        self.fetch(target).await
    }

    async fn fetch(&self, user_id: UserId) -> AppResult<UserView> {
        self.user_store
            .get_user(user_id)
            .await?
            .map(|user| user.view())
            .ok_or(KnownErrors::not_found("User"))
    }

    async fn hash_password(&self, password: String) -> AppResult<String> {
        let cost = self.hash_cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::RoleMemoryStore;
    use crate::test_support;
    use crate::user::UserMemoryStore;

    async fn service() -> UserService<UserMemoryStore, RoleMemoryStore> {
        UserService::new(UserMemoryStore::new(), test_support::seeded_roles().await)
            .with_hash_cost(test_support::TEST_HASH_COST)
    }

    fn registration(email: &str) -> NewUser {
        NewUser {
            name: "Grace".into(),
            email: email.into(),
            password: "hunter22".into(),
            bio: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn test_registration_assigns_default_role_and_hashes() {
        let service = service().await;
        let user = service
            .create(registration("grace@example.com"))
            .await
            .expect("registration");
        assert_eq!(user.role_id.get(), test_support::DEFAULT_ROLE);
        assert!(user.is_active);

        let stored = service
            .user_store()
            .get_user(user.id)
            .await
            .expect("lookup")
            .expect("stored");
        assert_ne!(stored.password_hash, "hunter22");
        assert!(bcrypt::verify("hunter22", &stored.password_hash).expect("verify"));

        let again = service.create(registration("GRACE@example.com")).await;
        assert_eq!(again, Err(KnownErrors::conflict("Email already in use")));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_the_user() {
        let service = service().await;
        let admin = test_support::user_with_role(service.user_store(), test_support::ADMIN_ROLE).await;
        let target = service
            .create(registration("gone@example.com"))
            .await
            .expect("registration");

        service.delete(admin, target.id).await.expect("delete");

        let fetched = service.get_by_id(admin, target.id).await;
        assert!(matches!(fetched, Err(KnownErrors::NotFound { .. })));

        let listed = service
            .get_all(admin, &UserFilter::default())
            .await
            .expect("list");
        assert!(listed.items.iter().all(|u| u.id != target.id));

        let row = service
            .user_store()
            .get_user_record(target.id)
            .await
            .expect("lookup")
            .expect("row remains");
        assert!(row.deleted_at.is_some());
        assert!(!row.is_active);

        // the deleted account loses its matrix grants
        let denied = service.get_all(target.id, &UserFilter::default()).await;
        assert!(matches!(denied, Err(KnownErrors::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_update_checks_email_ownership() {
        let service = service().await;
        let first = service
            .create(registration("first@example.com"))
            .await
            .expect("registration");
        service
            .create(registration("second@example.com"))
            .await
            .expect("registration");

        let taken = service
            .update(
                first.id,
                first.id,
                UserUpdate {
                    email: Some("second@example.com".into()),
                    ..UserUpdate::default()
                },
            )
            .await;
        assert!(matches!(taken, Err(KnownErrors::Conflict { .. })));

        // keeping one's own address is not a conflict
        let same = service
            .update(
                first.id,
                first.id,
                UserUpdate {
                    email: Some("first@example.com".into()),
                    name: Some("Grace Hopper".into()),
                    ..UserUpdate::default()
                },
            )
            .await
            .expect("self update");
        assert_eq!(same.name, "Grace Hopper");
    }

    #[tokio::test]
    async fn test_update_rehashes_password() {
        let service = service().await;
        let user = service
            .create(registration("pw@example.com"))
            .await
            .expect("registration");

        service
            .update(
                user.id,
                user.id,
                UserUpdate {
                    password: Some("new-secret".into()),
                    ..UserUpdate::default()
                },
            )
            .await
            .expect("update");

        let stored = service
            .user_store()
            .get_user(user.id)
            .await
            .expect("lookup")
            .expect("stored");
        assert!(bcrypt::verify("new-secret", &stored.password_hash).expect("verify"));
    }

    #[tokio::test]
    async fn test_manage_role() {
        let service = service().await;
        let admin = test_support::user_with_role(service.user_store(), test_support::ADMIN_ROLE).await;
        let user = service
            .create(registration("role@example.com"))
            .await
            .expect("registration");

        let missing = RoleId::new(99).expect("role id");
        let result = service.manage_role(admin, user.id, missing).await;
        assert_eq!(result, Err(KnownErrors::not_found("Role")));

        let promoted = service
            .manage_role(
                admin,
                user.id,
                RoleId::new(test_support::ADMIN_ROLE).expect("role id"),
            )
            .await
            .expect("promote");
        assert_eq!(promoted.role_id.get(), test_support::ADMIN_ROLE);

        // no self shortcut for role changes
        let other = service
            .create(registration("plain@example.com"))
            .await
            .expect("registration");
        let result = service
            .manage_role(
                other.id,
                other.id,
                RoleId::new(test_support::ADMIN_ROLE).expect("role id"),
            )
            .await;
        assert!(matches!(result, Err(KnownErrors::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_and_clamps_limit() {
        let service = service().await;
        let admin = test_support::user_with_role(service.user_store(), test_support::ADMIN_ROLE).await;
        service
            .create(NewUser {
                name: "Linus".into(),
                ..registration("linus@example.com")
            })
            .await
            .expect("registration");

        let page = service
            .get_all(
                admin,
                &UserFilter {
                    name: Some("LIN".into()),
                    limit: Some(1),
                    ..UserFilter::default()
                },
            )
            .await
            .expect("list");
        assert_eq!(page.total, 1);
        assert_eq!(page.limit, 10);
        assert_eq!(page.items[0].name, "Linus");
    }
}
