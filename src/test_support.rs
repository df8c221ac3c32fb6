use crate::authority::Authority;
use crate::authority::UserId;
use crate::event::EventStore;
use crate::role::RoleEvent;
use crate::role::RoleId;
use crate::role::RoleMemoryStore;
use crate::seed;
use crate::user::Email;
use crate::user::UserEvent;
use crate::user::UserMemoryStore;
use chrono::Utc;

/// cheapest cost bcrypt accepts
pub const TEST_HASH_COST: u32 = 4;

pub const ADMIN_ROLE: u32 = seed::ADMIN_ROLE_ID;
pub const DEFAULT_ROLE: u32 = seed::DEFAULT_ROLE_ID;
/// a role with no grants at all
pub const RESTRICTED_ROLE: u32 = 3;

pub async fn seeded_roles() -> RoleMemoryStore {
    let roles = RoleMemoryStore::new();
    seed::seed_roles(&roles).await.expect("failed to seed roles");
    roles
        .record(
            RoleId::new(RESTRICTED_ROLE).expect("valid role id"),
            Authority::system(),
            RoleEvent::Created {
                name: "restricted".into(),
                permissions: vec![],
            },
        )
        .await
        .expect("failed to create restricted role");
    roles
}

pub async fn user_with_role(users: &UserMemoryStore, role: u32) -> UserId {
    let id = UserId::new();
    users
        .record(
            id,
            Authority::system(),
            UserEvent::Created {
                name: format!("user {id}"),
                email: Email::try_new(format!("{id}@example.com")).expect("valid email"),
                password_hash: "not a real hash".into(),
                bio: None,
                image: None,
                role_id: RoleId::new(role).expect("valid role id"),
                created_at: Utc::now(),
            },
        )
        .await
        .expect("failed to create user");
    id
}

pub async fn change_role(users: &UserMemoryStore, user: UserId, role: u32) {
    users
        .record(
            user,
            Authority::system(),
            UserEvent::RoleChanged {
                role_id: RoleId::new(role).expect("valid role id"),
                updated_at: Utc::now(),
            },
        )
        .await
        .expect("failed to change role");
}

pub async fn soft_delete(users: &UserMemoryStore, user: UserId) {
    users
        .record(
            user,
            Authority::system(),
            UserEvent::Deleted {
                deleted_at: Utc::now(),
            },
        )
        .await
        .expect("failed to delete user");
}
