use crate::authority::Authority;
use crate::event::EventStore;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::permission::Action;
use crate::permission::Permission;
use crate::permission::Subject;
use crate::role::DEFAULT_ROLE_NAME;
use crate::role::RoleEvent;
use crate::role::RoleId;
use crate::role::RoleStore;
use crate::user::Email;
use crate::user::NewUser;
use crate::user::UserService;
use crate::user::UserStore;

pub const ADMIN_ROLE_ID: u32 = 1;
pub const DEFAULT_ROLE_ID: u32 = 2;
pub const ADMIN_ROLE_NAME: &str = "Administrador";

fn provisioned_roles() -> Vec<(u32, &'static str, Vec<Permission>)> {
    vec![
        (
            ADMIN_ROLE_ID,
            ADMIN_ROLE_NAME,
            vec![Permission::new(Action::Manage, Subject::ALL)],
        ),
        (
            DEFAULT_ROLE_ID,
            DEFAULT_ROLE_NAME,
            vec![
                Permission::new(Action::Manage, Subject::SAMPLE),
                Permission::new(Action::Read, Subject::USER),
                Permission::new(Action::Update, Subject::USER),
            ],
        ),
    ]
}

/// Creates the administrator and default roles. Roles that already exist are
/// left untouched.
pub async fn seed_roles<R: RoleStore>(role_store: &R) -> AppResult<()> {
    for (id, name, permissions) in provisioned_roles() {
        let id = RoleId::new(id)?;
        if role_store.get_role(id).await?.is_some() {
            continue;
        }

        role_store
            .record(
                id,
                Authority::system(),
                RoleEvent::Created {
                    name: name.to_owned(),
                    permissions,
                },
            )
            .await?;
        tracing::info!(role = name, "provisioned role");
    }

    Ok(())
}

struct DevUser {
    name: &'static str,
    email: &'static str,
    role: u32,
}

const DEV_USERS: [DevUser; 2] = [
    DevUser {
        name: "Ada Admin",
        email: "admin@coursesphere.dev",
        role: ADMIN_ROLE_ID,
    },
    DevUser {
        name: "Ivan Instructor",
        email: "instructor@coursesphere.dev",
        role: DEFAULT_ROLE_ID,
    },
];

pub const DEV_PASSWORD: &str = "coursesphere";

pub async fn seed_dev_users<U, R>(users: &UserService<U, R>) -> AppResult<()>
where
    U: UserStore,
    R: RoleStore,
{
    for dev in DEV_USERS {
        let email = Email::try_new(dev.email).map_err(KnownErrors::internal)?;
        if users.user_store().lookup_user_id(&email).await?.is_some() {
            continue;
        }

        let user = users
            .create_with_role(
                NewUser {
                    name: dev.name.to_owned(),
                    email: email.to_string(),
                    password: DEV_PASSWORD.to_owned(),
                    bio: None,
                    image: None,
                },
                RoleId::new(dev.role)?,
                Authority::system(),
            )
            .await?;
        tracing::info!(user = %user.id, email = dev.email, "seeded dev user");
    }

    Ok(())
}
