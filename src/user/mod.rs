pub mod api;
pub mod policy;
pub mod service;

pub use policy::UserAction;
pub use policy::UserPolicy;
pub use service::UserService;

use crate::authority::Authority;
use crate::event::EventStore;
use crate::id;
use crate::ident::Ident;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::query::LimitBounds;
use crate::query::Listed;
use crate::query::PageRequest;
use crate::query::Paginated;
use crate::query::contains_ci;
use crate::query::paginate;
use crate::role::RoleId;
use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use nutype::nutype;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

id!(UserId, Ident::new16());

#[nutype(
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        Serialize,
        Deserialize,
        AsRef,
        Display,
        TryFrom
    ),
    sanitize(trim, lowercase),
    validate(regex = r"^[\w\-\.]+@([\w-]+\.)+[\w-]{2,}$")
)]
pub struct Email(String);

#[derive(Debug, Clone, PartialEq)]
pub struct UserState {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub password_hash: String,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub role_id: RoleId,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserState {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
            is_active: self.is_active,
            role_id: self.role_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub fn apply(&mut self, event: UserEvent) {
        match event {
            UserEvent::Created { .. } => {}
            UserEvent::Updated { patch, updated_at } => {
                if let Some(name) = patch.name {
                    self.name = name;
                }
                if let Some(email) = patch.email {
                    self.email = email;
                }
                if let Some(password_hash) = patch.password_hash {
                    self.password_hash = password_hash;
                }
                if patch.bio.is_some() {
                    self.bio = patch.bio;
                }
                if patch.image.is_some() {
                    self.image = patch.image;
                }
                self.updated_at = updated_at;
            }
            UserEvent::RoleChanged {
                role_id,
                updated_at,
            } => {
                self.role_id = role_id;
                self.updated_at = updated_at;
            }
            UserEvent::Deleted { deleted_at } => {
                self.deleted_at = Some(deleted_at);
                self.is_active = false;
                self.updated_at = deleted_at;
            }
        }
    }
}

impl Listed for UserState {
    type Key = UserId;

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sort_key(&self) -> UserId {
        self.id
    }
}

/// The shape returned to callers; never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub bio: Option<String>,
    pub image: Option<String>,
    pub is_active: bool,
    pub role_id: RoleId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub password_hash: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

pub const MIN_PASSWORD_LEN: usize = 6;

/// Registration body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl NewUser {
    pub fn validate(&self) -> AppResult<()> {
        validate_name(&self.name)?;
        parse_email(&self.email)?;
        validate_password(&self.password)?;
        validate_image(self.image.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl UserUpdate {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(email) = &self.email {
            parse_email(email)?;
        }
        if let Some(password) = &self.password {
            validate_password(password)?;
        }
        validate_image(self.image.as_deref())
    }
}

pub fn parse_email(email: &str) -> AppResult<Email> {
    Email::try_new(email).map_err(|_| KnownErrors::invalid("email is not valid"))
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(KnownErrors::invalid("name is required"));
    }
    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(KnownErrors::invalid(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_image(image: Option<&str>) -> AppResult<()> {
    if let Some(image) = image
        && url::Url::parse(image).is_err()
    {
        return Err(KnownErrors::invalid("image must be a valid url"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Created {
        name: String,
        email: Email,
        password_hash: String,
        bio: Option<String>,
        image: Option<String>,
        role_id: RoleId,
        created_at: DateTime<Utc>,
    },
    Updated {
        patch: UserPatch,
        updated_at: DateTime<Utc>,
    },
    RoleChanged {
        role_id: RoleId,
        updated_at: DateTime<Utc>,
    },
    Deleted {
        deleted_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub name: Option<String>,
    pub email: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl UserFilter {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, LimitBounds::USERS)
    }

    fn matches(&self, user: &UserState) -> bool {
        contains_ci(&user.name, self.name.as_deref())
            && contains_ci(user.email.as_ref(), self.email.as_deref())
    }
}

/// Resolves the acting user. A missing or soft deleted actor is a denial,
/// never a lookup miss.
pub async fn active_actor<U: UserStore>(users: &U, actor: UserId) -> AppResult<UserState> {
    users
        .get_user(actor)
        .await?
        .ok_or_else(|| KnownErrors::unauthorized("User not found"))
}

pub trait UserStore:
    Clone + Send + Sync + 'static + EventStore<Id = UserId, Event = UserEvent, Error = KnownErrors>
{
    /// returns the user unless it has been soft deleted
    async fn get_user(&self, user_id: UserId) -> AppResult<Option<UserState>>;

    /// returns the stored row, soft deleted or not
    #[cfg(test)]
    async fn get_user_record(&self, user_id: UserId) -> AppResult<Option<UserState>>;

    async fn lookup_user_id(&self, email: &Email) -> AppResult<Option<UserId>>;

    async fn list_users(&self, filter: &UserFilter) -> AppResult<Paginated<UserState>>;
}

/// In-memory storage implementation for users
#[derive(Clone)]
pub struct UserMemoryStore {
    user_table: Arc<DashMap<UserId, UserState>>,
    email_to_user_id: Arc<DashMap<String, UserId>>,
}

impl UserMemoryStore {
    pub fn new() -> Self {
        Self {
            user_table: Arc::new(DashMap::new()),
            email_to_user_id: Arc::new(DashMap::new()),
        }
    }
}

impl Default for UserMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for UserMemoryStore {
    type Id = UserId;
    type Event = UserEvent;
    type Error = KnownErrors;

    async fn record(&self, id: UserId, by: Authority, event: UserEvent) -> AppResult<()> {
        match &event {
            UserEvent::Created {
                name,
                email,
                password_hash,
                bio,
                image,
                role_id,
                created_at,
            } => {
                match self.email_to_user_id.entry(email.to_string()) {
                    Entry::Occupied(_) => {
                        return Err(KnownErrors::conflict("Email already in use"));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
                self.user_table.insert(
                    id,
                    UserState {
                        id,
                        name: name.clone(),
                        email: email.clone(),
                        password_hash: password_hash.clone(),
                        bio: bio.clone(),
                        image: image.clone(),
                        is_active: true,
                        role_id: *role_id,
                        deleted_at: None,
                        created_at: *created_at,
                        updated_at: *created_at,
                    },
                );
            }
            other => {
                let mut state = self
                    .user_table
                    .get_mut(&id)
                    .filter(|s| !s.is_deleted())
                    .ok_or(KnownErrors::not_found("User"))?;

                if let UserEvent::Updated {
                    patch:
                        UserPatch {
                            email: Some(email),
                            ..
                        },
                    ..
                } = other
                    && *email != state.email
                {
                    match self.email_to_user_id.entry(email.to_string()) {
                        Entry::Occupied(owner) if *owner.get() != id => {
                            return Err(KnownErrors::conflict("Email already in use"));
                        }
                        Entry::Occupied(_) => {}
                        Entry::Vacant(slot) => {
                            slot.insert(id);
                        }
                    }
                    self.email_to_user_id
                        .remove_if(state.email.as_ref(), |_, owner| *owner == id);
                }

                state.apply(other.clone());
            }
        }

        tracing::debug!(user = %id, ?by, "recorded user event");
        Ok(())
    }
}

impl UserStore for UserMemoryStore {
    async fn get_user(&self, user_id: UserId) -> AppResult<Option<UserState>> {
        Ok(self
            .user_table
            .get(&user_id)
            .filter(|s| !s.is_deleted())
            .map(|s| (*s).clone()))
    }

    #[cfg(test)]
    async fn get_user_record(&self, user_id: UserId) -> AppResult<Option<UserState>> {
        Ok(self.user_table.get(&user_id).map(|s| (*s).clone()))
    }

    async fn lookup_user_id(&self, email: &Email) -> AppResult<Option<UserId>> {
        Ok(self.email_to_user_id.get(email.as_ref()).map(|id| *id))
    }

    async fn list_users(&self, filter: &UserFilter) -> AppResult<Paginated<UserState>> {
        let rows = self
            .user_table
            .iter()
            .filter(|u| !u.is_deleted() && filter.matches(u))
            .map(|u| u.value().clone())
            .collect();

        Ok(paginate(rows, filter.page_request()))
    }
}
