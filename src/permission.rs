//! Role/permission matrix evaluation.
//!
//! A role grants a set of `(action, subject)` pairs. A request for
//! `(action, subject)` is allowed when some grant matches the subject exactly
//! (or is the `all` sentinel) and carries the same action (or `manage`).

use crate::role::RoleId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    /// superset of every other action on the same subject
    Manage,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Manage => "manage",
        };
        f.write_str(s)
    }
}

/// The object of a grant: an entity-type name, or `all`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(Cow<'static, str>);

impl Subject {
    pub const ALL: Subject = Subject(Cow::Borrowed("all"));
    pub const SAMPLE: Subject = Subject(Cow::Borrowed("Sample"));
    pub const COURSE: Subject = Subject(Cow::Borrowed("Course"));
    pub const LESSON: Subject = Subject(Cow::Borrowed("Lesson"));
    pub const USER: Subject = Subject(Cow::Borrowed("User"));
    pub const ROLES: Subject = Subject(Cow::Borrowed("roles"));

    #[cfg(test)]
    pub fn named(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn is_all(&self) -> bool {
        self.0 == "all"
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub action: Action,
    pub subject: Subject,
}

impl Permission {
    pub fn new(action: Action, subject: Subject) -> Self {
        Self { action, subject }
    }

    pub fn grants(&self, action: Action, subject: &Subject) -> bool {
        (self.subject.is_all() || self.subject == *subject)
            && (self.action == action || self.action == Action::Manage)
    }
}

pub fn has_permission<'a, I>(permissions: I, action: Action, subject: &Subject) -> bool
where
    I: IntoIterator<Item = &'a Permission>,
{
    permissions.into_iter().any(|p| p.grants(action, subject))
}

/// A role and its grants, fetched once per decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RolePermissions {
    pub role_id: RoleId,
    pub role_name: String,
    pub permissions: Vec<Permission>,
}

impl RolePermissions {
    pub fn allows(&self, action: Action, subject: &Subject) -> bool {
        has_permission(&self.permissions, action, subject)
    }
}
