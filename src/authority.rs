pub use crate::user::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Actor {
    User(UserId),
    System,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authority {
    Direct(Actor),
}

impl Authority {
    pub fn user(id: UserId) -> Self {
        Self::Direct(Actor::User(id))
    }

    pub fn system() -> Self {
        Self::Direct(Actor::System)
    }
}
