use crate::authority::Authority;
use std::fmt::Display;

pub trait EventStore: Send + Sync {
    type Id: Send + Sync + Clone;
    type Event: Send + Sync;
    type Error: Display;

    /// Validates `event` against the current state of aggregate `id` and
    /// applies it, attributed to `by`. A rejected event leaves the state
    /// untouched.
    async fn record(
        &self,
        id: Self::Id,
        by: Authority,
        event: Self::Event,
    ) -> Result<(), Self::Error>;
}
