use crate::authority::UserId;
use crate::ident::SampleId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::membership::is_owner;
use crate::permission::Action;
use crate::permission::Subject;
use crate::role::PermissionLoader;
use crate::role::RoleStore;
use crate::sample::SampleState;
use crate::sample::SampleStore;
use crate::user::UserStore;

/// Owners may always act on their own samples; everyone else needs
/// `(manage, Sample)`.
#[derive(Clone)]
pub struct SamplePolicy<S, U, R>
where
    S: SampleStore,
    U: UserStore,
    R: RoleStore,
{
    sample_store: S,
    permissions: PermissionLoader<U, R>,
}

impl<S, U, R> SamplePolicy<S, U, R>
where
    S: SampleStore,
    U: UserStore,
    R: RoleStore,
{
    pub fn new(sample_store: S, permissions: PermissionLoader<U, R>) -> Self {
        Self {
            sample_store,
            permissions,
        }
    }

    /// Returns the target row when one was named and exists, so callers do
    /// not fetch it twice.
    pub async fn authorize(
        &self,
        actor: UserId,
        target: Option<&SampleId>,
    ) -> AppResult<Option<SampleState>> {
        let user = self.permissions.actor(actor).await?;

        let sample = match target {
            Some(id) => self.sample_store.get_sample(id).await?,
            None => None,
        };

        if let Some(s) = &sample
            && is_owner(s, actor)
        {
            return Ok(sample);
        }

        let role = self.permissions.permissions_for(&user).await?;
        if !role.allows(Action::Manage, &Subject::SAMPLE) {
            tracing::warn!(%actor, role = %role.role_name, "sample access denied");
            return Err(KnownErrors::unauthorized(format!(
                "No {} permission for {}",
                Action::Manage,
                Subject::SAMPLE
            )));
        }

        Ok(sample)
    }
}
