use crate::authority::Authority;
use crate::authority::UserId;
use crate::event::EventStore;
use crate::ident::SampleId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::query::Paginated;
use crate::role::PermissionLoader;
use crate::role::RoleStore;
use crate::sample::NewSample;
use crate::sample::SampleEvent;
use crate::sample::SampleFilter;
use crate::sample::SamplePatch;
use crate::sample::SamplePolicy;
use crate::sample::SampleState;
use crate::sample::SampleStore;
use crate::user::UserStore;
use chrono::Utc;

#[derive(Clone)]
pub struct SampleService<S, U, R>
where
    S: SampleStore,
    U: UserStore,
    R: RoleStore,
{
    sample_store: S,
    policy: SamplePolicy<S, U, R>,
}

impl<S, U, R> SampleService<S, U, R>
where
    S: SampleStore,
    U: UserStore,
    R: RoleStore,
{
    pub fn new(sample_store: S, permissions: PermissionLoader<U, R>) -> Self {
        Self {
            policy: SamplePolicy::new(sample_store.clone(), permissions),
            sample_store,
        }
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn get_all(
        &self,
        actor: UserId,
        filter: &SampleFilter,
    ) -> AppResult<Paginated<SampleState>> {
        self.policy.authorize(actor, None).await?;
        self.sample_store.list_samples(actor, filter).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, actor: UserId, sample_id: SampleId) -> AppResult<SampleState> {
        self.policy
            .authorize(actor, Some(&sample_id))
            .await?
            .ok_or(KnownErrors::not_found("Sample"))
    }

    #[tracing::instrument(skip(self, sample))]
    pub async fn create(&self, actor: UserId, sample: NewSample) -> AppResult<SampleState> {
        self.policy.authorize(actor, None).await?;

        let id = SampleId::new();
        self.sample_store
            .record(
                id,
                Authority::user(actor),
                SampleEvent::Created {
                    name: sample.name,
                    description: sample.description,
                    owner_id: actor,
                    created_at: Utc::now(),
                },
            )
            .await?;

        self.fetch(&id).await
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(
        &self,
        actor: UserId,
        sample_id: SampleId,
        patch: SamplePatch,
    ) -> AppResult<SampleState> {
        self.policy
            .authorize(actor, Some(&sample_id))
            .await?
            .ok_or(KnownErrors::not_found("Sample"))?;

        self.sample_store
            .record(
                sample_id,
                Authority::user(actor),
                SampleEvent::Updated {
                    patch,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        self.fetch(&sample_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, actor: UserId, sample_id: SampleId) -> AppResult<()> {
        self.policy
            .authorize(actor, Some(&sample_id))
            .await?
            .ok_or(KnownErrors::not_found("Sample"))?;

        self.sample_store
            .record(sample_id, Authority::user(actor), SampleEvent::Deleted)
            .await
    }

    async fn fetch(&self, sample_id: &SampleId) -> AppResult<SampleState> {
        self.sample_store
            .get_sample(sample_id)
            .await?
            .ok_or(KnownErrors::not_found("Sample"))
    }
}
