pub mod api;
pub mod policy;
pub mod service;

pub use policy::SamplePolicy;
pub use service::SampleService;

use crate::authority::Authority;
use crate::authority::UserId;
use crate::event::EventStore;
use crate::ident::SampleId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::query::LimitBounds;
use crate::query::Listed;
use crate::query::PageRequest;
use crate::query::Paginated;
use crate::query::contains_ci;
use crate::query::optional_contains_ci;
use crate::query::paginate;
use crate::query::within;
use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SampleState {
    pub id: SampleId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SampleState {
    pub fn apply(&mut self, event: SampleEvent) {
        match event {
            SampleEvent::Created { .. } | SampleEvent::Deleted => {}
            SampleEvent::Updated { patch, updated_at } => {
                if let Some(name) = patch.name {
                    self.name = name;
                }
                if patch.description.is_some() {
                    self.description = patch.description;
                }
                self.updated_at = updated_at;
            }
        }
    }
}

impl Listed for SampleState {
    type Key = SampleId;

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sort_key(&self) -> SampleId {
        self.id
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum SampleEvent {
    Created {
        name: String,
        description: Option<String>,
        owner_id: UserId,
        created_at: DateTime<Utc>,
    },
    Updated {
        patch: SamplePatch,
        updated_at: DateTime<Utc>,
    },
    Deleted,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewSample {
    pub name: String,
    pub description: Option<String>,
}

impl NewSample {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(KnownErrors::invalid("name is required"));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct SamplePatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl SamplePatch {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(KnownErrors::invalid("name must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleFilter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl SampleFilter {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, LimitBounds::DEFAULT)
    }

    fn matches(&self, sample: &SampleState) -> bool {
        contains_ci(&sample.name, self.name.as_deref())
            && optional_contains_ci(sample.description.as_deref(), self.description.as_deref())
            && within(sample.created_at, self.created_from, self.created_to)
    }
}

pub trait SampleStore:
    Clone
    + Send
    + Sync
    + 'static
    + EventStore<Id = SampleId, Event = SampleEvent, Error = KnownErrors>
{
    async fn get_sample(&self, sample_id: &SampleId) -> AppResult<Option<SampleState>>;

    /// lists only samples owned by `owner_id`
    async fn list_samples(
        &self,
        owner_id: UserId,
        filter: &SampleFilter,
    ) -> AppResult<Paginated<SampleState>>;
}

#[derive(Clone)]
pub struct SampleMemoryStore {
    sample_table: Arc<DashMap<SampleId, SampleState>>,
}

impl SampleMemoryStore {
    pub fn new() -> Self {
        Self {
            sample_table: Arc::new(DashMap::new()),
        }
    }
}

impl Default for SampleMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for SampleMemoryStore {
    type Id = SampleId;
    type Event = SampleEvent;
    type Error = KnownErrors;

    async fn record(&self, id: SampleId, by: Authority, event: SampleEvent) -> AppResult<()> {
        match &event {
            SampleEvent::Created {
                name,
                description,
                owner_id,
                created_at,
            } => {
                if self.sample_table.contains_key(&id) {
                    return Err(KnownErrors::conflict(format!("sample {id} already exists")));
                }
                self.sample_table.insert(
                    id,
                    SampleState {
                        id,
                        name: name.clone(),
                        description: description.clone(),
                        owner_id: *owner_id,
                        created_at: *created_at,
                        updated_at: *created_at,
                    },
                );
            }
            SampleEvent::Updated { .. } => {
                self.sample_table
                    .get_mut(&id)
                    .ok_or(KnownErrors::not_found("Sample"))?
                    .apply(event.clone());
            }
            SampleEvent::Deleted => {
                self.sample_table
                    .remove(&id)
                    .ok_or(KnownErrors::not_found("Sample"))?;
            }
        }

        tracing::debug!(sample = %id, ?by, "recorded sample event");
        Ok(())
    }
}

impl SampleStore for SampleMemoryStore {
    async fn get_sample(&self, sample_id: &SampleId) -> AppResult<Option<SampleState>> {
        Ok(self.sample_table.get(sample_id).map(|s| (*s).clone()))
    }

    async fn list_samples(
        &self,
        owner_id: UserId,
        filter: &SampleFilter,
    ) -> AppResult<Paginated<SampleState>> {
        let rows = self
            .sample_table
            .iter()
            .filter(|s| s.owner_id == owner_id && filter.matches(s))
            .map(|s| s.value().clone())
            .collect();

        Ok(paginate(rows, filter.page_request()))
    }
}
