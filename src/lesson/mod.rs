pub mod api;
pub mod policy;
pub mod service;

pub use policy::LessonAction;
pub use policy::LessonPolicy;
pub use service::LessonService;

use crate::authority::Authority;
use crate::authority::UserId;
use crate::event::EventStore;
use crate::ident::CourseId;
use crate::ident::LessonId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::query::LimitBounds;
use crate::query::Listed;
use crate::query::PageRequest;
use crate::query::Paginated;
use crate::query::contains_ci;
use crate::query::paginate;
use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

pub const MIN_TITLE_LEN: usize = 3;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LessonState {
    pub id: LessonId,
    pub title: String,
    pub status: LessonStatus,
    pub publish_date: DateTime<Utc>,
    pub video_url: String,
    pub youtube_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub course_id: CourseId,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonState {
    pub fn apply(&mut self, event: LessonEvent) {
        match event {
            LessonEvent::Created(_) | LessonEvent::Deleted => {}
            LessonEvent::Updated { patch, updated_at } => {
                if let Some(title) = patch.title {
                    self.title = title;
                }
                if let Some(status) = patch.status {
                    self.status = status;
                }
                if let Some(publish_date) = patch.publish_date {
                    self.publish_date = publish_date;
                }
                if let Some(video_url) = patch.video_url {
                    self.video_url = video_url;
                }
                if patch.youtube_id.is_some() {
                    self.youtube_id = patch.youtube_id;
                }
                if patch.thumbnail_url.is_some() {
                    self.thumbnail_url = patch.thumbnail_url;
                }
                self.updated_at = updated_at;
            }
        }
    }
}

impl Listed for LessonState {
    type Key = LessonId;

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sort_key(&self) -> LessonId {
        self.id
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum LessonEvent {
    Created(Box<LessonState>),
    Updated {
        patch: LessonPatch,
        updated_at: DateTime<Utc>,
    },
    Deleted,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewLesson {
    pub title: String,
    pub status: LessonStatus,
    pub publish_date: DateTime<Utc>,
    pub video_url: String,
    pub youtube_id: Option<String>,
    pub thumbnail_url: Option<String>,
    pub course_id: CourseId,
}

impl NewLesson {
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<()> {
        validate_title(&self.title)?;
        validate_publish_date(self.publish_date, now)?;
        validate_url("videoUrl", &self.video_url)?;
        if let Some(thumbnail) = &self.thumbnail_url {
            validate_url("thumbnailUrl", thumbnail)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct LessonPatch {
    pub title: Option<String>,
    pub status: Option<LessonStatus>,
    pub publish_date: Option<DateTime<Utc>>,
    pub video_url: Option<String>,
    pub youtube_id: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl LessonPatch {
    pub fn validate(&self, now: DateTime<Utc>) -> AppResult<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(publish_date) = self.publish_date {
            validate_publish_date(publish_date, now)?;
        }
        if let Some(video_url) = &self.video_url {
            validate_url("videoUrl", video_url)?;
        }
        if let Some(thumbnail) = &self.thumbnail_url {
            validate_url("thumbnailUrl", thumbnail)?;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> AppResult<()> {
    if title.trim().chars().count() < MIN_TITLE_LEN {
        return Err(KnownErrors::invalid(format!(
            "title must have at least {MIN_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_publish_date(publish_date: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<()> {
    if publish_date <= now {
        return Err(KnownErrors::invalid("publishDate must be in the future"));
    }
    Ok(())
}

fn validate_url(field: &str, value: &str) -> AppResult<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|_| KnownErrors::invalid(format!("{field} must be a valid url")))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonFilter {
    pub title: Option<String>,
    pub status: Option<LessonStatus>,
    pub course_id: Option<CourseId>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl LessonFilter {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, LimitBounds::DEFAULT)
    }

    fn matches(&self, lesson: &LessonState) -> bool {
        contains_ci(&lesson.title, self.title.as_deref())
            && self.status.is_none_or(|s| s == lesson.status)
            && self.course_id.is_none_or(|c| c == lesson.course_id)
    }
}

pub trait LessonStore:
    Clone
    + Send
    + Sync
    + 'static
    + EventStore<Id = LessonId, Event = LessonEvent, Error = KnownErrors>
{
    async fn get_lesson(&self, lesson_id: &LessonId) -> AppResult<Option<LessonState>>;

    async fn find_lesson_by_title(
        &self,
        course_id: &CourseId,
        title: &str,
    ) -> AppResult<Option<LessonState>>;

    /// lists lessons whose course is in `courses`
    async fn list_lessons(
        &self,
        courses: &HashSet<CourseId>,
        filter: &LessonFilter,
    ) -> AppResult<Paginated<LessonState>>;

    /// drops every lesson of a deleted course; returns how many went
    async fn purge_course(&self, course_id: &CourseId) -> AppResult<usize>;
}

#[derive(Clone)]
pub struct LessonMemoryStore {
    lesson_table: Arc<DashMap<LessonId, LessonState>>,
    /// unique index on (course, title)
    title_lookup_table: Arc<DashMap<(CourseId, String), LessonId>>,
}

impl LessonMemoryStore {
    pub fn new() -> Self {
        Self {
            lesson_table: Arc::new(DashMap::new()),
            title_lookup_table: Arc::new(DashMap::new()),
        }
    }

    fn title_conflict() -> KnownErrors {
        KnownErrors::conflict("Lesson title must be unique within the course")
    }
}

impl Default for LessonMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for LessonMemoryStore {
    type Id = LessonId;
    type Event = LessonEvent;
    type Error = KnownErrors;

    async fn record(&self, id: LessonId, by: Authority, event: LessonEvent) -> AppResult<()> {
        match &event {
            LessonEvent::Created(lesson) => {
                match self
                    .title_lookup_table
                    .entry((lesson.course_id, lesson.title.clone()))
                {
                    Entry::Occupied(_) => return Err(Self::title_conflict()),
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
                self.lesson_table.insert(id, (**lesson).clone());
            }
            LessonEvent::Updated { patch, .. } => {
                let mut state = self
                    .lesson_table
                    .get_mut(&id)
                    .ok_or(KnownErrors::not_found("Lesson"))?;

                if let Some(title) = &patch.title
                    && *title != state.title
                {
                    match self.title_lookup_table.entry((state.course_id, title.clone())) {
                        Entry::Occupied(owner) if *owner.get() != id => {
                            return Err(Self::title_conflict());
                        }
                        Entry::Occupied(_) => {}
                        Entry::Vacant(slot) => {
                            slot.insert(id);
                        }
                    }
                    self.title_lookup_table
                        .remove_if(&(state.course_id, state.title.clone()), |_, owner| {
                            *owner == id
                        });
                }

                state.apply(event.clone());
            }
            LessonEvent::Deleted => {
                let (_, state) = self
                    .lesson_table
                    .remove(&id)
                    .ok_or(KnownErrors::not_found("Lesson"))?;
                self.title_lookup_table
                    .remove_if(&(state.course_id, state.title), |_, owner| *owner == id);
            }
        }

        tracing::debug!(lesson = %id, ?by, "recorded lesson event");
        Ok(())
    }
}

impl LessonStore for LessonMemoryStore {
    async fn get_lesson(&self, lesson_id: &LessonId) -> AppResult<Option<LessonState>> {
        Ok(self.lesson_table.get(lesson_id).map(|s| (*s).clone()))
    }

    async fn find_lesson_by_title(
        &self,
        course_id: &CourseId,
        title: &str,
    ) -> AppResult<Option<LessonState>> {
        let Some(id) = self
            .title_lookup_table
            .get(&(*course_id, title.to_owned()))
            .map(|id| *id)
        else {
            return Ok(None);
        };
        self.get_lesson(&id).await
    }

    async fn list_lessons(
        &self,
        courses: &HashSet<CourseId>,
        filter: &LessonFilter,
    ) -> AppResult<Paginated<LessonState>> {
        let rows = self
            .lesson_table
            .iter()
            .filter(|l| courses.contains(&l.course_id) && filter.matches(l))
            .map(|l| l.value().clone())
            .collect();

        Ok(paginate(rows, filter.page_request()))
    }

    async fn purge_course(&self, course_id: &CourseId) -> AppResult<usize> {
        let doomed: Vec<LessonId> = self
            .lesson_table
            .iter()
            .filter(|l| l.course_id == *course_id)
            .map(|l| *l.key())
            .collect();

        let mut purged = 0;
        for id in doomed {
            if let Some((_, lesson)) = self
                .lesson_table
                .remove_if(&id, |_, l| l.course_id == *course_id)
            {
                self.title_lookup_table
                    .remove_if(&(lesson.course_id, lesson.title), |_, owner| *owner == id);
                purged += 1;
            }
        }

        tracing::debug!(course = %course_id, purged, "purged course lessons");
        Ok(purged)
    }
}
