pub mod api;
pub mod candidate;
pub mod policy;
pub mod service;

pub use candidate::CandidateLookup;
pub use candidate::HttpCandidateLookup;
pub use policy::CourseAction;
pub use policy::CoursePolicy;
pub use service::CourseService;

use crate::authority::Authority;
use crate::authority::UserId;
use crate::event::EventStore;
use crate::ident::CourseId;
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
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MIN_NAME_LEN: usize = 3;

/// A (course, user) pair in the instructor or student relation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipEdge {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CourseState {
    pub id: CourseId,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub creator_id: UserId,
    pub instructors: Vec<MembershipEdge>,
    pub students: Vec<MembershipEdge>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CourseState {
    pub fn instructor_edge(&self, user_id: UserId) -> Option<&MembershipEdge> {
        self.instructors.iter().find(|e| e.user_id == user_id)
    }

    pub fn has_instructor(&self, user_id: UserId) -> bool {
        self.instructor_edge(user_id).is_some()
    }

    pub fn apply(&mut self, event: CourseEvent) {
        match event {
            CourseEvent::Created { .. } | CourseEvent::Deleted => {}
            CourseEvent::Updated { patch, updated_at } => {
                if let Some(name) = patch.name {
                    self.name = name;
                }
                if patch.description.is_some() {
                    self.description = patch.description;
                }
                if let Some(start_date) = patch.start_date {
                    self.start_date = start_date;
                }
                if let Some(end_date) = patch.end_date {
                    self.end_date = end_date;
                }
                self.updated_at = updated_at;
            }
            CourseEvent::AddedInstructor { user_id, added_at } => {
                if !self.has_instructor(user_id) {
                    self.instructors.push(MembershipEdge {
                        course_id: self.id,
                        user_id,
                        created_at: added_at,
                    });
                }
            }
            CourseEvent::RemovedInstructor { user_id } => {
                self.instructors.retain(|e| e.user_id != user_id);
            }
        }
    }
}

impl Listed for CourseState {
    type Key = CourseId;

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn sort_key(&self) -> CourseId {
        self.id
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum CourseEvent {
    /// also enrolls the creator as the first instructor
    Created {
        name: String,
        description: Option<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    },
    Updated {
        patch: CoursePatch,
        updated_at: DateTime<Utc>,
    },
    AddedInstructor {
        user_id: UserId,
        added_at: DateTime<Utc>,
    },
    RemovedInstructor {
        user_id: UserId,
    },
    Deleted,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewCourse {
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl NewCourse {
    pub fn validate(&self) -> AppResult<()> {
        validate_name(&self.name)?;
        validate_description(self.description.as_deref())?;
        if self.end_date <= self.start_date {
            return Err(KnownErrors::invalid("endDate must be after startDate"));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CoursePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl CoursePatch {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_description(self.description.as_deref())?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date)
            && end <= start
        {
            return Err(KnownErrors::invalid("endDate must be after startDate"));
        }
        Ok(())
    }
}

fn validate_name(name: &str) -> AppResult<()> {
    if name.trim().chars().count() < MIN_NAME_LEN {
        return Err(KnownErrors::invalid(format!(
            "name must have at least {MIN_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> AppResult<()> {
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(KnownErrors::invalid(format!(
            "description must have at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseFilter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl CourseFilter {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, LimitBounds::DEFAULT)
    }

    fn matches(&self, course: &CourseState) -> bool {
        contains_ci(&course.name, self.name.as_deref())
            && optional_contains_ci(course.description.as_deref(), self.description.as_deref())
            && within(course.created_at, self.created_from, self.created_to)
    }
}

pub trait CourseStore:
    Clone
    + Send
    + Sync
    + 'static
    + EventStore<Id = CourseId, Event = CourseEvent, Error = KnownErrors>
{
    /// returns the course with its instructor and student edges loaded
    async fn get_course(&self, course_id: &CourseId) -> AppResult<Option<CourseState>>;

    async fn find_course_by_name(&self, name: &str) -> AppResult<Option<CourseState>>;

    /// lists only courses the user created or instructs
    async fn list_courses(
        &self,
        user_id: UserId,
        filter: &CourseFilter,
    ) -> AppResult<Paginated<CourseState>>;

    /// ids of every course the user created or instructs
    async fn get_user_courses(&self, user_id: UserId) -> AppResult<HashSet<CourseId>>;
}

#[derive(Clone)]
pub struct CourseMemoryStore {
    course_table: Arc<DashMap<CourseId, CourseState>>,
    /// unique index on the course name
    name_lookup_table: Arc<DashMap<String, CourseId>>,
}

impl CourseMemoryStore {
    pub fn new() -> Self {
        Self {
            course_table: Arc::new(DashMap::new()),
            name_lookup_table: Arc::new(DashMap::new()),
        }
    }

    fn is_visible_to(course: &CourseState, user_id: UserId) -> bool {
        course.creator_id == user_id || course.has_instructor(user_id)
    }
}

impl Default for CourseMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for CourseMemoryStore {
    type Id = CourseId;
    type Event = CourseEvent;
    type Error = KnownErrors;

    async fn record(&self, id: CourseId, by: Authority, event: CourseEvent) -> AppResult<()> {
        match &event {
            CourseEvent::Created {
                name,
                description,
                start_date,
                end_date,
                creator_id,
                created_at,
            } => {
                match self.name_lookup_table.entry(name.clone()) {
                    Entry::Occupied(_) => {
                        return Err(KnownErrors::conflict("Course name must be unique"));
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }

                self.course_table.insert(
                    id,
                    CourseState {
                        id,
                        name: name.clone(),
                        description: description.clone(),
                        start_date: *start_date,
                        end_date: *end_date,
                        creator_id: *creator_id,
                        instructors: vec![MembershipEdge {
                            course_id: id,
                            user_id: *creator_id,
                            created_at: *created_at,
                        }],
                        students: Vec::new(),
                        created_at: *created_at,
                        updated_at: *created_at,
                    },
                );
            }
            CourseEvent::Deleted => {
                let (_, state) = self
                    .course_table
                    .remove(&id)
                    .ok_or(KnownErrors::not_found("Course"))?;
                self.name_lookup_table
                    .remove_if(&state.name, |_, owner| *owner == id);
            }
            CourseEvent::Updated { patch, .. } => {
                let mut state = self
                    .course_table
                    .get_mut(&id)
                    .ok_or(KnownErrors::not_found("Course"))?;

                if let Some(name) = &patch.name
                    && *name != state.name
                {
                    match self.name_lookup_table.entry(name.clone()) {
                        Entry::Occupied(owner) if *owner.get() != id => {
                            return Err(KnownErrors::conflict("Course name must be unique"));
                        }
                        Entry::Occupied(_) => {}
                        Entry::Vacant(slot) => {
                            slot.insert(id);
                        }
                    }
                    self.name_lookup_table
                        .remove_if(&state.name, |_, owner| *owner == id);
                }

                state.apply(event.clone());
            }
            CourseEvent::RemovedInstructor { user_id } => {
                let mut state = self
                    .course_table
                    .get_mut(&id)
                    .ok_or(KnownErrors::not_found("Course"))?;
                if !state.has_instructor(*user_id) {
                    return Err(KnownErrors::not_found("Instructor in course"));
                }
                state.apply(event.clone());
            }
            CourseEvent::AddedInstructor { .. } => {
                self.course_table
                    .get_mut(&id)
                    .ok_or(KnownErrors::not_found("Course"))?
                    .apply(event.clone());
            }
        }

        tracing::debug!(course = %id, ?by, "recorded course event");
        Ok(())
    }
}

impl CourseStore for CourseMemoryStore {
    async fn get_course(&self, course_id: &CourseId) -> AppResult<Option<CourseState>> {
        Ok(self.course_table.get(course_id).map(|s| (*s).clone()))
    }

    async fn find_course_by_name(&self, name: &str) -> AppResult<Option<CourseState>> {
        let Some(id) = self.name_lookup_table.get(name).map(|id| *id) else {
            return Ok(None);
        };
        self.get_course(&id).await
    }

    async fn list_courses(
        &self,
        user_id: UserId,
        filter: &CourseFilter,
    ) -> AppResult<Paginated<CourseState>> {
        let rows = self
            .course_table
            .iter()
            .filter(|c| Self::is_visible_to(c, user_id) && filter.matches(c))
            .map(|c| c.value().clone())
            .collect();

        Ok(paginate(rows, filter.page_request()))
    }

    async fn get_user_courses(&self, user_id: UserId) -> AppResult<HashSet<CourseId>> {
        Ok(self
            .course_table
            .iter()
            .filter(|c| Self::is_visible_to(c, user_id))
            .map(|c| *c.key())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn created(name: &str, creator_id: UserId) -> CourseEvent {
        let now = Utc::now();
        CourseEvent::Created {
            name: name.into(),
            description: None,
            start_date: now,
            end_date: now + Duration::days(30),
            creator_id,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_creation_enrolls_creator_atomically() {
        let store = CourseMemoryStore::new();
        let creator = UserId::new();
        let id = CourseId::new();

        store
            .record(id, Authority::user(creator), created("Intro", creator))
            .await
            .expect("create course");

        let course = store.get_course(&id).await.expect("lookup").expect("exists");
        assert_eq!(course.instructors.len(), 1);
        assert_eq!(course.instructors[0].user_id, creator);
        assert!(course.students.is_empty());
    }

    #[tokio::test]
    async fn test_name_index_follows_renames_and_deletes() {
        let store = CourseMemoryStore::new();
        let creator = UserId::new();
        let id = CourseId::new();

        store
            .record(id, Authority::user(creator), created("Intro", creator))
            .await
            .expect("create course");
        store
            .record(
                id,
                Authority::user(creator),
                CourseEvent::Updated {
                    patch: CoursePatch {
                        name: Some("Advanced".into()),
                        ..CoursePatch::default()
                    },
                    updated_at: Utc::now(),
                },
            )
            .await
            .expect("rename");

        assert!(store.find_course_by_name("Intro").await.expect("lookup").is_none());
        assert!(store.find_course_by_name("Advanced").await.expect("lookup").is_some());

        store
            .record(id, Authority::user(creator), CourseEvent::Deleted)
            .await
            .expect("delete");
        assert!(store.find_course_by_name("Advanced").await.expect("lookup").is_none());

        // the name is free again
        store
            .record(CourseId::new(), Authority::user(creator), created("Advanced", creator))
            .await
            .expect("reuse name");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_renames_to_one_name_admit_one_course() {
        let store = CourseMemoryStore::new();
        let creator = UserId::new();
        let mut ids = Vec::new();
        for n in 0..16 {
            let id = CourseId::new();
            store
                .record(id, Authority::user(creator), created(&format!("Course {n}"), creator))
                .await
                .expect("create course");
            ids.push(id);
        }

        let tasks: Vec<_> = ids
            .iter()
            .map(|&id| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .record(
                            id,
                            Authority::user(creator),
                            CourseEvent::Updated {
                                patch: CoursePatch {
                                    name: Some("Shared".into()),
                                    ..CoursePatch::default()
                                },
                                updated_at: Utc::now(),
                            },
                        )
                        .await
                })
            })
            .collect();

        let mut winners = Vec::new();
        for (id, task) in ids.iter().zip(tasks) {
            match task.await.expect("task should not panic") {
                Ok(()) => winners.push(*id),
                Err(err) => assert!(matches!(err, KnownErrors::Conflict { .. })),
            }
        }

        assert_eq!(winners.len(), 1);
        let holder = store
            .find_course_by_name("Shared")
            .await
            .expect("lookup")
            .expect("one course holds the name");
        assert_eq!(holder.id, winners[0]);
        assert_eq!(
            store.course_table.iter().filter(|c| c.name == "Shared").count(),
            1
        );
        assert_eq!(store.name_lookup_table.len(), ids.len());
    }

    #[tokio::test]
    async fn test_adding_an_instructor_twice_keeps_one_edge() {
        let store = CourseMemoryStore::new();
        let creator = UserId::new();
        let instructor = UserId::new();
        let id = CourseId::new();

        store
            .record(id, Authority::user(creator), created("Intro", creator))
            .await
            .expect("create course");

        for _ in 0..2 {
            store
                .record(
                    id,
                    Authority::user(creator),
                    CourseEvent::AddedInstructor {
                        user_id: instructor,
                        added_at: Utc::now(),
                    },
                )
                .await
                .expect("add instructor");
        }

        let course = store.get_course(&id).await.expect("lookup").expect("exists");
        assert_eq!(
            course
                .instructors
                .iter()
                .filter(|e| e.user_id == instructor)
                .count(),
            1
        );
        assert!(
            store
                .get_user_courses(instructor)
                .await
                .expect("scope")
                .contains(&id)
        );
    }

    #[tokio::test]
    async fn test_listing_is_scoped_and_filtered() {
        let store = CourseMemoryStore::new();
        let alice = UserId::new();
        let bob = UserId::new();

        store
            .record(CourseId::new(), Authority::user(alice), created("Rust Basics", alice))
            .await
            .expect("create");
        store
            .record(CourseId::new(), Authority::user(alice), created("Go Basics", alice))
            .await
            .expect("create");
        store
            .record(CourseId::new(), Authority::user(bob), created("Rust Advanced", bob))
            .await
            .expect("create");

        let filter = CourseFilter {
            name: Some("rust".into()),
            ..CourseFilter::default()
        };
        let page = store.list_courses(alice, &filter).await.expect("list");
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Rust Basics");

        let all = store
            .list_courses(bob, &CourseFilter::default())
            .await
            .expect("list");
        assert_eq!(all.total, 1);
    }

    #[test]
    fn test_new_course_validation() {
        let now = Utc::now();
        let course = NewCourse {
            name: "Intro".into(),
            description: None,
            start_date: now,
            end_date: now,
        };
        assert!(matches!(course.validate(), Err(KnownErrors::Validation { .. })));

        let course = NewCourse {
            name: "ab".into(),
            end_date: now + Duration::days(1),
            ..course
        };
        assert!(matches!(course.validate(), Err(KnownErrors::Validation { .. })));

        let course = NewCourse {
            name: "abc".into(),
            description: Some("x".repeat(MAX_DESCRIPTION_LEN + 1)),
            ..course
        };
        assert!(course.validate().is_err());

        let course = NewCourse {
            description: Some("fine".into()),
            ..course
        };
        assert!(course.validate().is_ok());
    }
}
