use crate::authority::Authority;
use crate::authority::UserId;
use crate::course::CandidateLookup;
use crate::course::CourseAction;
use crate::course::CourseEvent;
use crate::course::CourseFilter;
use crate::course::CoursePatch;
use crate::course::CoursePolicy;
use crate::course::CourseState;
use crate::course::CourseStore;
use crate::course::MembershipEdge;
use crate::course::NewCourse;
use crate::event::EventStore;
use crate::ident::CourseId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::query::Paginated;
use crate::user::UserStore;
use chrono::Utc;

#[derive(Clone)]
pub struct CourseService<C, U, K>
where
    C: CourseStore,
    U: UserStore,
    K: CandidateLookup,
{
    course_store: C,
    user_store: U,
    candidates: K,
    policy: CoursePolicy<C, U>,
}

impl<C, U, K> CourseService<C, U, K>
where
    C: CourseStore,
    U: UserStore,
    K: CandidateLookup,
{
    pub fn new(course_store: C, user_store: U, candidates: K) -> Self {
        Self {
            policy: CoursePolicy::new(course_store.clone(), user_store.clone()),
            course_store,
            user_store,
            candidates,
        }
    }

    /// Only courses the actor created or instructs are visible.
    #[tracing::instrument(skip(self, filter))]
    pub async fn get_all(
        &self,
        actor: UserId,
        filter: &CourseFilter,
    ) -> AppResult<Paginated<CourseState>> {
        self.policy.authorize_actor(actor).await?;
        self.course_store.list_courses(actor, filter).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, actor: UserId, course_id: CourseId) -> AppResult<CourseState> {
        self.policy
            .authorize(actor, CourseAction::View, &course_id)
            .await
    }

    /// Any authenticated user may create a course and becomes its first
    /// instructor.
    #[tracing::instrument(skip(self, course))]
    pub async fn create(&self, actor: UserId, course: NewCourse) -> AppResult<CourseState> {
        self.policy.authorize_actor(actor).await?;

        if self
            .course_store
            .find_course_by_name(&course.name)
            .await?
            .is_some()
        {
            return Err(KnownErrors::conflict("Course name must be unique"));
        }

        let id = CourseId::new();
        self.course_store
            .record(
                id,
                Authority::user(actor),
                CourseEvent::Created {
                    name: course.name,
                    description: course.description,
                    start_date: course.start_date,
                    end_date: course.end_date,
                    creator_id: actor,
                    created_at: Utc::now(),
                },
            )
            .await?;

        tracing::info!(course = %id, creator = %actor, "created course");
        self.fetch(&id).await
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(
        &self,
        actor: UserId,
        course_id: CourseId,
        patch: CoursePatch,
    ) -> AppResult<CourseState> {
        let course = self
            .policy
            .authorize(actor, CourseAction::Update, &course_id)
            .await?;

        if let Some(name) = &patch.name
            && *name != course.name
            && self
                .course_store
                .find_course_by_name(name)
                .await?
                .is_some_and(|other| other.id != course_id)
        {
            return Err(KnownErrors::conflict("Course name must be unique"));
        }

        let start = patch.start_date.unwrap_or(course.start_date);
        let end = patch.end_date.unwrap_or(course.end_date);
        if end <= start {
            return Err(KnownErrors::invalid("endDate must be after startDate"));
        }

        self.course_store
            .record(
                course_id,
                Authority::user(actor),
                CourseEvent::Updated {
                    patch,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        self.fetch(&course_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, actor: UserId, course_id: CourseId) -> AppResult<()> {
        self.policy
            .authorize(actor, CourseAction::Delete, &course_id)
            .await?;

        self.course_store
            .record(course_id, Authority::user(actor), CourseEvent::Deleted)
            .await
    }

    /// Adding an existing instructor returns the existing edge without
    /// consulting the candidate lookup.
    #[tracing::instrument(skip(self))]
    pub async fn add_instructor(
        &self,
        actor: UserId,
        course_id: CourseId,
        user_id: UserId,
    ) -> AppResult<MembershipEdge> {
        let course = self
            .policy
            .authorize(actor, CourseAction::AddInstructor, &course_id)
            .await?;

        if self.user_store.get_user(user_id).await?.is_none() {
            return Err(KnownErrors::not_found("User"));
        }

        if let Some(edge) = course.instructor_edge(user_id) {
            return Ok(edge.clone());
        }

        self.candidates.check_candidate(user_id).await?;

        self.course_store
            .record(
                course_id,
                Authority::user(actor),
                CourseEvent::AddedInstructor {
                    user_id,
                    added_at: Utc::now(),
                },
            )
            .await?;

        tracing::info!(course = %course_id, instructor = %user_id, "added instructor");
        self.fetch(&course_id)
            .await?
            .instructor_edge(user_id)
            .cloned()
            .ok_or_else(|| KnownErrors::internal("instructor edge missing after insert"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_instructor(
        &self,
        actor: UserId,
        course_id: CourseId,
        user_id: UserId,
    ) -> AppResult<()> {
        let course = self
            .policy
            .authorize(actor, CourseAction::RemoveInstructor, &course_id)
            .await?;

        if !course.has_instructor(user_id) {
            return Err(KnownErrors::not_found("Instructor in course"));
        }
        if user_id == course.creator_id {
            return Err(KnownErrors::conflict(
                "The course creator cannot be removed as instructor",
            ));
        }

        self.course_store
            .record(
                course_id,
                Authority::user(actor),
                CourseEvent::RemovedInstructor { user_id },
            )
            .await
    }

    async fn fetch(&self, course_id: &CourseId) -> AppResult<CourseState> {
        self.course_store
            .get_course(course_id)
            .await?
            .ok_or(KnownErrors::not_found("Course"))
    }
}
