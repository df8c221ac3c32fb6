use crate::authority::UserId;
use crate::course::CourseState;
use crate::course::CourseStore;
use crate::ident::CourseId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::membership::is_course_instructor_or_creator;
use crate::membership::is_owner;
use crate::user::UserStore;
use crate::user::active_actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseAction {
    View,
    /// any lesson operation scoped to the course
    ManageLessons,
    Update,
    Delete,
    AddInstructor,
    RemoveInstructor,
}

impl CourseAction {
    fn creator_only(self) -> bool {
        matches!(
            self,
            CourseAction::Update
                | CourseAction::Delete
                | CourseAction::AddInstructor
                | CourseAction::RemoveInstructor
        )
    }
}

/// Decides `action` over an already loaded course.
pub fn check(course: &CourseState, actor: UserId, action: CourseAction) -> AppResult<()> {
    let allowed = if action.creator_only() {
        is_owner(course, actor)
    } else {
        is_course_instructor_or_creator(course, actor)
    };

    if allowed {
        Ok(())
    } else if action.creator_only() {
        Err(KnownErrors::unauthorized(
            "Only the course creator can perform this action",
        ))
    } else {
        Err(KnownErrors::unauthorized(
            "You must be the creator or an instructor of this course",
        ))
    }
}

#[derive(Clone)]
pub struct CoursePolicy<C, U>
where
    C: CourseStore,
    U: UserStore,
{
    course_store: C,
    user_store: U,
}

impl<C, U> CoursePolicy<C, U>
where
    C: CourseStore,
    U: UserStore,
{
    pub fn new(course_store: C, user_store: U) -> Self {
        Self {
            course_store,
            user_store,
        }
    }

    /// Fails for an actor that is missing or soft deleted.
    pub async fn authorize_actor(&self, actor: UserId) -> AppResult<()> {
        active_actor(&self.user_store, actor)
            .await
            .inspect_err(|_| tracing::warn!(%actor, "inactive actor denied"))
            .map(|_| ())
    }

    /// Loads the course once and returns it to the caller on success.
    pub async fn authorize(
        &self,
        actor: UserId,
        action: CourseAction,
        course_id: &CourseId,
    ) -> AppResult<CourseState> {
        self.authorize_actor(actor).await?;

        let course = self
            .course_store
            .get_course(course_id)
            .await?
            .ok_or(KnownErrors::not_found("Course"))?;

        check(&course, actor, action).inspect_err(|_| {
            tracing::warn!(%actor, ?action, course = %course_id, "course access denied");
        })?;

        Ok(course)
    }
}
