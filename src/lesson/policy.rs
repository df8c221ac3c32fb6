use crate::authority::UserId;
use crate::course::CourseState;
use crate::course::CourseStore;
use crate::ident::CourseId;
use crate::ident::LessonId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::lesson::LessonState;
use crate::lesson::LessonStore;
use crate::membership::is_course_instructor_or_creator;
use crate::membership::is_lesson_manager;
use crate::user::UserStore;
use crate::user::active_actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LessonAction {
    View,
    Create,
    Update,
    Delete,
}

/// Viewing and creating need course membership; changing a lesson is also
/// open to its own author.
pub fn check(
    course: &CourseState,
    lesson: Option<&LessonState>,
    actor: UserId,
    action: LessonAction,
) -> AppResult<()> {
    let allowed = match action {
        LessonAction::View | LessonAction::Create => {
            is_course_instructor_or_creator(course, actor)
        }
        LessonAction::Update | LessonAction::Delete => {
            lesson.is_some_and(|l| is_lesson_manager(l, course, actor))
        }
    };

    if allowed {
        Ok(())
    } else {
        Err(KnownErrors::unauthorized(
            "The user is not an instructor or creator of the course",
        ))
    }
}

#[derive(Clone)]
pub struct LessonPolicy<L, C, U>
where
    L: LessonStore,
    C: CourseStore,
    U: UserStore,
{
    lesson_store: L,
    course_store: C,
    user_store: U,
}

impl<L, C, U> LessonPolicy<L, C, U>
where
    L: LessonStore,
    C: CourseStore,
    U: UserStore,
{
    pub fn new(lesson_store: L, course_store: C, user_store: U) -> Self {
        Self {
            lesson_store,
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

    async fn course(&self, course_id: &CourseId) -> AppResult<CourseState> {
        self.course_store
            .get_course(course_id)
            .await?
            .ok_or(KnownErrors::not_found("Course"))
    }

    /// For actions scoped to a course rather than a lesson: creating a
    /// lesson or listing a single course's lessons.
    pub async fn authorize_course(&self, actor: UserId, course_id: &CourseId) -> AppResult<CourseState> {
        self.authorize_actor(actor).await?;
        let course = self.course(course_id).await?;
        check(&course, None, actor, LessonAction::Create).inspect_err(|_| {
            tracing::warn!(%actor, course = %course_id, "lesson course access denied");
        })?;
        Ok(course)
    }

    /// Loads the lesson and its course once and returns both.
    pub async fn authorize(
        &self,
        actor: UserId,
        action: LessonAction,
        lesson_id: &LessonId,
    ) -> AppResult<(LessonState, CourseState)> {
        self.authorize_actor(actor).await?;
        let lesson = self
            .lesson_store
            .get_lesson(lesson_id)
            .await?
            .ok_or(KnownErrors::not_found("Lesson"))?;
        let course = self.course(&lesson.course_id).await?;

        check(&course, Some(&lesson), actor, action).inspect_err(|_| {
            tracing::warn!(%actor, ?action, lesson = %lesson_id, "lesson access denied");
        })?;

        Ok((lesson, course))
    }
}
