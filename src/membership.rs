//! Ownership and course-membership questions, answered over rows the caller
//! has already fetched.

use crate::authority::UserId;
use crate::course::CourseState;
use crate::lesson::LessonState;
use crate::sample::SampleState;

/// Rows with a single owning user.
pub trait Owned {
    fn owner_id(&self) -> UserId;
}

impl Owned for SampleState {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }
}

impl Owned for CourseState {
    fn owner_id(&self) -> UserId {
        self.creator_id
    }
}

impl Owned for LessonState {
    fn owner_id(&self) -> UserId {
        self.creator_id
    }
}

pub fn is_owner<T: Owned>(instance: &T, actor: UserId) -> bool {
    instance.owner_id() == actor
}

/// The creator counts even without an instructor edge.
pub fn is_course_instructor_or_creator(course: &CourseState, actor: UserId) -> bool {
    is_owner(course, actor) || course.has_instructor(actor)
}

pub fn is_lesson_manager(lesson: &LessonState, course: &CourseState, actor: UserId) -> bool {
    is_owner(lesson, actor) || is_course_instructor_or_creator(course, actor)
}
