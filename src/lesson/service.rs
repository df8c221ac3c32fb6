use crate::authority::Authority;
use crate::authority::UserId;
use crate::course::CourseStore;
use crate::event::EventStore;
use crate::ident::LessonId;
use crate::known_errors::AppResult;
use crate::known_errors::KnownErrors;
use crate::lesson::LessonAction;
use crate::lesson::LessonEvent;
use crate::lesson::LessonFilter;
use crate::lesson::LessonPatch;
use crate::lesson::LessonPolicy;
use crate::lesson::LessonState;
use crate::lesson::LessonStore;
use crate::lesson::NewLesson;
use crate::query::Paginated;
use crate::user::UserStore;
use chrono::Utc;

#[derive(Clone)]
pub struct LessonService<L, C, U>
where
    L: LessonStore,
    C: CourseStore,
    U: UserStore,
{
    lesson_store: L,
    course_store: C,
    policy: LessonPolicy<L, C, U>,
}

impl<L, C, U> LessonService<L, C, U>
where
    L: LessonStore,
    C: CourseStore,
    U: UserStore,
{
    pub fn new(lesson_store: L, course_store: C, user_store: U) -> Self {
        Self {
            policy: LessonPolicy::new(lesson_store.clone(), course_store.clone(), user_store),
            lesson_store,
            course_store,
        }
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn get_all(
        &self,
        actor: UserId,
        filter: &LessonFilter,
    ) -> AppResult<Paginated<LessonState>> {
        match &filter.course_id {
            Some(course_id) => {
                self.policy.authorize_course(actor, course_id).await?;
            }
            None => self.policy.authorize_actor(actor).await?,
        }

        let courses = self.course_store.get_user_courses(actor).await?;
        self.lesson_store.list_lessons(&courses, filter).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, actor: UserId, lesson_id: LessonId) -> AppResult<LessonState> {
        let (lesson, _) = self
            .policy
            .authorize(actor, LessonAction::View, &lesson_id)
            .await?;
        Ok(lesson)
    }

    #[tracing::instrument(skip(self, lesson))]
    pub async fn create(&self, actor: UserId, lesson: NewLesson) -> AppResult<LessonState> {
        let course = self.policy.authorize_course(actor, &lesson.course_id).await?;

        if self
            .lesson_store
            .find_lesson_by_title(&course.id, &lesson.title)
            .await?
            .is_some()
        {
            return Err(KnownErrors::conflict(
                "Lesson title must be unique within the course",
            ));
        }

        let id = LessonId::new();
        let now = Utc::now();
        self.lesson_store
            .record(
                id,
                Authority::user(actor),
                LessonEvent::Created(Box::new(LessonState {
                    id,
                    title: lesson.title,
                    status: lesson.status,
                    publish_date: lesson.publish_date,
                    video_url: lesson.video_url,
                    youtube_id: lesson.youtube_id,
                    thumbnail_url: lesson.thumbnail_url,
                    course_id: course.id,
                    creator_id: actor,
                    created_at: now,
                    updated_at: now,
                })),
            )
            .await?;

        tracing::info!(lesson = %id, course = %course.id, "created lesson");
        self.fetch(&id).await
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(
        &self,
        actor: UserId,
        lesson_id: LessonId,
        patch: LessonPatch,
    ) -> AppResult<LessonState> {
        let (lesson, _) = self
            .policy
            .authorize(actor, LessonAction::Update, &lesson_id)
            .await?;

        if let Some(title) = &patch.title
            && *title != lesson.title
            && self
                .lesson_store
                .find_lesson_by_title(&lesson.course_id, title)
                .await?
                .is_some_and(|other| other.id != lesson_id)
        {
            return Err(KnownErrors::conflict(
                "Lesson title must be unique within the course",
            ));
        }

        self.lesson_store
            .record(
                lesson_id,
                Authority::user(actor),
                LessonEvent::Updated {
                    patch,
                    updated_at: Utc::now(),
                },
            )
            .await?;

        self.fetch(&lesson_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, actor: UserId, lesson_id: LessonId) -> AppResult<()> {
        self.policy
            .authorize(actor, LessonAction::Delete, &lesson_id)
            .await?;

        self.lesson_store
            .record(lesson_id, Authority::user(actor), LessonEvent::Deleted)
            .await
    }

    async fn fetch(&self, lesson_id: &LessonId) -> AppResult<LessonState> {
        self.lesson_store
            .get_lesson(lesson_id)
            .await?
            .ok_or(KnownErrors::not_found("Lesson"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::CourseEvent;
    use crate::course::CourseMemoryStore;
    use crate::ident::CourseId;
    use crate::lesson::LessonMemoryStore;
    use crate::lesson::LessonStatus;
    use crate::test_support;
    use crate::user::UserMemoryStore;
    use chrono::Duration;

    struct Fixture {
        service: LessonService<LessonMemoryStore, CourseMemoryStore, UserMemoryStore>,
        courses: CourseMemoryStore,
        users: UserMemoryStore,
    }

    impl Fixture {
        async fn user(&self) -> UserId {
            test_support::user_with_role(&self.users, test_support::DEFAULT_ROLE).await
        }
    }

    fn fixture() -> Fixture {
        let courses = CourseMemoryStore::new();
        let users = UserMemoryStore::new();
        Fixture {
            service: LessonService::new(LessonMemoryStore::new(), courses.clone(), users.clone()),
            courses,
            users,
        }
    }

    async fn course(courses: &CourseMemoryStore, name: &str, creator_id: UserId) -> CourseId {
        let id = CourseId::new();
        let now = Utc::now();
        courses
            .record(
                id,
                Authority::user(creator_id),
                CourseEvent::Created {
                    name: name.into(),
                    description: None,
                    start_date: now,
                    end_date: now + Duration::days(30),
                    creator_id,
                    created_at: now,
                },
            )
            .await
            .expect("create course");
        id
    }

    async fn enroll(courses: &CourseMemoryStore, course_id: CourseId, user_id: UserId) {
        courses
            .record(
                course_id,
                Authority::system(),
                CourseEvent::AddedInstructor {
                    user_id,
                    added_at: Utc::now(),
                },
            )
            .await
            .expect("add instructor");
    }

    fn new_lesson(course_id: CourseId, title: &str) -> NewLesson {
        NewLesson {
            title: title.into(),
            status: LessonStatus::Draft,
            publish_date: Utc::now() + Duration::days(3),
            video_url: "https://videos.example.com/l1".into(),
            youtube_id: None,
            thumbnail_url: None,
            course_id,
        }
    }

    #[tokio::test]
    async fn test_titles_are_unique_within_a_course_only() {
        let f = fixture();
        let x = f.user().await;
        let y = f.user().await;
        let c1 = course(&f.courses, "C1", x).await;
        let c2 = course(&f.courses, "C2", x).await;
        enroll(&f.courses, c1, y).await;
        enroll(&f.courses, c2, y).await;

        f.service
            .create(y, new_lesson(c1, "L1"))
            .await
            .expect("instructor creates lesson");

        let duplicate = f.service.create(y, new_lesson(c1, "L1")).await;
        assert!(matches!(duplicate, Err(KnownErrors::Conflict { .. })));

        f.service
            .create(y, new_lesson(c2, "L1"))
            .await
            .expect("same title in another course");
    }

    #[tokio::test]
    async fn test_outsider_cannot_create_or_read() {
        let f = fixture();
        let x = f.user().await;
        let outsider = f.user().await;
        let c1 = course(&f.courses, "C1", x).await;

        let denied = f.service.create(outsider, new_lesson(c1, "L1")).await;
        assert!(matches!(denied, Err(KnownErrors::Unauthorized { .. })));

        let lesson = f.service.create(x, new_lesson(c1, "L1")).await.expect("create");
        let denied = f.service.get_by_id(outsider, lesson.id).await;
        assert!(matches!(denied, Err(KnownErrors::Unauthorized { .. })));

        let missing = f.service.get_by_id(x, LessonId::new()).await;
        assert_eq!(missing, Err(KnownErrors::not_found("Lesson")));

        let unknown_course = f.service.create(x, new_lesson(CourseId::new(), "L1")).await;
        assert_eq!(unknown_course, Err(KnownErrors::not_found("Course")));
    }

    #[tokio::test]
    async fn test_instructor_updates_and_deletes_creators_lesson() {
        let f = fixture();
        let x = f.user().await;
        let y = f.user().await;
        let c1 = course(&f.courses, "C1", x).await;
        enroll(&f.courses, c1, y).await;

        let lesson = f.service.create(x, new_lesson(c1, "L1")).await.expect("create");
        let updated = f
            .service
            .update(
                y,
                lesson.id,
                LessonPatch {
                    status: Some(LessonStatus::Published),
                    ..LessonPatch::default()
                },
            )
            .await
            .expect("instructor updates");
        assert_eq!(updated.status, LessonStatus::Published);

        f.service.delete(y, lesson.id).await.expect("instructor deletes");
        let gone = f.service.get_by_id(x, lesson.id).await;
        assert_eq!(gone, Err(KnownErrors::not_found("Lesson")));
    }

    #[tokio::test]
    async fn test_rename_checks_the_course_titles() {
        let f = fixture();
        let x = f.user().await;
        let c1 = course(&f.courses, "C1", x).await;
        f.service.create(x, new_lesson(c1, "Taken")).await.expect("create");
        let lesson = f.service.create(x, new_lesson(c1, "Mine")).await.expect("create");

        let clash = f
            .service
            .update(
                x,
                lesson.id,
                LessonPatch {
                    title: Some("Taken".into()),
                    ..LessonPatch::default()
                },
            )
            .await;
        assert!(matches!(clash, Err(KnownErrors::Conflict { .. })));

        let renamed = f
            .service
            .update(
                x,
                lesson.id,
                LessonPatch {
                    title: Some("Renamed".into()),
                    ..LessonPatch::default()
                },
            )
            .await
            .expect("rename");
        assert_eq!(renamed.title, "Renamed");
    }

    #[tokio::test]
    async fn test_listing_is_scoped_to_visible_courses() {
        let f = fixture();
        let x = f.user().await;
        let y = f.user().await;
        let c1 = course(&f.courses, "C1", x).await;
        let c2 = course(&f.courses, "C2", y).await;
        f.service.create(x, new_lesson(c1, "Mine")).await.expect("create");
        f.service.create(y, new_lesson(c2, "Theirs")).await.expect("create");

        let listed = f
            .service
            .get_all(x, &LessonFilter::default())
            .await
            .expect("list");
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].title, "Mine");

        let foreign = f
            .service
            .get_all(
                x,
                &LessonFilter {
                    course_id: Some(c2),
                    ..LessonFilter::default()
                },
            )
            .await;
        assert!(matches!(foreign, Err(KnownErrors::Unauthorized { .. })));

        // lessons of a deleted course drop out of listings
        f.courses
            .record(c1, Authority::user(x), CourseEvent::Deleted)
            .await
            .expect("delete course");
        let listed = f
            .service
            .get_all(x, &LessonFilter::default())
            .await
            .expect("list");
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_soft_deleted_instructor_loses_lesson_rights() {
        let f = fixture();
        let x = f.user().await;
        let y = f.user().await;
        let c1 = course(&f.courses, "C1", x).await;
        enroll(&f.courses, c1, y).await;
        let lesson = f.service.create(y, new_lesson(c1, "L1")).await.expect("create");

        test_support::soft_delete(&f.users, y).await;
        let denied = KnownErrors::unauthorized("User not found");

        assert_eq!(f.service.create(y, new_lesson(c1, "L2")).await, Err(denied.clone()));
        assert_eq!(f.service.get_by_id(y, lesson.id).await, Err(denied.clone()));
        assert_eq!(
            f.service.get_all(y, &LessonFilter::default()).await,
            Err(denied.clone())
        );
        assert_eq!(f.service.delete(y, lesson.id).await, Err(denied));

        // the course creator keeps access
        f.service.get_by_id(x, lesson.id).await.expect("creator still reads");
    }
}
