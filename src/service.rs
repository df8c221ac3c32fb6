use crate::auth::TokenVerifier;
use crate::authority::UserId;
use crate::course::CandidateLookup;
use crate::course::CourseMemoryStore;
use crate::course::CourseService;
use crate::course::CourseStore;
use crate::course::HttpCandidateLookup;
use crate::ident::CourseId;
use crate::known_errors::AppResult;
use crate::lesson::LessonMemoryStore;
use crate::lesson::LessonService;
use crate::lesson::LessonStore;
use crate::role::RoleMemoryStore;
use crate::role::RoleStore;
use crate::sample::SampleMemoryStore;
use crate::sample::SampleService;
use crate::sample::SampleStore;
use crate::user::UserMemoryStore;
use crate::user::UserService;
use crate::user::UserStore;
use axum::extract::FromRef;

/// Every resource service, wired to one shared set of stores.
#[derive(Clone)]
pub struct Service<S, C, L, U, R, K>
where
    S: SampleStore,
    C: CourseStore,
    L: LessonStore,
    U: UserStore,
    R: RoleStore,
    K: CandidateLookup,
{
    sample_service: SampleService<S, U, R>,
    course_service: CourseService<C, U, K>,
    lesson_service: LessonService<L, C, U>,
    user_service: UserService<U, R>,
    lesson_store: L,
    role_store: R,
    tokens: TokenVerifier,
}

impl<S, C, L, U, R, K> Service<S, C, L, U, R, K>
where
    S: SampleStore,
    C: CourseStore,
    L: LessonStore,
    U: UserStore,
    R: RoleStore,
    K: CandidateLookup,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sample_store: S,
        course_store: C,
        lesson_store: L,
        user_store: U,
        role_store: R,
        candidates: K,
        tokens: TokenVerifier,
    ) -> Self {
        let user_service = UserService::new(user_store.clone(), role_store.clone());
        Self {
            sample_service: SampleService::new(sample_store, user_service.permission_loader()),
            course_service: CourseService::new(course_store.clone(), user_store.clone(), candidates),
            lesson_service: LessonService::new(lesson_store.clone(), course_store, user_store),
            user_service,
            lesson_store,
            role_store,
            tokens,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.user_service = self.user_service.with_hash_cost(cost);
        self
    }

    pub fn samples(&self) -> &SampleService<S, U, R> {
        &self.sample_service
    }

    pub fn courses(&self) -> &CourseService<C, U, K> {
        &self.course_service
    }

    pub fn lessons(&self) -> &LessonService<L, C, U> {
        &self.lesson_service
    }

    pub fn users(&self) -> &UserService<U, R> {
        &self.user_service
    }

    pub fn role_store(&self) -> &R {
        &self.role_store
    }

    /// Deletes a course and every lesson under it.
    #[tracing::instrument(skip(self))]
    pub async fn delete_course(&self, actor: UserId, course_id: CourseId) -> AppResult<()> {
        self.course_service.delete(actor, course_id).await?;
        let purged = self.lesson_store.purge_course(&course_id).await?;
        tracing::info!(course = %course_id, purged, "deleted course");
        Ok(())
    }
}

impl<S, C, L, U, R, K> FromRef<Service<S, C, L, U, R, K>> for TokenVerifier
where
    S: SampleStore,
    C: CourseStore,
    L: LessonStore,
    U: UserStore,
    R: RoleStore,
    K: CandidateLookup,
{
    fn from_ref(service: &Service<S, C, L, U, R, K>) -> Self {
        service.tokens.clone()
    }
}

pub type MemoryService = Service<
    SampleMemoryStore,
    CourseMemoryStore,
    LessonMemoryStore,
    UserMemoryStore,
    RoleMemoryStore,
    HttpCandidateLookup,
>;

impl MemoryService {
    pub fn in_memory(candidates: HttpCandidateLookup, tokens: TokenVerifier) -> Self {
        Self::new(
            SampleMemoryStore::new(),
            CourseMemoryStore::new(),
            LessonMemoryStore::new(),
            UserMemoryStore::new(),
            RoleMemoryStore::new(),
            candidates,
            tokens,
        )
    }
}
