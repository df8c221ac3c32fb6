use crate::StateType;
use crate::auth::CurrentUser;
use crate::extract::AppJson;
use crate::extract::AppPath;
use crate::extract::AppQuery;
use crate::ident::LessonId;
use crate::known_errors::AppResult;
use crate::lesson::LessonFilter;
use crate::lesson::LessonPatch;
use crate::lesson::LessonState;
use crate::lesson::NewLesson;
use crate::query::Paginated;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use chrono::Utc;

pub fn router() -> Router<StateType> {
    Router::new()
        .route("/", get(list_lessons).post(create_lesson))
        .route(
            "/{id}",
            get(get_lesson).put(update_lesson).delete(delete_lesson),
        )
}

async fn list_lessons(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppQuery(filter): AppQuery<LessonFilter>,
) -> AppResult<Json<Paginated<LessonState>>> {
    Ok(Json(state.lessons().get_all(actor, &filter).await?))
}

async fn get_lesson(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<LessonId>,
) -> AppResult<Json<LessonState>> {
    Ok(Json(state.lessons().get_by_id(actor, id).await?))
}

async fn create_lesson(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppJson(body): AppJson<NewLesson>,
) -> AppResult<(StatusCode, Json<LessonState>)> {
    body.validate(Utc::now())?;
    let lesson = state.lessons().create(actor, body).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn update_lesson(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<LessonId>,
    AppJson(body): AppJson<LessonPatch>,
) -> AppResult<Json<LessonState>> {
    body.validate(Utc::now())?;
    Ok(Json(state.lessons().update(actor, id, body).await?))
}

async fn delete_lesson(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<LessonId>,
) -> AppResult<StatusCode> {
    state.lessons().delete(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
