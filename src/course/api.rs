use crate::StateType;
use crate::auth::CurrentUser;
use crate::authority::UserId;
use crate::course::CourseFilter;
use crate::course::CoursePatch;
use crate::course::CourseState;
use crate::course::MembershipEdge;
use crate::course::NewCourse;
use crate::extract::AppJson;
use crate::extract::AppPath;
use crate::extract::AppQuery;
use crate::ident::CourseId;
use crate::known_errors::AppResult;
use crate::query::Paginated;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;

pub fn router() -> Router<StateType> {
    Router::new()
        .route("/", get(list_courses).post(create_course))
        .route(
            "/{id}",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/{id}/instructors", post(add_instructor))
        .route("/{id}/instructors/{user_id}", delete(remove_instructor))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddInstructorBody {
    user_id: UserId,
}

async fn list_courses(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppQuery(filter): AppQuery<CourseFilter>,
) -> AppResult<Json<Paginated<CourseState>>> {
    Ok(Json(state.courses().get_all(actor, &filter).await?))
}

async fn get_course(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<CourseId>,
) -> AppResult<Json<CourseState>> {
    Ok(Json(state.courses().get_by_id(actor, id).await?))
}

async fn create_course(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppJson(body): AppJson<NewCourse>,
) -> AppResult<(StatusCode, Json<CourseState>)> {
    body.validate()?;
    let course = state.courses().create(actor, body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<CourseId>,
    AppJson(body): AppJson<CoursePatch>,
) -> AppResult<Json<CourseState>> {
    body.validate()?;
    Ok(Json(state.courses().update(actor, id, body).await?))
}

async fn delete_course(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<CourseId>,
) -> AppResult<StatusCode> {
    state.delete_course(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_instructor(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<CourseId>,
    AppJson(body): AppJson<AddInstructorBody>,
) -> AppResult<(StatusCode, Json<MembershipEdge>)> {
    let edge = state
        .courses()
        .add_instructor(actor, id, body.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

async fn remove_instructor(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath((id, user_id)): AppPath<(CourseId, UserId)>,
) -> AppResult<StatusCode> {
    state
        .courses()
        .remove_instructor(actor, id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
