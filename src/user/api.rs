use crate::StateType;
use crate::auth::CurrentUser;
use crate::authority::UserId;
use crate::extract::AppJson;
use crate::extract::AppPath;
use crate::extract::AppQuery;
use crate::known_errors::AppResult;
use crate::query::Paginated;
use crate::role::RoleId;
use crate::user::NewUser;
use crate::user::UserFilter;
use crate::user::UserUpdate;
use crate::user::UserView;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::patch;
use serde::Deserialize;

pub fn router() -> Router<StateType> {
    Router::new()
        .route("/", get(list_users).post(register_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/role", patch(manage_role))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManageRoleBody {
    role_id: RoleId,
}

async fn list_users(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppQuery(filter): AppQuery<UserFilter>,
) -> AppResult<Json<Paginated<UserView>>> {
    Ok(Json(state.users().get_all(actor, &filter).await?))
}

async fn get_user(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<UserId>,
) -> AppResult<Json<UserView>> {
    Ok(Json(state.users().get_by_id(actor, id).await?))
}

/// Open to anonymous callers.
async fn register_user(
    State(state): State<StateType>,
    AppJson(body): AppJson<NewUser>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    body.validate()?;
    let user = state.users().create(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<UserId>,
    AppJson(body): AppJson<UserUpdate>,
) -> AppResult<Json<UserView>> {
    body.validate()?;
    Ok(Json(state.users().update(actor, id, body).await?))
}

async fn delete_user(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<UserId>,
) -> AppResult<StatusCode> {
    state.users().delete(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn manage_role(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<UserId>,
    AppJson(body): AppJson<ManageRoleBody>,
) -> AppResult<Json<UserView>> {
    Ok(Json(state.users().manage_role(actor, id, body.role_id).await?))
}
