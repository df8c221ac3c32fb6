use crate::StateType;
use crate::auth::CurrentUser;
use crate::extract::AppJson;
use crate::extract::AppPath;
use crate::extract::AppQuery;
use crate::ident::SampleId;
use crate::known_errors::AppResult;
use crate::query::Paginated;
use crate::sample::NewSample;
use crate::sample::SampleFilter;
use crate::sample::SamplePatch;
use crate::sample::SampleState;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;

pub fn router() -> Router<StateType> {
    Router::new()
        .route("/", get(list_samples).post(create_sample))
        .route(
            "/{id}",
            get(get_sample).put(update_sample).delete(delete_sample),
        )
}

async fn list_samples(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppQuery(filter): AppQuery<SampleFilter>,
) -> AppResult<Json<Paginated<SampleState>>> {
    Ok(Json(state.samples().get_all(actor, &filter).await?))
}

async fn get_sample(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<SampleId>,
) -> AppResult<Json<SampleState>> {
    Ok(Json(state.samples().get_by_id(actor, id).await?))
}

async fn create_sample(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppJson(body): AppJson<NewSample>,
) -> AppResult<(StatusCode, Json<SampleState>)> {
    body.validate()?;
    let sample = state.samples().create(actor, body).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}

async fn update_sample(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<SampleId>,
    AppJson(body): AppJson<SamplePatch>,
) -> AppResult<Json<SampleState>> {
    body.validate()?;
    Ok(Json(state.samples().update(actor, id, body).await?))
}

async fn delete_sample(
    State(state): State<StateType>,
    CurrentUser(actor): CurrentUser,
    AppPath(id): AppPath<SampleId>,
) -> AppResult<StatusCode> {
    state.samples().delete(actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
