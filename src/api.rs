use crate::StateType;
use crate::course;
use crate::known_errors::KnownErrors;
use crate::lesson;
use crate::sample;
use crate::user;
use axum::Json;
use axum::Router;
use axum::routing::get;
use serde_json::Value;
use serde_json::json;
use tower_http::trace::TraceLayer;

pub fn router(state: StateType) -> Router {
    let api = Router::new()
        .nest("/sample", sample::api::router())
        .nest("/course", course::api::router())
        .nest("/lesson", lesson::api::router())
        .nest("/user", user::api::router());

    Router::new()
        .route("/", get(health))
        .nest("/api", api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "API ONLINE!" }))
}

async fn not_found() -> KnownErrors {
    KnownErrors::not_found("Route")
}
