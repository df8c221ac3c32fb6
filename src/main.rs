use clap::Parser;
use coursesphere::api;
use coursesphere::auth::TokenVerifier;
use coursesphere::config::Config;
use coursesphere::course::HttpCandidateLookup;
use coursesphere::seed;
use coursesphere::service::MemoryService;
use dotenvy::dotenv;
use std::env;

#[tokio::main]
async fn main() {
    dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        unsafe {
            // Concurrent writing of set_var is not permitted,
            // but we're in main, so that shouldn't be a problem.
            env::set_var("RUST_LOG", "INFO");
        }
    }
    tracing_subscriber::fmt::init();

    let config = Config::parse();

    let candidates = HttpCandidateLookup::new(
        config.candidate_lookup_url.clone(),
        config.candidate_lookup_timeout(),
    )
    .expect("failed to build the candidate lookup client");

    let app_state = MemoryService::in_memory(candidates, TokenVerifier::new(&config.jwt_secret));

    seed::seed_roles(app_state.role_store())
        .await
        .expect("failed to provision roles");

    if config.seed_dev_data {
        seed::seed_dev_users(app_state.users())
            .await
            .expect("failed to seed dev users");
    }

    let app = api::router(app_state);

    tracing::info!("listening on http://{}", config.site_addr);
    let listener = tokio::net::TcpListener::bind(&config.site_addr)
        .await
        .expect("failed to bind the tcp address");
    axum::serve(listener, app.into_make_service())
        .await
        .expect("failed to serve on the address");
}
