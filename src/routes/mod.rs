//! Router assembly: survey endpoints, optional static front-end, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - survey API under `/survey/...` plus `/health`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
/// - static front-end from `static_dir` with index fallback, when that directory exists
pub fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    let router = Router::new()
        .route("/health", get(http::http_health))
        .route("/survey", get(http::http_list_surveys).post(http::http_post_survey))
        .route(
            "/survey/questions",
            get(http::http_list_question_names).post(http::http_set_question_set),
        )
        .route("/survey/data", get(http::http_get_question_set))
        .route("/survey/answer", post(http::http_post_answer_set))
        .route("/survey/:id", get(http::http_get_survey))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    // Frontend fallback
    match static_dir.filter(|d| d.is_dir()) {
        Some(dir) => {
            info!(target: "survey_backend", dir = %dir.display(), "Serving static front-end");
            let static_service = ServeDir::new(&dir)
                .append_index_html_on_directories(true)
                .not_found_service(ServeFile::new(dir.join("index.html")));
            router.fallback_service(static_service)
        }
        None => router,
    }
}
