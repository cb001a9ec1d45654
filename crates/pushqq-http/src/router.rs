use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{handlers, AppState};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/api/msg", post(handlers::post_msg))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
