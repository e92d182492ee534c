use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    modules,
    web::{AppState, status},
};

pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config().upload.static_dir);

    Router::new()
        .route("/api", get(status::server_status))
        .merge(modules::accounts::router())
        .merge(modules::pages::router())
        .merge(modules::character::router())
        .nest_service("/static", static_files)
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
