use axum::{Router, routing::get};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::welcome))
        .route("/api/leagues", get(handlers::get_leagues))
        .route("/api/projections", get(handlers::get_projections))
        .route(
            "/api/projections/:league_id",
            get(handlers::get_league_projections),
        )
        .with_state(state)
}
