pub mod chat;
pub mod response;
pub mod state;

pub use response::ApiResponse;

use axum::{
    Json, Router,
    http::{Method, header},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use state::AppState;

#[derive(Serialize)]
struct Health {
    status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Build the router with all relay routes
pub fn router(state: AppState) -> Router {
    // Browser callers post from other origins
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat::chat))
        .route("/api/chat", post(chat::chat))
        .layer(cors)
        .with_state(state)
}
