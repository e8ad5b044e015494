//! Websocket relay pushing published messages to the connections subscribed
//! to their topic

use axum::{
    routing::{get, post},
    Router,
};
use skillshare_api::AuthToken;

mod error;
mod extractors;
mod feeds;
mod handlers;

pub use error::Error;
pub use extractors::AppState;
pub use feeds::Topics;

pub fn app(feeds: Topics, admin_token: Option<AuthToken>) -> Router {
    Router::new()
        .route("/ws", get(handlers::feed))
        .route("/api/publish", post(handlers::publish))
        .route("/api/topics", get(handlers::list_topics))
        .with_state(AppState { feeds, admin_token })
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
