use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::routes::{
    analogies, health, hypothesis, predictions, prices, sentiment, subscribers,
};
use crate::state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::<AppState>::new()
        .nest("/health", health::router())
        .nest("/api/predictions", predictions::router())
        .nest("/api/prices", prices::router())
        .nest("/api/sentiment", sentiment::router())
        .nest("/api/analogies", analogies::router())
        .nest("/api/hypothesis", hypothesis::router())
        .nest("/api/subscribers", subscribers::router())
        .layer(cors)
        .with_state(state)
}
