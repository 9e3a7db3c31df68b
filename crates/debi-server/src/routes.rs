//! Router

use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{
    checkout_callback, create_payment, create_subscription, debi_webhook, health_check, index,
};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        // debi
        .route("/debi/payment", get(create_payment))
        .route("/debi/subscription", get(create_subscription))
        .route("/debi/callback", get(checkout_callback))
        .route("/debi/webhooks", post(debi_webhook))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
