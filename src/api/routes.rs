use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::{authenticate, identify, require_admin};
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Public routes -- credentials or refresh cookie checked by the handler
    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh-token", post(handlers::refresh_token))
        .route("/health", get(handlers::health));

    // Logout works with or without a usable access token
    let logout_routes = Router::new()
        .route("/api/auth/logout", post(handlers::logout))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), identify));

    // Admin routes -- role check runs inside authentication
    let admin_routes = Router::new()
        .route("/api/auth/users", get(handlers::list_users))
        .route("/api/auth/users/:id", put(handlers::update_user))
        .route("/api/orders/:id/verify", put(handlers::verify_order))
        .route_layer(middleware::from_fn(require_admin));

    // Authenticated routes -- ownership checks happen in the workflow
    let authenticated_routes = Router::new()
        .route("/api/auth/me", get(handlers::me))
        .route(
            "/api/orders",
            post(handlers::create_order)
                .merge(get(handlers::list_orders).route_layer(middleware::from_fn(require_admin))),
        )
        .route("/api/orders/user/:user_id", get(handlers::list_user_orders))
        .route(
            "/api/orders/:id/payment-proof",
            put(handlers::attach_payment_proof),
        )
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            authenticate,
        ));

    Router::new()
        .merge(public_routes)
        .merge(logout_routes)
        .merge(authenticated_routes)
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the configured frontend origin
fn cors_layer(state: &AppState) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS]);

    match state.config.http.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => layer = layer.allow_origin(origin),
        Err(e) => tracing::warn!(error = %e, "Ignoring invalid CORS origin"),
    }
    layer
}
