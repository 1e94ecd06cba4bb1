// routes.rs
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use http::{
    header::{
        CONTENT_SECURITY_POLICY, CONTENT_TYPE, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
        X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
    },
    HeaderName, HeaderValue, Method,
};
use tower_http::{
    cors::CorsLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::{
    handlers::{self, VOTER_HEADER},
    state::AppState,
};

const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Sent on every response, errors included.
pub const SECURITY_HEADERS: [(HeaderName, &str); 7] = [
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (X_FRAME_OPTIONS, "DENY"),
    (X_XSS_PROTECTION, "1; mode=block"),
    (STRICT_TRANSPORT_SECURITY, "max-age=31536000; includeSubDomains; preload"),
    (
        CONTENT_SECURITY_POLICY,
        "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline';",
    ),
    (REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (PERMISSIONS_POLICY, "geolocation=(), microphone=(), camera=()"),
];

pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, VOTER_HEADER])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/polls", get(handlers::list_polls).post(handlers::create_poll))
        .route("/polls/{poll_id}", get(handlers::get_poll))
        .route("/polls/{poll_id}/results", get(handlers::get_results))
        .route("/polls/{poll_id}/votes", post(handlers::vote));

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    for (name, value) in SECURITY_HEADERS {
        router = router.layer(SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value)));
    }

    router.with_state(state)
}
