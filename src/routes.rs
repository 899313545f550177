// src/routes.rs

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::MAX_TEMPLATE_BYTES,
    handlers::{analytics, maintenance, report, settings, templates},
    state::AppState,
    utils::api_key::{API_KEY_HEADER, api_key_middleware},
};

/// Assembles the main application router.
///
/// * Analytics, report, template and AI settings routes under `/api`.
/// * The maintenance cleanup behind the shared-secret check.
/// * Global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
        ])
        .allow_credentials(true);

    let analytics_routes = Router::new()
        .route("/invalidate-by-result", post(analytics::invalidate_by_result))
        .route("/{test_id}", get(analytics::get_analysis))
        .route("/{test_id}/recalculate", post(analytics::recalculate))
        .route("/{test_id}/cache", delete(analytics::invalidate_cache))
        .route(
            "/{test_id}/generate-analysis",
            post(analytics::generate_analysis),
        );

    let template_routes = Router::new()
        .route("/", get(templates::list_templates))
        .route(
            "/{name}",
            put(templates::upload_template)
                .delete(templates::delete_template)
                .layer(DefaultBodyLimit::max(MAX_TEMPLATE_BYTES)),
        )
        .route("/{name}/variables", get(templates::get_template_variables));

    let maintenance_routes = Router::new()
        .route("/api/cleanup", post(maintenance::cleanup))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ));

    Router::new()
        .route("/health", get(maintenance::health))
        .route("/api/generate-report", post(report::generate_report))
        .route(
            "/api/ai-settings",
            get(settings::get_ai_settings).post(settings::update_ai_settings),
        )
        .nest("/api/analytics", analytics_routes)
        .nest("/api/templates", template_routes)
        .merge(maintenance_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
