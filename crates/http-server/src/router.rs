use crate::api;
use crate::core::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Inbound emails with inline images can be large.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let users = Router::new()
        .route("/register", post(api::users::register_handler))
        .route("/login", post(api::users::login_handler))
        .route("/", get(api::users::list_users_handler))
        .route(
            "/:id",
            get(api::users::get_user_handler)
                .put(api::users::update_user_handler)
                .delete(api::users::delete_user_handler),
        );

    let emails = Router::new()
        .route("/mailgun", post(api::webhook::mailgun_webhook_handler))
        .route(
            "/generate-temporal",
            post(api::email::generate_temporary_handler),
        )
        .route(
            "/generate-permanent",
            post(api::email::generate_permanent_handler),
        )
        .route("/inbox", get(api::email::inbox_handler))
        .route("/e/delete-email", delete(api::email::delete_message_handler))
        .route("/a/delete-address", delete(api::email::delete_mailbox_handler))
        .route("/expiration", get(api::email::expiration_handler))
        .route(
            "/messages/:id/render",
            get(api::email::render_message_handler),
        )
        .route(
            "/messages/:id/source",
            get(api::email::message_source_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/users", users)
        .nest("/api/emails", emails)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
