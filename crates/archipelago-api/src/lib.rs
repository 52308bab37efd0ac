//! # archipelago-api
//!
//! HTTP surface of archipelago: directories, notes and their sharing, tags,
//! meeting summaries and the advisory tag services.
//!
//! [`router`] builds the routes over an [`AppState`]; [`app`] adds the
//! middleware stack the binary serves.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;

// Always compiled so integration tests in tests/ can use it.
pub mod test_support;

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use handlers::{dirs, health, notes, summaries, tags};

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// All routes, without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        // Directories
        .route("/api/v1/dirs", get(dirs::list_roots).post(dirs::create_dir))
        .route(
            "/api/v1/dirs/:id",
            get(dirs::get_dir)
                .patch(dirs::rename_dir)
                .delete(dirs::delete_dir),
        )
        .route("/api/v1/dirs/:id/tree", get(dirs::get_tree))
        .route("/api/v1/dirs/:id/move", post(dirs::move_dir))
        // Notes
        .route("/api/v1/notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/api/v1/notes/:id",
            get(notes::get_note)
                .patch(notes::update_note)
                .delete(notes::delete_note),
        )
        .route("/api/v1/notes/:id/access", get(notes::list_access))
        .route(
            "/api/v1/notes/:id/access/:user_id",
            get(notes::get_user_access)
                .put(notes::set_user_access)
                .delete(notes::remove_user_access),
        )
        .route("/api/v1/notes/:id/summaries", get(notes::list_summaries))
        .route(
            "/api/v1/notes/:id/summaries/:summary_id",
            put(notes::attach_summary),
        )
        // Note tags
        .route(
            "/api/v1/notes/:id/tags",
            get(tags::list_note_tags).post(tags::add_note_tag),
        )
        .route(
            "/api/v1/notes/:id/tags/:tag_id",
            put(tags::link_note_tag)
                .patch(tags::rename_note_tag)
                .delete(tags::unlink_note_tag),
        )
        // Tags
        .route("/api/v1/tags/suggest", post(tags::suggest_tags))
        .route(
            "/api/v1/tags/:id",
            get(tags::get_tag)
                .patch(tags::update_tag)
                .delete(tags::delete_tag),
        )
        .route("/api/v1/tags/:id/notes", get(tags::list_tag_notes))
        .route(
            "/api/v1/tags/:id/links",
            get(tags::list_linked_tags).post(tags::link_tags),
        )
        .route("/api/v1/tags/:id/links/:other_id", axum::routing::delete(tags::unlink_tags))
        .route("/api/v1/tags/:id/closest", get(tags::closest_tags))
        // Summaries
        .route(
            "/api/v1/summaries",
            get(summaries::list_active).post(summaries::save_summary),
        )
        .route(
            "/api/v1/summaries/:id",
            get(summaries::get_summary).patch(summaries::rename_summary),
        )
        .route("/api/v1/summaries/:id/role", put(summaries::update_text_role))
        .route("/api/v1/summaries/:id/finish", post(summaries::finish_summary))
        .with_state(state)
}

#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn parse_allowed_origins(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}

/// [`router`] with tracing, request ids, the request timeout and CORS.
pub fn app(state: AppState, allowed_origins: &[String], request_timeout: Duration) -> Router {
    router(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins(allowed_origins)))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(Duration::from_secs(3600)),
        )
}
