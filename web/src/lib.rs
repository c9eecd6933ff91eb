//! HTTP surface for the conference backend.
//!
//! Handlers are thin: they extract the caller and the wire form, call one
//! [`ConferenceService`](conference_runtime::ConferenceService) operation
//! and map its [`ConferenceError`](conference_core::error::ConferenceError)
//! to a status code through [`AppError`].
//!
//! # Request Flow
//!
//! 1. [`middleware::correlation_id`] opens the request span
//! 2. [`extractors::Caller`] resolves the gateway identity headers
//! 3. The handler calls the service
//! 4. The result becomes JSON, or an [`AppError`] body `{code, message}`
//!
//! # Example
//!
//! ```ignore
//! let config = Config::from_env()?;
//! let store = bootstrap::connect_store(&config).await?;
//! let (service, notifications) = bootstrap::build_service(store, &config);
//!
//! let app = conference_web::router(AppState::new(service));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::AppError;
pub use middleware::{CORRELATION_ID_HEADER, CorrelationId};
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Prefix every conference operation is mounted under.
pub const API_PREFIX: &str = "/api/conference/v1";

/// Conference API routes, relative to [`API_PREFIX`].
///
/// # Routes
///
/// - `POST /conference`, `PUT|GET /conference/:key`
/// - `POST|DELETE /conference/:key/registration`
/// - `POST /getConferencesCreated`, `GET /conferences/attending`
/// - `POST /queryConferences`, `GET /conference/announcement/get`
/// - `POST /session`, `GET /session/:speaker`, `GET /queryType`,
///   `GET /sessionQuery`, `GET /sessionProblemQuery`, `GET /featuredSpeaker`
/// - `POST /wishlist`, `GET /wishlistQuery`, `GET /wishlistTypeQuery`,
///   `GET /wishlistSpeakerQuery`
/// - `GET|POST /profile`
pub fn api_router() -> Router<AppState> {
    use handlers::{conferences, profiles, sessions, wishlist};

    Router::new()
        .route("/conference", post(conferences::create_conference))
        .route(
            "/conference/:websafe_key",
            get(conferences::get_conference).put(conferences::update_conference),
        )
        .route(
            "/conference/:websafe_key/registration",
            post(conferences::register_for_conference)
                .delete(conferences::unregister_from_conference),
        )
        .route(
            "/conference/announcement/get",
            get(conferences::get_announcement),
        )
        .route(
            "/getConferencesCreated",
            post(conferences::get_conferences_created),
        )
        .route(
            "/conferences/attending",
            get(conferences::get_conferences_to_attend),
        )
        .route("/queryConferences", post(conferences::query_conferences))
        .route("/session", post(sessions::create_session))
        .route("/session/:speaker", get(sessions::get_sessions_by_speaker))
        .route("/queryType", get(sessions::get_conference_sessions_by_type))
        .route("/sessionQuery", get(sessions::get_conference_sessions))
        .route("/sessionProblemQuery", get(sessions::problematic_query))
        .route("/featuredSpeaker", get(sessions::get_featured_speaker))
        .route("/wishlist", post(wishlist::add_session_to_wishlist))
        .route("/wishlistQuery", get(wishlist::get_sessions_in_wishlist))
        .route("/wishlistTypeQuery", get(wishlist::return_wishlist_type))
        .route(
            "/wishlistSpeakerQuery",
            get(wishlist::return_wishlist_speaker),
        )
        .route(
            "/profile",
            get(profiles::get_profile).post(profiles::save_profile),
        )
}

/// The complete application: API, health checks and request middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(API_PREFIX, api_router())
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::correlation_id))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
