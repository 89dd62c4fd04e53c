//! The `/api/v1` router (spec.md §6): CORS, per-handler rate limiting, and
//! every read/write endpoint wired to its handler.

use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{BoxError, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tr_core::TrError;

use crate::{handlers, query, rate_limit, sse, state::ServerState};

async fn handle_timeout_error(error: BoxError) -> TrError {
    if error.is::<tower::timeout::error::Elapsed>() {
        TrError::Timeout
    } else {
        TrError::Other(anyhow::anyhow!(error))
    }
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    broker_connected: bool,
}

async fn health(State(state): State<ServerState>) -> Json<HealthBody> {
    Json(HealthBody { status: "ok", broker_connected: state.broker.is_healthy() })
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(tower_http::cors::Any)
    }
}

pub fn build_router(state: ServerState) -> Router {
    let governor = rate_limit::layer(&state.file_config.rate_limit);
    let cors = cors_layer(&state.file_config.server.allowed_origins);
    let read_timeout = Duration::from_secs(state.file_config.server.read_timeout_secs);

    let api = Router::new()
        .route("/systems", get(handlers::systems::list))
        .route("/systems/{system_id}", get(handlers::systems::get))
        .route("/systems/merge", post(handlers::systems::merge))
        .route("/systems/{system_id}/sites", get(handlers::sites::list_for_system))
        .route("/systems/{system_id}/talkgroups", get(handlers::talkgroups::list_for_system))
        .route("/systems/{system_id}/talkgroups/{tgid}", get(handlers::talkgroups::get_scoped))
        .route("/talkgroups/{tgid}", get(handlers::talkgroups::get_unscoped))
        .route("/systems/{system_id}/units", get(handlers::units::list_for_system))
        .route("/systems/{system_id}/units/{unit_id}", get(handlers::units::get_scoped))
        .route("/systems/{system_id}/units/{unit_id}/events", get(handlers::unit_events::list_for_unit))
        .route("/units/{unit_id}", get(handlers::units::get_unscoped))
        .route("/systems/{system_id}/calls", get(handlers::calls::list_for_system))
        .route("/calls/{call_id}", get(handlers::calls::get))
        .route("/calls/{call_id}/frequencies", get(handlers::calls::list_frequencies))
        .route("/calls/{call_id}/transmissions", get(handlers::calls::list_transmissions))
        .route("/systems/{system_id}/call-groups", get(handlers::call_groups::list_for_system))
        .route("/call-groups/{call_group_id}", get(handlers::call_groups::get))
        .route("/systems/{system_id}/affiliations", get(handlers::affiliations::list_for_system))
        .route("/recorders", get(handlers::recorders::list_latest))
        .route("/recorders/{instance}/history", get(handlers::recorders::history_for_instance))
        .route("/instances/{instance}/decode-rates", get(handlers::decode_rates::list_for_instance))
        .route("/systems/{system_id}/trunking-messages", get(handlers::trunking_messages::list_for_system))
        .route("/console-logs/search", get(handlers::console_logs::search))
        .route("/stats", get(handlers::stats::get))
        .route("/query", post(query::run_query))
        .layer(ServiceBuilder::new().layer(HandleErrorLayer::<_, ()>::new(handle_timeout_error)).layer(TimeoutLayer::new(read_timeout)))
        .route("/events/stream", get(sse::stream))
        .layer(governor);

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
