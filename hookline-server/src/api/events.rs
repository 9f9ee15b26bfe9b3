//! Lifecycle event ingestion.

use axum::extract::State;
use axum::{Json, Router, http::StatusCode, routing::post};
use hookline_core::events::LifecycleEvent;
use hookline_core::processors::RouteOutcome;
use hookline_core::record::DynamicRecord;
use hookline_sdk::objects::{LifecycleEventRequest, RecordAction, RouteResponse};
use kanau::processor::Processor;
use std::sync::Arc;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(ingest_event))
}

/// `POST /events`: route one record event.
///
/// Routing finishes before the response is sent; with the background
/// scheduler the outbound calls may still be in flight.
async fn ingest_event(
    State(state): State<AppState>,
    Json(request): Json<LifecycleEventRequest>,
) -> (StatusCode, Json<RouteResponse>) {
    let action = request.action;
    let mut record = DynamicRecord::from_request(request);
    if action == RecordAction::Deleted {
        record = record.mark_deleted();
    }

    let outcome = match LifecycleEvent::from_action(Arc::new(record), action) {
        Some(event) => {
            let Ok(outcome) = state.router.process(event).await;
            outcome
        }
        None => RouteOutcome::Dropped,
    };
    (StatusCode::ACCEPTED, Json(outcome.into()))
}
