//! Registration management handlers.

use axum::extract::{Path, State};
use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use hookline_core::entities::NewRegistration;
use hookline_core::validation::validate_registration;
use hookline_sdk::objects::{RegistrationRequest, RegistrationResponse};

use crate::api::ApiError;
use crate::state::AppState;

/// Build the registration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks", get(list_webhooks).post(create_webhook))
        .route(
            "/webhooks/{id}",
            get(get_webhook).put(update_webhook).delete(delete_webhook),
        )
}

async fn list_webhooks(
    State(state): State<AppState>,
) -> Result<Json<Vec<RegistrationResponse>>, ApiError> {
    let hide_token = state.settings().await.hide_token;
    let registrations = state.store.list().await?;
    Ok(Json(
        registrations
            .iter()
            .map(|registration| registration.to_response(hide_token))
            .collect(),
    ))
}

async fn get_webhook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let hide_token = state.settings().await.hide_token;
    let registration = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(registration.to_response(hide_token)))
}

/// `POST /webhooks`: validate and store a new registration.
async fn create_webhook(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let settings = state.settings().await;
    let new = NewRegistration::from(request);
    validate_registration(&new, None, &settings, state.store.as_ref()).await?;

    let registration = state.store.insert(new).await?;
    tracing::info!(id = registration.id, name = %registration.name, "Webhook registered");
    Ok((
        StatusCode::CREATED,
        Json(registration.to_response(settings.hide_token)),
    ))
}

/// `PUT /webhooks/{id}`: replace the writable fields of a registration.
///
/// With hidden tokens, a blank or masked token keeps the stored one.
async fn update_webhook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RegistrationRequest>,
) -> Result<Json<RegistrationResponse>, ApiError> {
    let settings = state.settings().await;
    let stored = state.store.get(id).await?.ok_or(ApiError::NotFound)?;
    let mut new = NewRegistration::from(request);
    new.keep_hidden_token(&stored, settings.hide_token);
    validate_registration(&new, Some(id), &settings, state.store.as_ref()).await?;

    let registration = state.store.update(id, new).await?;
    tracing::info!(id, name = %registration.name, "Webhook updated");
    Ok(Json(registration.to_response(settings.hide_token)))
}

async fn delete_webhook(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete(id).await? {
        tracing::info!(id, "Webhook deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}
