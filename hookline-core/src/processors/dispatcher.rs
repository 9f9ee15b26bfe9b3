//! Dispatcher: the default hook.
//!
//! Looks up the registrations matching a routed event, posts the payload to
//! every endpoint concurrently and writes all outcomes back in one batch.
//! Nothing here propagates an error to the caller; failures are logged,
//! handed to the error handler and recorded on the registration.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use hookline_sdk::objects::Signal;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::entities::Registration;
use crate::events::HookContext;
use crate::extensions::HookHandler;
use crate::store::RegistrationStore;

/// Redirect hops followed per call.
const MAX_REDIRECTS: usize = 10;

pub struct Dispatcher {
    store: Arc<dyn RegistrationStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn RegistrationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl HookHandler for Dispatcher {
    async fn handle(&self, ctx: HookContext) {
        let settings = &ctx.settings;
        let type_ref = ctx.record.type_ref();
        let filters = settings.filter.filters(ctx.record.as_ref(), ctx.kind);
        let signals = Signal::members_containing(ctx.kind);

        let registrations = match self
            .store
            .find_matching(type_ref, &signals, &filters)
            .await
        {
            Ok(registrations) => registrations,
            Err(e) => {
                error!(type_ref = %type_ref, error = %e, "Failed to look up webhooks");
                return;
            }
        };
        if registrations.is_empty() {
            debug!(type_ref = %type_ref, kind = %ctx.kind, "No webhooks match event");
            return;
        }

        let registrations = dispatch(registrations, &ctx.data, settings).await;

        if let Err(e) = self.store.batch_update_outcome(&registrations).await {
            error!(
                type_ref = %type_ref,
                count = registrations.len(),
                error = %e,
                "Failed to save webhook outcomes"
            );
        }
    }
}

/// Post `payload` to every registration and record each outcome on it.
///
/// Calls run concurrently on one client created for this invocation.
/// Outcomes are applied as calls complete; the returned registrations carry
/// the updated `last_success`, `last_failure` and `last_response`.
pub async fn dispatch(
    mut registrations: Vec<Registration>,
    payload: &Value,
    settings: &Settings,
) -> Vec<Registration> {
    let client = reqwest::Client::builder()
        .timeout(settings.timeout)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let mut calls = FuturesUnordered::new();
    for (index, registration) in registrations.iter().enumerate() {
        let request = build_request(&client, registration, payload, settings);
        calls.push(async move { (index, send(request).await) });
    }

    let limit = settings.max_response_length;
    while let Some((index, result)) = calls.next().await {
        let Some(registration) = registrations.get_mut(index) else {
            continue;
        };
        let now = OffsetDateTime::now_utc();
        match result {
            Ok((status, body)) if status.is_success() => {
                debug!(name = %registration.name, status = %status, "Webhook delivered");
                registration.record_success(now, &body, limit);
            }
            Ok((status, body)) => {
                warn!(name = %registration.name, status = %status, "Webhook rejected");
                registration.record_failure(now, Some(&body), limit);
                settings.error_handler.handle(registration, None);
            }
            Err(e) => {
                error!(name = %registration.name, error = %e, "Webhook request failed");
                registration.record_failure(now, None, limit);
                settings.error_handler.handle(registration, Some(&e));
            }
        }
    }

    info!(count = registrations.len(), "Webhook dispatch finished");
    registrations
}

fn build_request(
    client: &reqwest::Client,
    registration: &Registration,
    payload: &Value,
    settings: &Settings,
) -> reqwest::RequestBuilder {
    let params = settings.client_params.build(registration);
    let mut request = client.post(&registration.endpoint);
    if !params.query.is_empty() {
        request = request.query(&params.query);
    }
    if let Some(timeout) = params.timeout {
        request = request.timeout(timeout);
    }
    for (name, value) in registration.outbound_headers(params.headers) {
        request = request.header(name, value);
    }
    request.json(params.json.as_ref().unwrap_or(payload))
}

async fn send(request: reqwest::RequestBuilder) -> Result<(StatusCode, String), reqwest::Error> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}
