//! HTTP Handlers

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Query, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
};
use serde::Serialize;
use serde_json::Value;
use vt_market::{MarketSnapshot, MarketSource};
use vt_payments::{PaymentMethod, PaymentRequest, PaymentResponse, WebhookReply};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Gateways whose credentials are present
    pub gateways: Vec<PaymentMethod>,
    pub stripe_webhook: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ReplyResponse = (StatusCode, Json<Value>);

fn into_response(reply: WebhookReply) -> ReplyResponse {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateways: state.dispatcher.configured_methods(),
        stripe_webhook: state.stripe.is_enabled(),
    })
}

/// Start a premium checkout
///
/// Outcomes are carried by `success`; only an unreadable body is a 400.
pub async fn create_checkout(
    State(state): State<AppState>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> (StatusCode, Json<PaymentResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Unreadable checkout request");
            return (
                StatusCode::BAD_REQUEST,
                Json(PaymentResponse::failure(
                    "Solicitud inválida: datos de pago incompletos",
                    None,
                )),
            );
        }
    };

    let response = state.dispatcher.create_payment_checkout(request).await;
    (StatusCode::OK, Json(response))
}

/// ePayco confirmation (form or JSON body)
pub async fn epayco_webhook_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ReplyResponse {
    let Some(fields) = confirmation_fields(&headers, &body) else {
        tracing::warn!("Unreadable ePayco confirmation body");
        return into_response(WebhookReply::bad_request("Invalid payload"));
    };

    into_response(state.epayco.handle_confirmation(&fields).await)
}

/// ePayco GET notification; acknowledged, never settled
pub async fn epayco_webhook_get(
    State(state): State<AppState>,
    Query(fields): Query<HashMap<String, String>>,
) -> ReplyResponse {
    into_response(state.epayco.acknowledge_query(&fields))
}

/// Stripe webhook handler
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> ReplyResponse {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok());

    into_response(state.stripe.handle(&body, signature).await)
}

/// Normalized market snapshot
pub async fn market_snapshot(
    State(state): State<AppState>,
) -> Result<Json<MarketSnapshot>, (StatusCode, Json<ErrorResponse>)> {
    let snapshot = state.market.snapshot().await.map_err(|e| {
        tracing::error!(source = state.market.name(), error = %e, "Market data unavailable");
        (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: e.user_message(),
                code: e.code().into(),
            }),
        )
    })?;

    Ok(Json(snapshot))
}

/// Flatten a confirmation body into string fields
fn confirmation_fields(headers: &HeaderMap, body: &str) -> Option<HashMap<String, String>> {
    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if !is_json {
        return Some(url::form_urlencoded::parse(body.as_bytes()).into_owned().collect());
    }

    let object: serde_json::Map<String, Value> = serde_json::from_str(body).ok()?;
    Some(
        object
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Null => None,
                Value::String(s) => Some((key, s)),
                other => Some((key, other.to_string())),
            })
            .collect(),
    )
}
