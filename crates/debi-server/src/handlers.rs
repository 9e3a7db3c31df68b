//! HTTP Handlers

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use debi_client::{
    DebiApi, DebiError, NewPayment, NewSubscription, SIGNATURE_HEADER, TIMESTAMP_HEADER,
    created_resource,
};

use crate::state::AppState;

const INTRO: &str = r"
This demo shows how to take payments and subscriptions through debi.
Documentation: https://debi.pro/docs

Get an access token at https://debi-test.pro/dashboard/developers and export it:
export DEBI_API_KEY=........

To receive webhook notifications, register a webhook URL on the same page and
export its signing secret:
export DEBI_API_WEBHOOK_SECRET=....

Sandbox test card:
mastercard
5447651834106668

Routes
/debi/payment
/debi/subscription

Successful checkouts redirect to
/debi/callback

Webhook notifications
/debi/webhooks (POST)
";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub api_key_configured: bool,
    pub webhook_secret_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

#[derive(Debug, Default, Deserialize)]
pub struct PaymentQuery {
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionQuery {
    pub customer_id: Option<String>,
    pub description: Option<String>,
    pub amount: Option<String>,
    pub count: Option<String>,
    pub interval_unit: Option<String>,
    pub day_of_month: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub session_id: Option<String>,
    pub course_id: Option<String>,
}

// ============================================================================
// Helpers
// ============================================================================

fn bad_request(error: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: error.into(),
            hint: None,
        }),
    )
}

fn missing_env(var: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: format!("Missing {var} environment variable."),
            hint: Some(format!("export {var}=....")),
        }),
    )
}

fn upstream_error(err: &DebiError) -> ApiError {
    tracing::warn!(error = %err, "debi request failed");
    bad_request(err.to_string())
}

fn require_api(state: &AppState) -> Result<Arc<dyn DebiApi>, ApiError> {
    state
        .debi
        .clone()
        .ok_or_else(|| missing_env("DEBI_API_KEY"))
}

/// Query value, with empty strings treated as absent
fn param(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn param_or(value: Option<String>, default: &str) -> String {
    param(value).unwrap_or_else(|| default.to_string())
}

fn customer_id(state: &AppState, value: Option<String>) -> Result<String, ApiError> {
    param(value)
        .or_else(|| state.default_customer_id.clone())
        .ok_or_else(|| {
            bad_request("customer_id required. Set DEBI_CUSTOMER_ID or pass it as a query parameter.")
        })
}

// ============================================================================
// Handlers
// ============================================================================

/// Landing page with setup instructions
pub async fn index() -> Html<String> {
    Html(format!("<pre>{INTRO}</pre>"))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        api_key_configured: state.debi.is_some(),
        webhook_secret_configured: state.webhook.is_some(),
    })
}

/// One-off payment (`POST /v1/payments`)
pub async fn create_payment(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> Result<Json<Value>, ApiError> {
    let debi = require_api(&state)?;
    let customer_id = customer_id(&state, query.customer_id)?;

    let amount = param_or(query.amount, "123")
        .parse::<i64>()
        .map_err(|_| bad_request("amount must be an integer"))?;

    let payment = NewPayment {
        customer_id,
        amount,
        description: param_or(query.description, "test123"),
    };

    tracing::info!(customer_id = %payment.customer_id, amount, "Creating payment");

    let response = debi
        .create_payment(&payment)
        .await
        .map_err(|e| upstream_error(&e))?;

    Ok(Json(response))
}

/// Recurring subscription (`POST /v1/subscriptions`)
pub async fn create_subscription(
    State(state): State<AppState>,
    Query(query): Query<SubscriptionQuery>,
) -> Result<Json<Value>, ApiError> {
    let debi = require_api(&state)?;
    let customer_id = customer_id(&state, query.customer_id)?;

    let integers = (
        param_or(query.amount, "125").parse::<i64>(),
        param_or(query.count, "12").parse::<i64>(),
        param_or(query.day_of_month, "1").parse::<i64>(),
    );
    let (Ok(amount), Ok(count), Ok(day_of_month)) = integers else {
        return Err(bad_request(
            "amount, count and day_of_month must be integers",
        ));
    };

    let subscription = NewSubscription {
        customer_id,
        amount,
        count,
        interval_unit: param_or(query.interval_unit, "monthly"),
        description: param_or(query.description, "Curso"),
        day_of_month,
    };

    tracing::info!(
        customer_id = %subscription.customer_id,
        amount,
        count,
        interval_unit = %subscription.interval_unit,
        "Creating subscription"
    );

    let response = debi
        .create_subscription(&subscription)
        .await
        .map_err(|e| upstream_error(&e))?;

    Ok(Json(response))
}

/// Successful checkout redirect: returns the resource the session created
pub async fn checkout_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<Value>, ApiError> {
    let debi = require_api(&state)?;
    let session_id = param(query.session_id).ok_or_else(|| bad_request("session_id required"))?;

    tracing::info!(
        session_id = %session_id,
        course_id = ?query.course_id,
        "Checkout callback"
    );

    let session = debi
        .get_session(&session_id)
        .await
        .map_err(|e| upstream_error(&e))?;

    Ok(Json(created_resource(&session)))
}

/// debi webhook receiver
pub async fn debi_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(verifier) = state.webhook.as_ref() else {
        return missing_env("DEBI_API_WEBHOOK_SECRET").into_response();
    };

    let Ok(body) = std::str::from_utf8(&body) else {
        tracing::warn!(len = body.len(), "Webhook body is not UTF-8");
        return (StatusCode::BAD_REQUEST, "Bad payload").into_response();
    };

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    match verifier.construct_event(body, header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER)) {
        Ok(event) => {
            tracing::info!(
                event_id = ?event.id,
                event_type = %event.event_type,
                resource_id = ?event.resource_id(),
                "Received debi webhook"
            );
            tracing::debug!(data = %event.data, "Webhook event data");
            StatusCode::OK.into_response()
        }
        Err(DebiError::WebhookPayload(e)) => {
            tracing::warn!(error = %e, "Error while decoding event");
            (StatusCode::BAD_REQUEST, "Bad payload").into_response()
        }
        Err(DebiError::WebhookSignature(e)) => {
            tracing::warn!(error = %e, "Invalid webhook signature");
            (StatusCode::BAD_REQUEST, "Bad signature").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook processing error");
            (StatusCode::INTERNAL_SERVER_ERROR, e.user_message().to_string()).into_response()
        }
    }
}
