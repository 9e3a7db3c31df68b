//! API Abstraction
//!
//! `DebiApi` is the seam between callers (web routes, batch jobs) and the
//! HTTP client, so loops can be driven by a scripted implementation in tests.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::DebiClient;
use crate::error::Result;

/// A one-off charge against a customer's payment method
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub customer_id: String,

    /// Amount in the account currency's main unit
    pub amount: i64,

    pub description: String,
}

/// A recurring charge. Billing rules are owned by debi.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    pub customer_id: String,
    pub amount: i64,

    /// Number of repetitions
    pub count: i64,

    /// e.g. `monthly`
    pub interval_unit: String,

    pub description: String,
    pub day_of_month: i64,
}

/// debi REST operations (Strategy pattern)
#[async_trait]
pub trait DebiApi: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value>;

    async fn put(&self, path: &str, body: &Value) -> Result<Value>;

    /// `POST /v1/payments`
    async fn create_payment(&self, payment: &NewPayment) -> Result<Value> {
        self.post("/v1/payments", &serde_json::to_value(payment)?)
            .await
    }

    /// `POST /v1/subscriptions`
    async fn create_subscription(&self, subscription: &NewSubscription) -> Result<Value> {
        self.post("/v1/subscriptions", &serde_json::to_value(subscription)?)
            .await
    }

    /// Checkout session, as returned to the success callback
    async fn get_session(&self, session_id: &str) -> Result<Value> {
        self.get(&format!("/v1/sessions/{session_id}")).await
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Value> {
        self.get(&format!("/v1/payments/{payment_id}")).await
    }

    /// `PUT /v1/payments/{id}` with a partial update
    async fn update_payment(&self, payment_id: &str, changes: &Value) -> Result<Value> {
        self.put(&format!("/v1/payments/{payment_id}"), changes)
            .await
    }

    /// Trigger the retry action on a failed payment
    async fn retry_payment(&self, payment_id: &str) -> Result<Value> {
        self.post(&format!("/v1/payments/{payment_id}/actions/retry"), &json!({}))
            .await
    }

    /// Current `data.status` of a payment, `"unknown"` when absent
    async fn payment_status(&self, payment_id: &str) -> Result<String> {
        let payment = self.get_payment(payment_id).await?;
        Ok(payment_status_of(&payment))
    }
}

/// Extract `data.status` from a payment envelope.
pub fn payment_status_of(payment: &Value) -> String {
    payment
        .pointer("/data/status")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// The resource a checkout session created (`data.resource`), or `null`.
pub fn created_resource(session: &Value) -> Value {
    session
        .pointer("/data/resource")
        .cloned()
        .unwrap_or(Value::Null)
}

#[async_trait]
impl DebiApi for DebiClient {
    async fn get(&self, path: &str) -> Result<Value> {
        self.request::<Value>(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body)).await
    }
}
