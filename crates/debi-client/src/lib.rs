//! # debi-client
//!
//! Client for the [debi](https://debi.pro/docs) payments API.
//!
//! ## Checkout flow
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Your Site  │────▶│  debi Hosted    │────▶│  Your Site  │
//! │  (payment)  │     │  Checkout Page  │     │  (callback) │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!                              │
//!                              ▼  signed POST
//!                      ┌─────────────────┐
//!                      │   /webhooks     │
//!                      └─────────────────┘
//! ```
//!
//! - [`DebiClient`] sends authenticated JSON requests (`get`, `post`, `put`)
//!   and turns non-2xx answers into [`DebiError::RequestFailed`].
//! - [`DebiApi`] is the trait seam over the client, with typed helpers for
//!   payments, subscriptions and checkout sessions.
//! - [`WebhookVerifier`] checks the `debi-Timestamp` / `debi-Signature`
//!   headers before handing back a [`WebhookEvent`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use debi_client::{DebiApi, DebiClient, NewPayment};
//!
//! let client = DebiClient::new("sk_test_xxx")?;
//!
//! let payment = client.create_payment(&NewPayment {
//!     customer_id: "CS123".into(),
//!     amount: 123,
//!     description: "test123".into(),
//! }).await?;
//! ```

mod api;
mod client;
mod error;
mod webhook;

pub use api::{DebiApi, NewPayment, NewSubscription, created_resource, payment_status_of};
pub use client::{DebiClient, DebiConfig, LIVE_URL, SANDBOX_URL, env_flag, parse_flag};
pub use error::{DebiError, Result};
pub use webhook::{
    DEFAULT_TOLERANCE_SECS, SIGNATURE_HEADER, TIMESTAMP_HEADER, WebhookEvent, WebhookVerifier,
    sign,
};
