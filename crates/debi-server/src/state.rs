//! Application State

use std::sync::Arc;

use debi_client::{DebiApi, DebiClient, WebhookVerifier};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// debi API (None if `DEBI_API_KEY` is not set)
    pub debi: Option<Arc<dyn DebiApi>>,

    /// Webhook verifier (None if `DEBI_API_WEBHOOK_SECRET` is not set)
    pub webhook: Option<Arc<WebhookVerifier>>,

    /// Fallback `customer_id` for the payment/subscription routes
    pub default_customer_id: Option<String>,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> debi_client::Result<Self> {
        let debi = if config.debi.api_key.is_empty() {
            None
        } else {
            let client: Arc<dyn DebiApi> = Arc::new(DebiClient::from_config(config.debi.clone())?);
            Some(client)
        };

        Ok(Self {
            debi,
            webhook: config
                .webhook_secret
                .as_deref()
                .map(|secret| Arc::new(WebhookVerifier::new(secret))),
            default_customer_id: config.default_customer_id.clone(),
        })
    }
}
