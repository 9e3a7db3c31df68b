//! Server Configuration

use std::io::{BufRead, IsTerminal, Write};

use debi_client::DebiConfig;

/// Default listen address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

/// Settings read from the environment (and `.env`)
#[derive(Clone, Debug, Default)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// API client settings (`DEBI_API_KEY`, `DEBI_SANDBOX`, ...)
    pub debi: DebiConfig,

    /// `DEBI_API_WEBHOOK_SECRET`; webhooks are rejected without it
    pub webhook_secret: Option<String>,

    /// Customer used when a route is called without `customer_id`
    pub default_customer_id: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into()),
            debi: DebiConfig::from_env(),
            webhook_secret: non_empty_var("DEBI_API_WEBHOOK_SECRET"),
            default_customer_id: non_empty_var("DEBI_CUSTOMER_ID"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Ask for a test customer on an interactive terminal.
///
/// Returns `None` when stdin is not a TTY, on EOF, or on an empty answer.
pub fn prompt_customer_id() -> Option<String> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return None;
    }

    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "DEBI_CUSTOMER_ID (customer_id for testing): ");
    let _ = stderr.flush();

    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()).filter(|c| !c.is_empty()),
    }
}
