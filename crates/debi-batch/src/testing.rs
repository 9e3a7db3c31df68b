//! Scripted `DebiApi` for driving batch jobs in tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use debi_client::{DebiApi, DebiError, Result};
use serde_json::{Value, json};

type Route = (&'static str, String);

/// Answers `{}` unless a route is scripted to fail, hang or return a body.
#[derive(Default)]
pub struct ScriptedApi {
    failures: HashMap<Route, String>,
    stalls: HashSet<Route>,
    responses: HashMap<Route, Value>,
    calls: Mutex<Vec<(String, String, Value)>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, method: &'static str, path: &str, message: &str) -> Self {
        self.failures
            .insert((method, path.to_string()), message.to_string());
        self
    }

    /// Never answer calls to this route
    pub fn stall(mut self, method: &'static str, path: &str) -> Self {
        self.stalls.insert((method, path.to_string()));
        self
    }

    pub fn respond(mut self, method: &'static str, path: &str, body: Value) -> Self {
        self.responses.insert((method, path.to_string()), body);
        self
    }

    /// `(method, path, body)` in call order
    pub fn calls(&self) -> Vec<(String, String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// `"METHOD path"` strings in call order
    pub fn call_lines(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|(method, path, _)| format!("{method} {path}"))
            .collect()
    }

    async fn call(&self, method: &'static str, path: &str, body: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), path.to_string(), body));

        let route = (method, path.to_string());
        if self.stalls.contains(&route) {
            std::future::pending::<()>().await;
        }
        if let Some(message) = self.failures.get(&route) {
            return Err(DebiError::RequestFailed {
                status: 422,
                message: message.clone(),
            });
        }
        Ok(self.responses.get(&route).cloned().unwrap_or_else(|| json!({})))
    }
}

#[async_trait]
impl DebiApi for ScriptedApi {
    async fn get(&self, path: &str) -> Result<Value> {
        self.call("GET", path, Value::Null).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        self.call("POST", path, body.clone()).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        self.call("PUT", path, body.clone()).await
    }
}
