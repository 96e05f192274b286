//! Thin per-module wrappers, one method per BiDi command in scope. Each
//! method forwards to `Transport::send` and deserializes the bits of
//! `result` it cares about; the rest of the envelope is discarded.

use std::sync::Arc;

use browsecraft_core::JsonMap;
use browsecraft_transport::Transport;
use serde_json::{json, Value};

use crate::error::SessionError;

fn as_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

/// `browsingContext.*`
#[derive(Clone)]
pub struct BrowsingContext {
    transport: Arc<Transport>,
}

impl BrowsingContext {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Returns the new context id.
    pub async fn create(&self, context_type: &str) -> Result<String, SessionError> {
        let result = self
            .transport
            .send("browsingContext.create", as_map(json!({"type": context_type})))
            .await?;
        Ok(result
            .get("context")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub async fn navigate(&self, context: &str, url: &str) -> Result<(), SessionError> {
        self.transport
            .send(
                "browsingContext.navigate",
                as_map(json!({"context": context, "url": url})),
            )
            .await?;
        Ok(())
    }

    /// Returns the ids of every top-level context known to the session.
    pub async fn get_tree(&self) -> Result<Vec<String>, SessionError> {
        let result = self
            .transport
            .send("browsingContext.getTree", JsonMap::new())
            .await?;
        let contexts = result
            .get("contexts")
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| row.get("context").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(contexts)
    }

    pub async fn close(&self, context: &str) -> Result<(), SessionError> {
        self.transport
            .send("browsingContext.close", as_map(json!({"context": context})))
            .await?;
        Ok(())
    }
}

/// `script.*`
#[derive(Clone)]
pub struct Script {
    transport: Arc<Transport>,
}

impl Script {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub async fn evaluate(
        &self,
        expression: &str,
        target_context: &str,
        await_promise: bool,
    ) -> Result<Value, SessionError> {
        let result = self
            .transport
            .send(
                "script.evaluate",
                as_map(json!({
                    "expression": expression,
                    "target": {"context": target_context},
                    "awaitPromise": await_promise,
                })),
            )
            .await?;
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn call_function(
        &self,
        function_declaration: &str,
        target_context: &str,
        arguments: Vec<Value>,
        await_promise: bool,
    ) -> Result<Value, SessionError> {
        let result = self
            .transport
            .send(
                "script.callFunction",
                as_map(json!({
                    "functionDeclaration": function_declaration,
                    "target": {"context": target_context},
                    "arguments": arguments,
                    "awaitPromise": await_promise,
                })),
            )
            .await?;
        Ok(result.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// `network.*` intercept/continue operations.
#[derive(Clone)]
pub struct Network {
    transport: Arc<Transport>,
}

impl Network {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Returns the new intercept id.
    pub async fn add_intercept(&self, phases: Vec<String>, url_patterns: Vec<String>) -> Result<String, SessionError> {
        let result = self
            .transport
            .send(
                "network.addIntercept",
                as_map(json!({"phases": phases, "urlPatterns": url_patterns})),
            )
            .await?;
        Ok(result
            .get("intercept")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub async fn remove_intercept(&self, intercept: &str) -> Result<(), SessionError> {
        self.transport
            .send("network.removeIntercept", as_map(json!({"intercept": intercept})))
            .await?;
        Ok(())
    }

    pub async fn continue_request(&self, request: &str) -> Result<(), SessionError> {
        self.transport
            .send("network.continueRequest", as_map(json!({"request": request})))
            .await?;
        Ok(())
    }
}

/// `input.*`
#[derive(Clone)]
pub struct Input {
    transport: Arc<Transport>,
}

impl Input {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub async fn perform_actions(&self, context: &str, actions: Vec<Value>) -> Result<(), SessionError> {
        self.transport
            .send(
                "input.performActions",
                as_map(json!({"context": context, "actions": actions})),
            )
            .await?;
        Ok(())
    }
}

/// `storage.*`
#[derive(Clone)]
pub struct Storage {
    transport: Arc<Transport>,
}

impl Storage {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub async fn get_cookies(&self, filter: Option<Value>) -> Result<Vec<Value>, SessionError> {
        let mut params = JsonMap::new();
        if let Some(filter) = filter {
            params.insert("filter".to_string(), filter);
        }
        let result = self.transport.send("storage.getCookies", params).await?;
        Ok(result
            .get("cookies")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    pub async fn set_cookie(&self, cookie: Value) -> Result<(), SessionError> {
        self.transport
            .send("storage.setCookie", as_map(json!({"cookie": cookie})))
            .await?;
        Ok(())
    }
}
