//! Handler registry — string key to executable task handler.
//!
//! Targets stored on schedules and tasks are opaque keys resolved
//! here. Registration is explicit at process start; there is no
//! reflection or dynamic lookup beyond this map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

/// An executable unit of work the runner can invoke by name.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Registry of task handlers, keyed by handler name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registry with the built-in handlers registered.
pub fn builtin_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(HeartbeatHandler));
    registry.register(Arc::new(SampleHandler));
    registry
}

/// Target of the default schedule; reports a timestamp each firing.
pub struct HeartbeatHandler;

#[async_trait]
impl TaskHandler for HeartbeatHandler {
    fn name(&self) -> &str {
        "heartbeat"
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<Value> {
        let timestamp = Utc::now().to_rfc3339();
        info!("Heartbeat fired at {timestamp}");
        Ok(json!({
            "status": "completed",
            "message": format!("Heartbeat executed at {timestamp}"),
            "timestamp": timestamp,
        }))
    }
}

/// Demo handler: echoes a message after an optional simulated delay.
pub struct SampleHandler;

#[async_trait]
impl TaskHandler for SampleHandler {
    fn name(&self) -> &str {
        "sample"
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("hello")
            .to_string();
        let delay_secs = args.get("delay").and_then(|v| v.as_u64()).unwrap_or(0);

        info!("Sample task started with message: {message}");
        if delay_secs > 0 {
            tokio::time::sleep(tokio::time::Duration::from_secs(delay_secs)).await;
        }

        Ok(json!({
            "status": "completed",
            "message": format!("Processed: {message}"),
            "delay": delay_secs,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_contents() {
        let registry = builtin_registry();
        assert!(registry.contains("heartbeat"));
        assert!(registry.contains("sample"));
        assert!(!registry.contains("tasks.tasks.scheduled_task"));
        assert_eq!(registry.names(), vec!["heartbeat", "sample"]);
    }

    #[tokio::test]
    async fn test_heartbeat_handler() {
        let handler = HeartbeatHandler;
        let result = handler.execute(json!({})).await.unwrap();
        assert_eq!(result["status"], "completed");
        assert!(result["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_sample_handler_echoes_message() {
        let handler = SampleHandler;
        let result = handler.execute(json!({"message": "ping"})).await.unwrap();
        assert_eq!(result["message"], "Processed: ping");
        assert_eq!(result["delay"], 0);
    }
}
