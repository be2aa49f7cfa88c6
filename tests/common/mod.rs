#![allow(dead_code)]

use async_trait::async_trait;
use grounding::errors::FlowError;
use grounding::services::agents::{AgentMessage, AgentsApi, ConnectionInfo, Deployment, RunInfo};
use grounding::services::arm::{ArmResponse, Management};
use grounding::services::discovery::ResourceLister;
use once_cell::sync::Lazy;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Mutex as AsyncMutex;

pub static ENV_LOCK: Lazy<AsyncMutex<()>> = Lazy::new(|| AsyncMutex::new(()));

/// Sets (or removes) environment variables and restores the previous values
/// on drop. Always hold ENV_LOCK while one of these is alive.
pub struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    pub fn set(pairs: &[(&str, Option<&str>)]) -> Self {
        let mut saved = Vec::new();
        for (name, value) in pairs {
            saved.push((name.to_string(), std::env::var(name).ok()));
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in &self.saved {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub url: String,
    pub body: Option<Value>,
}

/// Scripted management API: responses are enqueued per (method, url) and
/// every request is recorded for ordering/body assertions.
#[derive(Default)]
pub struct FakeManagement {
    responses: Mutex<HashMap<String, Vec<ArmResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeManagement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, method: &str, url: &str, status: u16, body: Value) {
        let raw = body.to_string();
        self.responses
            .lock()
            .expect("responses lock")
            .entry(format!("{} {}", method, url))
            .or_default()
            .push(ArmResponse {
                status,
                body: Some(body),
                raw,
            });
    }

    pub fn enqueue_empty(&self, method: &str, url: &str, status: u16) {
        self.responses
            .lock()
            .expect("responses lock")
            .entry(format!("{} {}", method, url))
            .or_default()
            .push(ArmResponse {
                status,
                body: None,
                raw: String::new(),
            });
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.method).collect()
    }
}

#[async_trait]
impl Management for FakeManagement {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse, FlowError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            method: method.to_string(),
            url: url.to_string(),
            body: body.cloned(),
        });
        let key = format!("{} {}", method, url);
        let mut responses = self.responses.lock().expect("responses lock");
        let queue = responses
            .get_mut(&key)
            .ok_or_else(|| FlowError::internal(format!("no scripted response for {}", key)))?;
        if queue.is_empty() {
            return Err(FlowError::internal(format!(
                "scripted responses exhausted for {}",
                key
            )));
        }
        Ok(queue.remove(0))
    }
}

#[derive(Debug, Clone)]
pub struct CreatedAgent {
    pub model: String,
    pub name: String,
    pub tools: Vec<Value>,
}

/// Canned agent-hosting surface. Collection fields script the responses;
/// the mutexes record what the flow did.
#[derive(Default)]
pub struct FakeAgents {
    pub deployments: Vec<Deployment>,
    pub connections: Vec<ConnectionInfo>,
    pub named: HashMap<String, ConnectionInfo>,
    pub run_status: String,
    pub run_error: Option<Value>,
    pub messages: Vec<AgentMessage>,
    pub delete_fails: bool,
    pub created: Mutex<Vec<CreatedAgent>>,
    pub deleted: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<String>>,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeAgents {
    pub fn new() -> Self {
        Self {
            run_status: "completed".to_string(),
            ..Self::default()
        }
    }

    pub fn connection(id: &str, name: &str, connection_type: &str, target: &str) -> ConnectionInfo {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "type": connection_type,
            "target": target,
        }))
        .expect("connection info")
    }

    pub fn assistant_message(content: Value) -> AgentMessage {
        serde_json::from_value(serde_json::json!({ "role": "assistant", "content": content }))
            .expect("assistant message")
    }

    pub fn created_agents(&self) -> Vec<CreatedAgent> {
        self.created.lock().expect("created lock").clone()
    }

    pub fn deleted_agents(&self) -> Vec<String> {
        self.deleted.lock().expect("deleted lock").clone()
    }
}

#[async_trait]
impl AgentsApi for FakeAgents {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, FlowError> {
        Ok(self.deployments.clone())
    }

    async fn list_connections(&self) -> Result<Vec<ConnectionInfo>, FlowError> {
        Ok(self.connections.clone())
    }

    async fn get_connection(&self, name: &str) -> Result<Option<ConnectionInfo>, FlowError> {
        self.lookups
            .lock()
            .expect("lookups lock")
            .push(name.to_string());
        Ok(self.named.get(name).cloned())
    }

    async fn create_agent(
        &self,
        model: &str,
        name: &str,
        instructions: &str,
        tools: &[Value],
    ) -> Result<String, FlowError> {
        let _ = instructions;
        let mut created = self.created.lock().expect("created lock");
        created.push(CreatedAgent {
            model: model.to_string(),
            name: name.to_string(),
            tools: tools.to_vec(),
        });
        Ok(format!("agent-{}", created.len()))
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), FlowError> {
        self.deleted
            .lock()
            .expect("deleted lock")
            .push(agent_id.to_string());
        if self.delete_fails {
            return Err(FlowError::agent("delete rejected"));
        }
        Ok(())
    }

    async fn create_thread(&self) -> Result<String, FlowError> {
        Ok("thread-1".to_string())
    }

    async fn post_message(
        &self,
        _thread_id: &str,
        _role: &str,
        content: &str,
    ) -> Result<(), FlowError> {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push(content.to_string());
        Ok(())
    }

    async fn run_to_completion(
        &self,
        _thread_id: &str,
        _agent_id: &str,
    ) -> Result<RunInfo, FlowError> {
        Ok(serde_json::from_value(serde_json::json!({
            "id": "run-1",
            "status": self.run_status,
            "last_error": self.run_error,
        }))
        .expect("run info"))
    }

    async fn list_messages(&self, _thread_id: &str) -> Result<Vec<AgentMessage>, FlowError> {
        Ok(self.messages.clone())
    }
}

#[derive(Default)]
pub struct FakeLister {
    pub accounts: Vec<String>,
    pub projects: Vec<String>,
}

#[async_trait]
impl ResourceLister for FakeLister {
    async fn list_resources_by_type(
        &self,
        _resource_group: &str,
        resource_type: &str,
        _kind_filter: Option<&str>,
    ) -> Result<Vec<String>, FlowError> {
        if resource_type.ends_with("/projects") {
            Ok(self.projects.clone())
        } else {
            Ok(self.accounts.clone())
        }
    }
}
