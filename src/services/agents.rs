use crate::constants::agents as agent_constants;
use crate::errors::FlowError;
use crate::services::arm::ArmResponse;
use crate::services::credentials::TokenCredential;
use crate::services::logger::Logger;
use crate::utils::redact::redact_body;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub connection_type: String,
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_error: Option<Value>,
}

impl RunInfo {
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self.status.as_str(),
            "queued" | "in_progress" | "cancelling"
        )
    }

    pub fn error_text(&self) -> Option<String> {
        self.last_error
            .as_ref()
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<MessageText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageText {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Value>,
}

/// What one conversational run produced. `text` is None when no assistant
/// message came back; the terminal status and last error still get reported.
#[derive(Debug)]
pub struct RunOutcome {
    pub text: Option<String>,
    pub citations: Vec<String>,
    pub status: String,
    pub last_error: Option<String>,
}

/// Newline-joins the text parts of one message and collects every citation
/// URL referenced by their annotations, first-seen order, duplicates
/// suppressed.
pub fn extract_text_and_citations(message: &AgentMessage) -> (String, Vec<String>) {
    let mut texts = Vec::new();
    let mut citations: Vec<String> = Vec::new();

    for part in &message.content {
        if part.kind != "text" {
            continue;
        }
        let Some(text) = &part.text else { continue };
        if !text.value.is_empty() {
            texts.push(text.value.clone());
        }
        for annotation in &text.annotations {
            let url = annotation
                .get("url_citation")
                .and_then(|citation| citation.get("url"))
                .and_then(|url| url.as_str());
            if let Some(url) = url {
                if !citations.iter().any(|seen| seen == url) {
                    citations.push(url.to_string());
                }
            }
        }
    }

    (texts.join("\n").trim().to_string(), citations)
}

/// The agent-hosting surface the smoke flow depends on.
#[async_trait]
pub trait AgentsApi: Send + Sync {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, FlowError>;
    async fn list_connections(&self) -> Result<Vec<ConnectionInfo>, FlowError>;
    async fn get_connection(&self, name: &str) -> Result<Option<ConnectionInfo>, FlowError>;
    async fn create_agent(
        &self,
        model: &str,
        name: &str,
        instructions: &str,
        tools: &[Value],
    ) -> Result<String, FlowError>;
    async fn delete_agent(&self, agent_id: &str) -> Result<(), FlowError>;
    async fn create_thread(&self) -> Result<String, FlowError>;
    async fn post_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), FlowError>;
    async fn run_to_completion(&self, thread_id: &str, agent_id: &str)
        -> Result<RunInfo, FlowError>;
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<AgentMessage>, FlowError>;
}

fn list_items(body: &Value) -> Vec<Value> {
    body.get("data")
        .or_else(|| body.get("value"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

pub struct AgentsClient {
    logger: Logger,
    client: Client,
    base: String,
    credential: Arc<dyn TokenCredential>,
}

impl AgentsClient {
    pub fn new(logger: Logger, endpoint: &str, credential: Arc<dyn TokenCredential>) -> Self {
        let client = Client::builder()
            .user_agent("grounding/0.3")
            .build()
            .expect("reqwest client");
        Self {
            logger: logger.child("agents"),
            client,
            base: endpoint.trim_end_matches('/').to_string(),
            credential,
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}{}?api-version={}",
            self.base,
            path,
            agent_constants::API_VERSION
        )
    }

    async fn request_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse, FlowError> {
        self.logger.debug(
            "agents request",
            Some(&serde_json::json!({ "method": method.as_str(), "url": url })),
        );
        let token = self.credential.token(agent_constants::AGENTS_SCOPE).await?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| FlowError::credential("Bearer token contains invalid header bytes"))?;
        headers.insert(AUTHORIZATION, value);

        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|err| FlowError::agent(format!("Agent service request failed: {}", err)))?;

        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&raw).ok();
        Ok(ArmResponse { status, body, raw })
    }

    async fn expect_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        what: &str,
    ) -> Result<Value, FlowError> {
        let response = self.request_json(method, url, body).await?;
        if response.is_error() {
            return Err(FlowError::agent(format!(
                "Failed to {}: {}",
                what, response.status
            ))
            .with_details(serde_json::json!({ "body": redact_body(&response.raw) })));
        }
        Ok(response.body.unwrap_or(Value::Null))
    }

    fn id_of(body: &Value, what: &str) -> Result<String, FlowError> {
        body.get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| FlowError::agent(format!("{} response did not include an id", what)))
    }
}

#[async_trait]
impl AgentsApi for AgentsClient {
    async fn list_deployments(&self) -> Result<Vec<Deployment>, FlowError> {
        let body = self
            .expect_json(Method::GET, &self.url("/deployments"), None, "list deployments")
            .await?;
        Ok(list_items(&body)
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Deployment>(item).ok())
            .filter(|deployment| !deployment.name.is_empty())
            .collect())
    }

    async fn list_connections(&self) -> Result<Vec<ConnectionInfo>, FlowError> {
        let body = self
            .expect_json(Method::GET, &self.url("/connections"), None, "list connections")
            .await?;
        Ok(list_items(&body)
            .into_iter()
            .filter_map(|item| serde_json::from_value::<ConnectionInfo>(item).ok())
            .collect())
    }

    async fn get_connection(&self, name: &str) -> Result<Option<ConnectionInfo>, FlowError> {
        let url = self.url(&format!("/connections/{}", name));
        let response = self.request_json(Method::GET, &url, None).await?;
        if response.status == 404 {
            return Ok(None);
        }
        if response.is_error() {
            return Err(FlowError::agent(format!(
                "Failed to get connection '{}': {}",
                name, response.status
            ))
            .with_details(serde_json::json!({ "body": redact_body(&response.raw) })));
        }
        let body = response.body.unwrap_or(Value::Null);
        Ok(serde_json::from_value::<ConnectionInfo>(body).ok())
    }

    async fn create_agent(
        &self,
        model: &str,
        name: &str,
        instructions: &str,
        tools: &[Value],
    ) -> Result<String, FlowError> {
        let body = serde_json::json!({
            "model": model,
            "name": name,
            "instructions": instructions,
            "tools": tools,
        });
        let created = self
            .expect_json(Method::POST, &self.url("/assistants"), Some(&body), "create agent")
            .await?;
        Self::id_of(&created, "create agent")
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<(), FlowError> {
        let url = self.url(&format!("/assistants/{}", agent_id));
        self.expect_json(Method::DELETE, &url, None, "delete agent")
            .await?;
        Ok(())
    }

    async fn create_thread(&self) -> Result<String, FlowError> {
        let created = self
            .expect_json(
                Method::POST,
                &self.url("/threads"),
                Some(&serde_json::json!({})),
                "create thread",
            )
            .await?;
        Self::id_of(&created, "create thread")
    }

    async fn post_message(
        &self,
        thread_id: &str,
        role: &str,
        content: &str,
    ) -> Result<(), FlowError> {
        let url = self.url(&format!("/threads/{}/messages", thread_id));
        let body = serde_json::json!({ "role": role, "content": content });
        self.expect_json(Method::POST, &url, Some(&body), "post message")
            .await?;
        Ok(())
    }

    async fn run_to_completion(
        &self,
        thread_id: &str,
        agent_id: &str,
    ) -> Result<RunInfo, FlowError> {
        let create_url = self.url(&format!("/threads/{}/runs", thread_id));
        let body = serde_json::json!({ "assistant_id": agent_id });
        let created = self
            .expect_json(Method::POST, &create_url, Some(&body), "create run")
            .await?;
        let mut run: RunInfo = serde_json::from_value(created)
            .map_err(|err| FlowError::agent(format!("Unreadable run response: {}", err)))?;

        while !run.is_terminal() {
            tokio::time::sleep(Duration::from_millis(agent_constants::RUN_POLL_INTERVAL_MS)).await;
            let poll_url = self.url(&format!("/threads/{}/runs/{}", thread_id, run.id));
            let polled = self
                .expect_json(Method::GET, &poll_url, None, "poll run")
                .await?;
            run = serde_json::from_value(polled)
                .map_err(|err| FlowError::agent(format!("Unreadable run response: {}", err)))?;
        }
        Ok(run)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<AgentMessage>, FlowError> {
        let url = format!(
            "{}&order=desc",
            self.url(&format!("/threads/{}/messages", thread_id))
        );
        let body = self
            .expect_json(Method::GET, &url, None, "list messages")
            .await?;
        Ok(list_items(&body)
            .into_iter()
            .filter_map(|item| serde_json::from_value::<AgentMessage>(item).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_text_and_citations, list_items, AgentMessage, RunInfo};

    fn message(parts: serde_json::Value) -> AgentMessage {
        serde_json::from_value(serde_json::json!({ "role": "assistant", "content": parts }))
            .expect("message")
    }

    #[test]
    fn extraction_joins_text_parts_and_dedupes_citations() {
        let message = message(serde_json::json!([
            {
                "type": "text",
                "text": {
                    "value": "first",
                    "annotations": [
                        { "type": "url_citation", "url_citation": { "url": "https://a" } },
                        { "type": "url_citation", "url_citation": { "url": "https://b" } }
                    ]
                }
            },
            {
                "type": "text",
                "text": {
                    "value": "second",
                    "annotations": [
                        { "type": "url_citation", "url_citation": { "url": "https://a" } }
                    ]
                }
            }
        ]));
        let (text, citations) = extract_text_and_citations(&message);
        assert_eq!(text, "first\nsecond");
        assert_eq!(citations, vec!["https://a", "https://b"]);
    }

    #[test]
    fn extraction_skips_non_text_parts() {
        let message = message(serde_json::json!([
            { "type": "image_file", "image_file": { "file_id": "f" } },
            { "type": "text", "text": { "value": "answer", "annotations": [] } }
        ]));
        let (text, citations) = extract_text_and_citations(&message);
        assert_eq!(text, "answer");
        assert!(citations.is_empty());
    }

    #[test]
    fn run_terminal_states() {
        for status in ["completed", "failed", "cancelled", "expired"] {
            let run: RunInfo =
                serde_json::from_value(serde_json::json!({ "id": "r", "status": status }))
                    .expect("run");
            assert!(run.is_terminal(), "{} should be terminal", status);
        }
        let run: RunInfo =
            serde_json::from_value(serde_json::json!({ "id": "r", "status": "in_progress" }))
                .expect("run");
        assert!(!run.is_terminal());
    }

    #[test]
    fn list_items_accepts_both_envelope_keys() {
        let data = serde_json::json!({ "data": [1, 2] });
        let value = serde_json::json!({ "value": [3] });
        assert_eq!(list_items(&data).len(), 2);
        assert_eq!(list_items(&value).len(), 1);
        assert!(list_items(&serde_json::json!({})).is_empty());
    }
}
