use crate::constants::arm;
use crate::errors::FlowError;
use crate::services::credentials::TokenCredential;
use crate::services::logger::Logger;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;

/// Immutable result of one management-plane request. `body` is present iff
/// the raw text is non-empty and parses as JSON.
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    pub body: Option<Value>,
    pub raw: String,
}

impl ArmResponse {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Reads a `properties.<field>` value from the body, if any.
    pub fn property(&self, field: &str) -> Option<&Value> {
        self.body.as_ref()?.get("properties")?.get(field)
    }
}

/// The management REST surface the reconciliation core depends on. HTTP-level
/// failures (4xx/5xx) come back as an `ArmResponse`; only transport failures
/// are `Err`.
#[async_trait]
pub trait Management: Send + Sync {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse, FlowError>;
}

pub struct ArmClient {
    logger: Logger,
    client: Client,
    credential: Arc<dyn TokenCredential>,
}

impl ArmClient {
    pub fn new(logger: Logger, credential: Arc<dyn TokenCredential>) -> Self {
        let client = Client::builder()
            .user_agent("grounding/0.3")
            .build()
            .expect("reqwest client");
        Self {
            logger: logger.child("arm"),
            client,
            credential,
        }
    }

    fn build_headers(token: &str) -> Result<HeaderMap, FlowError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| FlowError::credential("Bearer token contains invalid header bytes"))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

#[async_trait]
impl Management for ArmClient {
    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<ArmResponse, FlowError> {
        self.logger.debug(
            "management request",
            Some(&serde_json::json!({ "method": method.as_str(), "url": url })),
        );
        let token = self.credential.token(arm::MANAGEMENT_SCOPE).await?;
        let mut request = self
            .client
            .request(method, url)
            .headers(Self::build_headers(&token)?);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            FlowError::internal(format!("Management request failed: {}", err))
        })?;

        let status = response.status().as_u16();
        let raw = response.text().await.unwrap_or_default();
        let body = serde_json::from_str(&raw).ok();
        Ok(ArmResponse { status, body, raw })
    }
}

/// Builds a versioned management URL for a resource path.
pub fn management_url(resource_path: &str, api_version: &str) -> String {
    format!(
        "{}{}?api-version={}",
        arm::MANAGEMENT_BASE_URL,
        resource_path,
        api_version
    )
}

#[cfg(test)]
mod tests {
    use super::{management_url, ArmResponse};

    #[test]
    fn management_url_joins_path_and_version() {
        let url = management_url("/subscriptions/s/resourceGroups/g", "2025-10-01-preview");
        assert_eq!(
            url,
            "https://management.azure.com/subscriptions/s/resourceGroups/g?api-version=2025-10-01-preview"
        );
    }

    #[test]
    fn property_reads_nested_field() {
        let response = ArmResponse {
            status: 200,
            body: Some(serde_json::json!({ "properties": { "endpoint": "https://x" } })),
            raw: String::new(),
        };
        assert_eq!(
            response.property("endpoint").and_then(|v| v.as_str()),
            Some("https://x")
        );
        assert!(response.property("missing").is_none());
    }
}
