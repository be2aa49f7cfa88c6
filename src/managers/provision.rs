use crate::errors::FlowError;
use crate::services::arm::{management_url, Management};
use crate::services::config::ProvisionConfig;
use crate::services::connections::{
    account_resource_path, connection_body, connection_path, project_resource_path,
    ConnectionUpserter, Scope, UpsertReport, SHARED_FLAG,
};
use crate::services::logger::Logger;
use crate::utils::output;
use crate::utils::redact::redact_body;
use reqwest::Method;
use std::sync::Arc;

/// Endpoint and key of the secret-bearing upstream resource. Fetched once
/// per run, owned by the upstream service, never persisted here.
#[derive(Debug, Clone)]
pub struct UpstreamResource {
    pub endpoint: String,
    pub primary_key: String,
}

pub struct ProvisionManager {
    logger: Logger,
    management: Arc<dyn Management>,
    config: ProvisionConfig,
}

impl ProvisionManager {
    pub fn new(logger: Logger, management: Arc<dyn Management>, config: ProvisionConfig) -> Self {
        Self {
            logger: logger.child("provision"),
            management,
            config,
        }
    }

    pub async fn run(&self) -> Result<(), FlowError> {
        let upstream = self.read_upstream_resource().await?;
        self.logger.info(
            "upstream resource read",
            Some(&serde_json::json!({ "endpoint": upstream.endpoint })),
        );

        let upserter = ConnectionUpserter::new(self.logger.clone(), self.management.clone());

        // Account first. The project record carries the same credential and
        // metadata, so reconciliation stays strictly ordered even though the
        // API itself would accept either order.
        let account_scope_path = account_resource_path(
            &self.config.subscription_id,
            &self.config.resource_group,
            &self.config.account_name,
        );
        let account_url = management_url(
            &connection_path(&account_scope_path, &self.config.connection_name),
            &self.config.connections_api_version,
        );
        let account_body = connection_body(
            Scope::Account,
            &self.config.connection_name,
            &upstream.endpoint,
            &upstream.primary_key,
            &self.config.search_resource_id,
        );
        let account = upserter
            .upsert(Scope::Account, &account_url, &account_body, SHARED_FLAG)
            .await?;

        let project_scope_path = project_resource_path(
            &self.config.subscription_id,
            &self.config.resource_group,
            &self.config.account_name,
            &self.config.project_name,
        );
        let project_url = management_url(
            &connection_path(&project_scope_path, &self.config.connection_name),
            &self.config.connections_api_version,
        );
        let project_body = connection_body(
            Scope::Project,
            &self.config.connection_name,
            &upstream.endpoint,
            &upstream.primary_key,
            &self.config.search_resource_id,
        );
        let project = upserter
            .upsert(Scope::Project, &project_url, &project_body, SHARED_FLAG)
            .await?;

        self.report(&account, &project);
        Ok(())
    }

    async fn read_upstream_resource(&self) -> Result<UpstreamResource, FlowError> {
        let show_url = management_url(
            &self.config.search_resource_id,
            &self.config.search_api_version,
        );
        let show = self.management.request(Method::GET, &show_url, None).await?;
        if show.is_error() {
            return Err(FlowError::upstream_read(format!(
                "Failed to GET search resource: {}",
                show.status
            ))
            .with_details(serde_json::json!({ "body": redact_body(&show.raw) })));
        }
        let endpoint = show
            .property("endpoint")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                FlowError::upstream_read("Search resource did not return properties.endpoint")
                    .with_details(serde_json::json!({ "body": redact_body(&show.raw) }))
            })?;

        let keys_url = management_url(
            &format!("{}/listKeys", self.config.search_resource_id),
            &self.config.search_api_version,
        );
        let keys = self
            .management
            .request(Method::POST, &keys_url, Some(&serde_json::json!({})))
            .await?;
        if keys.is_error() {
            return Err(FlowError::upstream_read(format!(
                "Failed to listKeys on search resource: {}",
                keys.status
            ))
            .with_details(serde_json::json!({ "body": redact_body(&keys.raw) })));
        }
        let primary_key = keys
            .body
            .as_ref()
            .and_then(|body| body.get("key1"))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                FlowError::upstream_read("listKeys response did not include key1")
                    .with_details(serde_json::json!({ "body": redact_body(&keys.raw) }))
            })?;

        Ok(UpstreamResource {
            endpoint,
            primary_key,
        })
    }

    fn report(&self, account: &UpsertReport, project: &UpsertReport) {
        output::section("Updated grounding connections:");
        println!("  name: {}", self.config.connection_name);
        println!(
            "  account: {} (isSharedToAll={})",
            account.id.as_deref().unwrap_or("(unknown)"),
            account.shared
        );
        println!(
            "  project: {} (isSharedToAll={})",
            project.id.as_deref().unwrap_or("(unknown)"),
            project.shared
        );
    }
}
