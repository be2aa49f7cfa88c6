use crate::constants::discovery;
use crate::errors::FlowError;
use crate::services::logger::Logger;
use async_trait::async_trait;
use serde_json::Value;

/// Optional discovery collaborator. The core only ever needs resource names
/// for a (group, type) pair; how they are listed is this trait's business.
#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list_resources_by_type(
        &self,
        resource_group: &str,
        resource_type: &str,
        kind_filter: Option<&str>,
    ) -> Result<Vec<String>, FlowError>;
}

/// Shells out to the Azure CLI. Strictly opt-in: the flows only construct
/// this when discovery was explicitly allowed.
pub struct AzResourceLister {
    logger: Logger,
}

impl AzResourceLister {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("az"),
        }
    }
}

#[async_trait]
impl ResourceLister for AzResourceLister {
    async fn list_resources_by_type(
        &self,
        resource_group: &str,
        resource_type: &str,
        kind_filter: Option<&str>,
    ) -> Result<Vec<String>, FlowError> {
        let query = match kind_filter {
            Some(kind) => format!("[?kind=='{}'].name", kind),
            None => "[].name".to_string(),
        };
        self.logger.debug(
            "az resource list",
            Some(&serde_json::json!({ "group": resource_group, "type": resource_type })),
        );
        let output = tokio::process::Command::new("az")
            .args([
                "resource",
                "list",
                "-g",
                resource_group,
                "--resource-type",
                resource_type,
                "--query",
                &query,
                "-o",
                "json",
            ])
            .output()
            .await
            .map_err(|err| {
                FlowError::config(format!("Azure CLI 'az' not found on PATH: {}", err))
                    .with_hint("Install the Azure CLI or set the account/project names explicitly.")
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(FlowError::config(format!(
                "Azure CLI resource listing failed: {}",
                stderr
            )));
        }

        let parsed: Value = serde_json::from_slice(&output.stdout)
            .map_err(|err| FlowError::config(format!("Azure CLI returned invalid JSON: {}", err)))?;
        Ok(parsed
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Infers the (account, project) pair from a resource group. Each side is
/// only trusted when it is unambiguous; anything else stays None.
pub async fn discover_account_and_project(
    lister: &dyn ResourceLister,
    resource_group: &str,
) -> Result<(Option<String>, Option<String>), FlowError> {
    let accounts = lister
        .list_resources_by_type(
            resource_group,
            discovery::ACCOUNT_RESOURCE_TYPE,
            Some(discovery::ACCOUNT_KIND),
        )
        .await?;
    if accounts.len() != 1 {
        return Ok((None, None));
    }
    let account = accounts.into_iter().next().unwrap_or_default();

    let projects = lister
        .list_resources_by_type(resource_group, discovery::PROJECT_RESOURCE_TYPE, None)
        .await?;

    // Project resources come back as "{account}/{project}".
    let prefix = format!("{}/", account);
    let normalized: Vec<String> = projects
        .iter()
        .filter_map(|entry| entry.strip_prefix(&prefix).map(|s| s.to_string()))
        .collect();

    if normalized.len() == 1 {
        let project = normalized.into_iter().next();
        Ok((Some(account), project))
    } else {
        Ok((Some(account), None))
    }
}
