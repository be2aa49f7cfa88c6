use crate::constants::{agents, arm};
use crate::errors::FlowError;
use crate::services::logger::Logger;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Supplies bearer tokens for a given OAuth scope. Token acquisition is a
/// collaborator concern; the core only ever sees this trait.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn token(&self, scope: &str) -> Result<String, FlowError>;
}

/// Fetches tokens through the Azure CLI (`az account get-access-token`).
pub struct AzCliCredential {
    logger: Logger,
}

impl AzCliCredential {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("az-credential"),
        }
    }
}

#[async_trait]
impl TokenCredential for AzCliCredential {
    async fn token(&self, scope: &str) -> Result<String, FlowError> {
        self.logger.debug("requesting token via az", None);
        let output = tokio::process::Command::new("az")
            .args(["account", "get-access-token", "--scope", scope, "-o", "json"])
            .output()
            .await
            .map_err(|err| {
                FlowError::credential(format!("Failed to invoke Azure CLI: {}", err))
                    .with_hint("Install the Azure CLI and run `az login`, or unset USE_AZURE_CLI_CREDENTIAL.")
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(
                FlowError::credential(format!("az account get-access-token failed: {}", stderr))
                    .with_hint("Run `az login` and retry."),
            );
        }

        let parsed: Value = serde_json::from_slice(&output.stdout).map_err(|err| {
            FlowError::credential(format!("Azure CLI returned invalid JSON: {}", err))
        })?;
        let token = parsed
            .get("accessToken")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if token.is_empty() {
            return Err(FlowError::credential(
                "Azure CLI response did not include accessToken",
            ));
        }
        Ok(token)
    }
}

/// Serves pre-issued tokens handed in at the boundary, one per audience.
pub struct StaticTokenCredential {
    management: Option<String>,
    agents: Option<String>,
}

impl StaticTokenCredential {
    pub fn new(management: Option<String>, agents: Option<String>) -> Self {
        Self { management, agents }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn token(&self, scope: &str) -> Result<String, FlowError> {
        let (token, var) = if scope == arm::MANAGEMENT_SCOPE {
            (self.management.as_ref(), "AZURE_MANAGEMENT_TOKEN")
        } else if scope == agents::AGENTS_SCOPE {
            (self.agents.as_ref(), "AZURE_AGENTS_TOKEN")
        } else {
            return Err(FlowError::credential(format!(
                "No static token configured for scope {}",
                scope
            )));
        };
        token.cloned().ok_or_else(|| {
            FlowError::credential(format!("No bearer token available for {}", scope))
                .with_hint(format!(
                    "Set {} or set USE_AZURE_CLI_CREDENTIAL=1 to use the Azure CLI.",
                    var
                ))
        })
    }
}

/// Picks the credential strategy from the single boolean toggle.
pub fn select_credential(
    logger: &Logger,
    use_cli: bool,
    management_token: Option<String>,
    agents_token: Option<String>,
) -> Arc<dyn TokenCredential> {
    if use_cli {
        Arc::new(AzCliCredential::new(logger.clone()))
    } else {
        Arc::new(StaticTokenCredential::new(management_token, agents_token))
    }
}
