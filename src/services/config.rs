use crate::constants::{arm, grounding};
use crate::errors::FlowError;

/// Loads `.env` into the process environment without overriding values that
/// are already set. Called once from the entrypoint, never from the core.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_any(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| env_non_empty(name))
}

pub fn truthy(value: Option<&str>) -> bool {
    match value {
        Some(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y"
        ),
        None => false,
    }
}

fn env_truthy(name: &str) -> bool {
    truthy(std::env::var(name).ok().as_deref())
}

fn require_env(name: &str) -> Result<String, FlowError> {
    env_non_empty(name).ok_or_else(|| {
        FlowError::config(format!("Missing required environment variable: {}", name))
    })
}

/// Everything the provisioning flow needs, resolved once at the boundary.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub subscription_id: String,
    pub resource_group: String,
    pub account_name: String,
    pub project_name: String,
    pub search_resource_id: String,
    pub connection_name: String,
    pub search_api_version: String,
    pub connections_api_version: String,
    pub use_cli_credential: bool,
    pub management_token: Option<String>,
}

impl ProvisionConfig {
    pub fn from_env() -> Result<Self, FlowError> {
        Ok(Self {
            subscription_id: require_env("AZURE_SUBSCRIPTION_ID")?,
            resource_group: require_env("FOUNDRY_RESOURCE_GROUP")?,
            account_name: require_env("FOUNDRY_ACCOUNT_NAME")?,
            project_name: require_env("FOUNDRY_PROJECT_NAME")?,
            search_resource_id: require_env("BING_RESOURCE_ID")?,
            connection_name: env_non_empty("BING_GROUNDING_CONNECTION_NAME")
                .unwrap_or_else(|| grounding::DEFAULT_CONNECTION_NAME.to_string()),
            search_api_version: env_non_empty("BING_ARM_API_VERSION")
                .unwrap_or_else(|| arm::DEFAULT_SEARCH_API_VERSION.to_string()),
            connections_api_version: env_non_empty("FOUNDRY_CONNECTIONS_API_VERSION")
                .unwrap_or_else(|| arm::DEFAULT_CONNECTIONS_API_VERSION.to_string()),
            use_cli_credential: env_truthy("USE_AZURE_CLI_CREDENTIAL"),
            management_token: env_non_empty("AZURE_MANAGEMENT_TOKEN"),
        })
    }
}

/// Everything the smoke flow needs, resolved once at the boundary. The
/// layered fallback names mirror the automation environments this tool is
/// dropped into.
#[derive(Debug, Clone, Default)]
pub struct SmokeConfig {
    pub endpoint: Option<String>,
    pub account_name: Option<String>,
    pub project_name: Option<String>,
    pub allow_az_discovery: bool,
    pub discovery_resource_group: Option<String>,
    pub model_deployment: Option<String>,
    pub connection_id: Option<String>,
    pub connection_name: Option<String>,
    pub use_connection_name: bool,
    pub skip_grounding: bool,
    pub use_cli_credential: bool,
    pub agents_token: Option<String>,
}

impl SmokeConfig {
    pub fn from_env() -> Self {
        Self {
            endpoint: env_any(&["PROJECT_ENDPOINT", "AZURE_AI_PROJECT_ENDPOINT"]),
            account_name: env_any(&["FOUNDRY_ACCOUNT_NAME", "AI_FOUNDRY_ACCOUNT_NAME"]),
            project_name: env_any(&[
                "FOUNDRY_PROJECT_NAME",
                "PROJECT_NAME",
                "AI_FOUNDRY_PROJECT_NAME",
            ]),
            allow_az_discovery: env_truthy("ALLOW_AZ_DISCOVERY"),
            discovery_resource_group: env_any(&["AZURE_RESOURCE_GROUP", "SANDBOX_RESOURCE_GROUP"]),
            model_deployment: env_any(&[
                "MODEL_DEPLOYMENT_NAME",
                "AZURE_AI_MODEL_DEPLOYMENT_NAME",
                "AZURE_OPENAI_DEPLOYMENT",
            ]),
            connection_id: env_any(&[
                "BING_GROUNDING_CONNECTION_ID",
                "BING_CONNECTION_ID",
                "BING_PROJECT_CONNECTION_ID",
                "BING_CUSTOM_SEARCH_PROJECT_CONNECTION_ID",
            ]),
            connection_name: env_any(&["BING_GROUNDING_CONNECTION_NAME", "BING_CONNECTION_NAME"]),
            use_connection_name: env_truthy("BING_GROUNDING_USE_CONNECTION_NAME"),
            skip_grounding: env_truthy("SKIP_BING_GROUNDING"),
            use_cli_credential: env_truthy("USE_AZURE_CLI_CREDENTIAL"),
            agents_token: env_non_empty("AZURE_AGENTS_TOKEN"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::truthy;

    #[test]
    fn truthy_accepts_usual_spellings() {
        for value in ["1", "true", "TRUE", "yes", "Y", " y "] {
            assert!(truthy(Some(value)), "{} should be truthy", value);
        }
    }

    #[test]
    fn truthy_rejects_everything_else() {
        for value in ["0", "false", "no", "", "on"] {
            assert!(!truthy(Some(value)), "{} should not be truthy", value);
        }
        assert!(!truthy(None));
    }
}
