use crate::constants::{arm as arm_constants, grounding};
use crate::errors::FlowError;
use crate::services::arm::{ArmResponse, Management};
use crate::services::logger::Logger;
use crate::utils::redact::redact_body;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;

pub const SHARED_FLAG: &str = "isSharedToAll";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Account,
    Project,
}

impl Scope {
    pub fn label(self) -> &'static str {
        match self {
            Scope::Account => "account",
            Scope::Project => "project",
        }
    }

    pub fn record_type(self) -> &'static str {
        match self {
            Scope::Account => arm_constants::ACCOUNT_CONNECTION_TYPE,
            Scope::Project => arm_constants::PROJECT_CONNECTION_TYPE,
        }
    }

    fn put_error(self, message: String) -> FlowError {
        match self {
            Scope::Account => FlowError::account_put(message),
            Scope::Project => FlowError::project_put(message),
        }
    }

    fn get_error(self, message: String) -> FlowError {
        match self {
            Scope::Account => FlowError::account_get(message),
            Scope::Project => FlowError::project_get(message),
        }
    }
}

/// Outcome of a best-effort side step. Callers report it; it never crosses
/// the soft-fail boundary as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftOutcome {
    Applied,
    Skipped(String),
    Failed(String),
}

#[derive(Debug)]
pub struct UpsertReport {
    pub id: Option<String>,
    pub shared: bool,
    pub record: Option<Value>,
    pub repair: SoftOutcome,
}

pub fn account_resource_path(subscription: &str, resource_group: &str, account: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.CognitiveServices/accounts/{}",
        subscription, resource_group, account
    )
}

pub fn project_resource_path(
    subscription: &str,
    resource_group: &str,
    account: &str,
    project: &str,
) -> String {
    format!(
        "{}/projects/{}",
        account_resource_path(subscription, resource_group, account),
        project
    )
}

pub fn connection_path(scope_path: &str, connection_name: &str) -> String {
    format!("{}/connections/{}", scope_path, connection_name)
}

/// Desired state for one connection record. Both scopes carry the same
/// credential and target; the category mirrors the official connection
/// template for this tool family.
pub fn connection_body(
    scope: Scope,
    name: &str,
    endpoint: &str,
    key: &str,
    resource_id: &str,
) -> Value {
    serde_json::json!({
        "name": name,
        "type": scope.record_type(),
        "properties": {
            "authType": "ApiKey",
            "category": "ApiKey",
            "target": endpoint,
            "isSharedToAll": true,
            "credentials": { "key": key },
            "metadata": {
                "ApiType": "Azure",
                "ResourceId": resource_id,
                "Type": grounding::METADATA_TYPE,
            },
        },
    })
}

fn flag_is_true(response: &ArmResponse, flag: &str) -> bool {
    matches!(response.property(flag), Some(Value::Bool(true)))
}

fn record_id(response: &ArmResponse) -> Option<String> {
    response
        .body
        .as_ref()
        .and_then(|body| body.get("id"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub struct ConnectionUpserter {
    logger: Logger,
    management: Arc<dyn Management>,
}

impl ConnectionUpserter {
    pub fn new(logger: Logger, management: Arc<dyn Management>) -> Self {
        Self {
            logger: logger.child("upsert"),
            management,
        }
    }

    /// PUT-create, GET-verify, and if `flag` did not stick, PATCH it into
    /// place (falling back to a full PUT when PATCH is unsupported). The
    /// record is re-read after any corrective step so the report reflects
    /// observed state, not intent.
    pub async fn upsert(
        &self,
        scope: Scope,
        url: &str,
        desired: &Value,
        flag: &str,
    ) -> Result<UpsertReport, FlowError> {
        let put = self.management.request(Method::PUT, url, Some(desired)).await?;
        if put.is_error() {
            return Err(scope
                .put_error(format!(
                    "Failed to PUT {} connection: {}",
                    scope.label(),
                    put.status
                ))
                .with_details(serde_json::json!({ "body": redact_body(&put.raw) })));
        }

        let mut read = self.management.request(Method::GET, url, None).await?;
        if read.is_error() {
            return Err(scope
                .get_error(format!(
                    "{} connection PUT succeeded but GET failed: {}",
                    scope.label(),
                    read.status
                ))
                .with_details(serde_json::json!({ "body": redact_body(&read.raw) })));
        }

        let repair = if flag_is_true(&read, flag) {
            SoftOutcome::Skipped(format!("{} already true", flag))
        } else {
            let outcome = self.repair_flag(scope, url, desired, flag).await?;
            read = self.management.request(Method::GET, url, None).await?;
            outcome
        };

        Ok(UpsertReport {
            id: record_id(&read),
            shared: flag_is_true(&read, flag),
            record: read.body,
            repair,
        })
    }

    // Some API versions silently ignore the flag on create, so correction
    // happens after verification instead of trusting the create response.
    async fn repair_flag(
        &self,
        scope: Scope,
        url: &str,
        desired: &Value,
        flag: &str,
    ) -> Result<SoftOutcome, FlowError> {
        // The connection RP requires the `AuthType` discriminator in PATCH bodies.
        let mut properties = serde_json::Map::new();
        properties.insert("AuthType".to_string(), Value::String("ApiKey".to_string()));
        properties.insert("category".to_string(), Value::String("ApiKey".to_string()));
        properties.insert(flag.to_string(), Value::Bool(true));
        let patch_body = Value::Object(
            [("properties".to_string(), Value::Object(properties))]
                .into_iter()
                .collect(),
        );

        let mut response = self
            .management
            .request(Method::PATCH, url, Some(&patch_body))
            .await?;
        if response.status == 405 {
            // PATCH unsupported for this resource family; re-issue the full
            // PUT with the desired body unchanged.
            response = self.management.request(Method::PUT, url, Some(desired)).await?;
        }

        if response.is_error() {
            let message = format!(
                "Failed to set {}=true on the {} connection: {}",
                flag,
                scope.label(),
                response.status
            );
            self.logger.warn(
                &message,
                Some(&serde_json::json!({ "body": redact_body(&response.raw) })),
            );
            Ok(SoftOutcome::Failed(message))
        } else {
            Ok(SoftOutcome::Applied)
        }
    }
}
