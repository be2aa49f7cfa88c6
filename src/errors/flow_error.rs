use crate::constants::exit_codes;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowErrorKind {
    Config,
    Credential,
    UpstreamRead,
    AccountPut,
    AccountGet,
    ProjectPut,
    ProjectGet,
    Agent,
    Internal,
}

impl FlowErrorKind {
    /// Exit-code contract for calling automation: the failure stage is
    /// distinguishable without parsing output text.
    pub fn exit_code(self) -> i32 {
        match self {
            FlowErrorKind::UpstreamRead => exit_codes::UPSTREAM_READ,
            FlowErrorKind::AccountPut => exit_codes::ACCOUNT_PUT,
            FlowErrorKind::AccountGet => exit_codes::ACCOUNT_GET,
            FlowErrorKind::ProjectPut => exit_codes::PROJECT_PUT,
            FlowErrorKind::ProjectGet => exit_codes::PROJECT_GET,
            FlowErrorKind::Config
            | FlowErrorKind::Credential
            | FlowErrorKind::Agent
            | FlowErrorKind::Internal => exit_codes::FAILURE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowError {
    pub kind: FlowErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl FlowError {
    pub fn new(kind: FlowErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Config, "CONFIG", message)
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Credential, "CREDENTIAL", message)
    }

    pub fn upstream_read(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::UpstreamRead, "UPSTREAM_READ", message)
    }

    pub fn account_put(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::AccountPut, "ACCOUNT_PUT", message)
    }

    pub fn account_get(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::AccountGet, "ACCOUNT_GET", message)
    }

    pub fn project_put(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::ProjectPut, "PROJECT_PUT", message)
    }

    pub fn project_get(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::ProjectGet, "PROJECT_GET", message)
    }

    pub fn agent(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Agent, "AGENT", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FlowErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " ({})", hint)?;
        }
        Ok(())
    }
}

impl Error for FlowError {}

impl From<std::io::Error> for FlowError {
    fn from(err: std::io::Error) -> Self {
        FlowError::internal(err.to_string())
    }
}
