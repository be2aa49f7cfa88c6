use crate::constants::grounding;
use crate::errors::FlowError;
use crate::services::agents::AgentsApi;
use crate::services::logger::Logger;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static PROJECT_CONNECTION_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^/subscriptions/[^/]+/resourceGroups/[^/]+/providers/[^/]+/accounts/[^/]+/projects/[^/]+/connections/[^/]+$",
    )
    .expect("project connection id regex")
});

static ACCOUNT_CONNECTION_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^/subscriptions/[^/]+/resourceGroups/[^/]+/providers/[^/]+/accounts/[^/]+/connections/[^/]+$",
    )
    .expect("account connection id regex")
});

/// Every shape a connection reference can arrive in, decided in one place.
/// Consumers match exhaustively instead of re-deriving the shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRef {
    ProjectScopedId(String),
    AccountScopedId(String),
    BareName(String),
    Unrecognized(String),
}

pub fn classify(raw: &str) -> ConnectionRef {
    let trimmed = raw.trim();
    if PROJECT_CONNECTION_ID.is_match(trimmed) {
        ConnectionRef::ProjectScopedId(trimmed.to_string())
    } else if ACCOUNT_CONNECTION_ID.is_match(trimmed) {
        ConnectionRef::AccountScopedId(trimmed.to_string())
    } else if !trimmed.is_empty() && !trimmed.contains('/') {
        ConnectionRef::BareName(trimmed.to_string())
    } else {
        ConnectionRef::Unrecognized(trimmed.to_string())
    }
}

pub fn is_project_scoped_id(raw: &str) -> bool {
    PROJECT_CONNECTION_ID.is_match(raw.trim())
}

/// Explicit reference hints, already pulled out of the configuration at the
/// boundary so resolution is testable with literal inputs.
#[derive(Debug, Clone, Default)]
pub struct ResolveHints {
    pub connection_id: Option<String>,
    pub connection_name: Option<String>,
    pub use_name: bool,
}

pub struct ConnectionResolver {
    logger: Logger,
    agents: Arc<dyn AgentsApi>,
}

impl ConnectionResolver {
    pub fn new(logger: Logger, agents: Arc<dyn AgentsApi>) -> Self {
        Self {
            logger: logger.child("resolver"),
            agents,
        }
    }

    /// Layered resolution, first match wins. The downstream tool builder
    /// enforces a strict identifier shape on one path but accepts bare names
    /// on another, so this returns whichever canonical form survives
    /// validation, or None when nothing usable was found.
    pub async fn resolve(&self, hints: &ResolveHints) -> Result<Option<String>, FlowError> {
        if let Some(raw) = &hints.connection_id {
            match classify(raw) {
                ConnectionRef::ProjectScopedId(id) => return Ok(Some(id)),
                ConnectionRef::AccountScopedId(id) => {
                    let name = id.rsplit('/').next().unwrap_or_default().to_string();
                    if hints.use_name {
                        return Ok(Some(name));
                    }
                    if let Some(reference) = self.lookup_by_name(&name).await? {
                        return Ok(Some(reference));
                    }
                }
                ConnectionRef::BareName(_) | ConnectionRef::Unrecognized(_) => {
                    self.logger.warn(
                        "Ignoring invalid connection id hint (expected an ARM-style connection id)",
                        None,
                    );
                }
            }
        }

        if let Some(name) = &hints.connection_name {
            if hints.use_name {
                return Ok(Some(name.clone()));
            }
            if let Some(reference) = self.lookup_by_name(name).await? {
                return Ok(Some(reference));
            }
        }

        self.auto_detect(hints.use_name).await
    }

    async fn lookup_by_name(&self, name: &str) -> Result<Option<String>, FlowError> {
        match self.agents.get_connection(name).await? {
            Some(connection) if !connection.id.is_empty() => Ok(Some(connection.id)),
            Some(_) => {
                self.logger.warn(
                    &format!("Connection '{}' has no id in the project directory", name),
                    None,
                );
                Ok(None)
            }
            None => {
                self.logger.warn(
                    &format!("No project connection named '{}' was found", name),
                    None,
                );
                Ok(None)
            }
        }
    }

    // Best-effort auto-detect: a unique connection whose name, target, or
    // type suggests grounding. Ties resolve to nothing rather than guessing.
    async fn auto_detect(&self, use_name: bool) -> Result<Option<String>, FlowError> {
        let connections = self.agents.list_connections().await?;
        let mut candidates = connections.iter().filter(|connection| {
            let haystack = format!(
                "{} {} {}",
                connection.name, connection.target, connection.connection_type
            )
            .to_lowercase();
            grounding::CONNECTION_KEYWORDS
                .iter()
                .any(|keyword| haystack.contains(keyword))
        });

        let first = candidates.next();
        if candidates.next().is_some() {
            return Ok(None);
        }
        Ok(first.map(|connection| {
            if use_name {
                connection.name.clone()
            } else {
                connection.id.clone()
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, is_project_scoped_id, ConnectionRef};

    const PROJECT_ID: &str = "/subscriptions/s/resourceGroups/g/providers/Microsoft.CognitiveServices/accounts/a/projects/p/connections/c";
    const ACCOUNT_ID: &str = "/subscriptions/s/resourceGroups/g/providers/Microsoft.CognitiveServices/accounts/a/connections/c";

    #[test]
    fn classify_project_scoped() {
        assert_eq!(
            classify(PROJECT_ID),
            ConnectionRef::ProjectScopedId(PROJECT_ID.to_string())
        );
        assert!(is_project_scoped_id(PROJECT_ID));
    }

    #[test]
    fn classify_account_scoped() {
        assert_eq!(
            classify(ACCOUNT_ID),
            ConnectionRef::AccountScopedId(ACCOUNT_ID.to_string())
        );
        assert!(!is_project_scoped_id(ACCOUNT_ID));
    }

    #[test]
    fn classify_bare_name_and_junk() {
        assert_eq!(
            classify("binggrounding"),
            ConnectionRef::BareName("binggrounding".to_string())
        );
        assert_eq!(
            classify("/subscriptions/s/oops"),
            ConnectionRef::Unrecognized("/subscriptions/s/oops".to_string())
        );
        assert_eq!(classify("  "), ConnectionRef::Unrecognized(String::new()));
    }
}
