use crate::services::resolver::{classify, ConnectionRef};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchConfiguration {
    pub connection_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchToolParameters {
    pub search_configurations: Vec<SearchConfiguration>,
}

/// Builds the tool definitions for one grounded run. A strict project-scoped
/// connection id gets the simplified short form; anything else (bare names,
/// non-conforming ids) goes through the explicit search-configuration
/// envelope, which skips the client-side id validation.
pub fn build_tool_definitions(reference: &str) -> Vec<Value> {
    match classify(reference) {
        ConnectionRef::ProjectScopedId(id) => vec![serde_json::json!({
            "type": "bing_grounding",
            "bing_grounding": { "connection_id": id },
        })],
        _ => {
            let parameters = SearchToolParameters {
                search_configurations: vec![SearchConfiguration {
                    connection_id: reference.to_string(),
                }],
            };
            vec![serde_json::json!({
                "type": "bing_grounding",
                "bing_grounding": serde_json::to_value(parameters).expect("tool parameters"),
            })]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::build_tool_definitions;

    const PROJECT_ID: &str = "/subscriptions/s/resourceGroups/g/providers/Microsoft.CognitiveServices/accounts/a/projects/p/connections/c";

    #[test]
    fn strict_id_uses_simplified_form() {
        let tools = build_tool_definitions(PROJECT_ID);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["type"], "bing_grounding");
        assert_eq!(tools[0]["bing_grounding"]["connection_id"], PROJECT_ID);
        assert!(tools[0]["bing_grounding"]
            .get("search_configurations")
            .is_none());
    }

    #[test]
    fn bare_name_uses_explicit_configuration() {
        let tools = build_tool_definitions("binggrounding");
        assert_eq!(tools.len(), 1);
        assert_eq!(
            tools[0]["bing_grounding"]["search_configurations"][0]["connection_id"],
            "binggrounding"
        );
    }
}
