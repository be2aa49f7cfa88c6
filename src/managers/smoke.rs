use crate::errors::FlowError;
use crate::services::agents::{
    extract_text_and_citations, AgentMessage, AgentsApi, RunInfo, RunOutcome,
};
use crate::services::config::SmokeConfig;
use crate::services::connections::SoftOutcome;
use crate::services::discovery::{discover_account_and_project, ResourceLister};
use crate::services::logger::Logger;
use crate::services::resolver::{ConnectionResolver, ResolveHints};
use crate::services::tools::build_tool_definitions;
use crate::utils::output;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

const COMPARISON_QUESTION: &str =
    "What is today's date and the current weather in Seattle? Include source URLs if you used web grounding.";
const BASELINE_INSTRUCTIONS: &str =
    "You are a helpful assistant. Answer concisely. If you don't know, say so.";
const GROUNDED_INSTRUCTIONS: &str =
    "You are a helpful assistant. Use Bing grounding to answer the user and include at least one citation.";

/// Resolves the agent-hosting project endpoint: explicit value wins, then the
/// account/project names, optionally filled in by the discovery collaborator.
pub async fn derive_project_endpoint(
    config: &SmokeConfig,
    lister: Option<&dyn ResourceLister>,
) -> Result<String, FlowError> {
    if let Some(endpoint) = &config.endpoint {
        Url::parse(endpoint).map_err(|_| {
            FlowError::config(format!("Project endpoint is not a valid URL: {}", endpoint))
        })?;
        return Ok(endpoint.trim_end_matches('/').to_string());
    }

    let mut account = config.account_name.clone();
    let mut project = config.project_name.clone();
    if account.is_none() || project.is_none() {
        if let (Some(lister), Some(group)) = (lister, &config.discovery_resource_group) {
            let (found_account, found_project) =
                discover_account_and_project(lister, group).await?;
            account = account.or(found_account);
            project = project.or(found_project);
        }
    }

    match (account, project) {
        (Some(account), Some(project)) => Ok(format!(
            "https://{}.services.ai.azure.com/api/projects/{}",
            account, project
        )),
        _ => Err(FlowError::config("Missing project endpoint configuration.").with_hint(
            "Set PROJECT_ENDPOINT, or both FOUNDRY_ACCOUNT_NAME and FOUNDRY_PROJECT_NAME. \
             Optionally set AZURE_RESOURCE_GROUP and ALLOW_AZ_DISCOVERY=1 to auto-discover.",
        )),
    }
}

/// Builds the outcome for one finished run from its terminal state and the
/// thread's messages (newest first). Never fails: a missing assistant message
/// degrades to status/error reporting.
pub fn build_outcome(run: &RunInfo, messages: &[AgentMessage]) -> RunOutcome {
    match messages.iter().find(|message| message.role == "assistant") {
        Some(message) => {
            let (text, citations) = extract_text_and_citations(message);
            RunOutcome {
                text: Some(text),
                citations,
                status: run.status.clone(),
                last_error: run.error_text(),
            }
        }
        None => RunOutcome {
            text: None,
            citations: Vec::new(),
            status: run.status.clone(),
            last_error: run.error_text(),
        },
    }
}

pub fn print_run_outcome(title: &str, outcome: &RunOutcome) {
    output::banner(title);
    match &outcome.text {
        None => {
            println!("No assistant message returned.");
            println!("Run status: {}", outcome.status);
            if let Some(error) = &outcome.last_error {
                println!("Run error: {}", error);
            }
        }
        Some(text) if text.is_empty() => println!("(empty response)"),
        Some(text) => println!("{}", text),
    }
    if !outcome.citations.is_empty() {
        output::section("Citations:");
        for url in &outcome.citations {
            output::item(url);
        }
    }
}

pub struct SmokeManager {
    logger: Logger,
    agents: Arc<dyn AgentsApi>,
    config: SmokeConfig,
    endpoint: String,
}

impl SmokeManager {
    pub fn new(
        logger: Logger,
        agents: Arc<dyn AgentsApi>,
        config: SmokeConfig,
        endpoint: String,
    ) -> Self {
        Self {
            logger: logger.child("smoke"),
            agents,
            config,
            endpoint,
        }
    }

    pub async fn run(&self) -> Result<(), FlowError> {
        let model = self.choose_model_deployment().await?;
        let resolver = ConnectionResolver::new(self.logger.clone(), self.agents.clone());
        let hints = ResolveHints {
            connection_id: self.config.connection_id.clone(),
            connection_name: self.config.connection_name.clone(),
            use_name: self.config.use_connection_name,
        };
        let reference = resolver.resolve(&hints).await?;

        self.print_config(&model, reference.as_deref());
        self.print_connections().await;

        output::section("NOTE");
        println!(
            "Bing grounding does not work with VPN or private endpoints in many setups. \
             If the account/project is private-only, the ungrounded run can still validate \
             reachability, but grounding may fail or produce no citations."
        );

        let baseline_prompt = format!(
            "Question 1 (NO grounding): {} Do not browse the web; answer from general knowledge.",
            COMPARISON_QUESTION
        );
        output::section("INPUT (non-grounded)");
        println!("{}", baseline_prompt);
        let outcome = self
            .run_conversation(
                &model,
                "smoke-no-grounding",
                BASELINE_INSTRUCTIONS,
                &[],
                &baseline_prompt,
            )
            .await?;
        print_run_outcome("Non-grounded response", &outcome);

        if self.config.skip_grounding {
            self.logger
                .info("Skipping the grounded comparison (SKIP_BING_GROUNDING set)", None);
            return Ok(());
        }

        let reference = reference.ok_or_else(|| {
            FlowError::config("Missing grounding connection reference.").with_hint(
                "Set BING_GROUNDING_CONNECTION_ID, or BING_GROUNDING_CONNECTION_NAME naming a \
                 project connection. Set SKIP_BING_GROUNDING=1 to skip the grounded comparison.",
            )
        })?;

        let grounded_prompt = format!(
            "Question 2 (BING grounded): {} Use Grounding with Bing Search and include source URLs.",
            COMPARISON_QUESTION
        );
        output::section("INPUT (bing-grounded)");
        println!("{}", grounded_prompt);
        let tools = build_tool_definitions(&reference);
        let outcome = self
            .run_conversation(
                &model,
                "smoke-bing-grounding",
                GROUNDED_INSTRUCTIONS,
                &tools,
                &grounded_prompt,
            )
            .await?;
        print_run_outcome("Bing-grounded response", &outcome);
        Ok(())
    }

    async fn choose_model_deployment(&self) -> Result<String, FlowError> {
        if let Some(model) = &self.config.model_deployment {
            return Ok(model.clone());
        }
        let deployments = self.agents.list_deployments().await?;
        let mut names: Vec<String> = deployments
            .into_iter()
            .map(|deployment| deployment.name)
            .filter(|name| !name.is_empty())
            .collect();
        if names.len() == 1 {
            return Ok(names.remove(0));
        }
        if names.is_empty() {
            return Err(FlowError::config("No deployments found in this project.")
                .with_hint("Set MODEL_DEPLOYMENT_NAME explicitly."));
        }
        names.sort();
        names.dedup();
        Err(FlowError::config(format!(
            "Multiple deployments found; set MODEL_DEPLOYMENT_NAME to one of: {}",
            names.join(", ")
        )))
    }

    /// One single-turn conversation against an ephemeral agent. The agent is
    /// deleted afterwards whatever happened; cleanup failure must not mask
    /// the primary outcome.
    async fn run_conversation(
        &self,
        model: &str,
        agent_name: &str,
        instructions: &str,
        tools: &[Value],
        prompt: &str,
    ) -> Result<RunOutcome, FlowError> {
        let agent_id = self
            .agents
            .create_agent(model, agent_name, instructions, tools)
            .await?;
        let outcome = self.converse(&agent_id, prompt).await;
        if let SoftOutcome::Failed(reason) = self.cleanup_agent(&agent_id).await {
            self.logger
                .warn(&format!("Agent cleanup failed: {}", reason), None);
        }
        outcome
    }

    async fn converse(&self, agent_id: &str, prompt: &str) -> Result<RunOutcome, FlowError> {
        let thread_id = self.agents.create_thread().await?;
        self.agents.post_message(&thread_id, "user", prompt).await?;
        let run = self.agents.run_to_completion(&thread_id, agent_id).await?;
        let messages = self.agents.list_messages(&thread_id).await?;
        Ok(build_outcome(&run, &messages))
    }

    async fn cleanup_agent(&self, agent_id: &str) -> SoftOutcome {
        match self.agents.delete_agent(agent_id).await {
            Ok(()) => SoftOutcome::Applied,
            Err(err) => SoftOutcome::Failed(err.to_string()),
        }
    }

    fn print_config(&self, model: &str, reference: Option<&str>) {
        output::section("CONFIG");
        output::item(&format!("PROJECT_ENDPOINT: {}", self.endpoint));
        output::item(&format!("MODEL_DEPLOYMENT_NAME: {}", model));
        match reference {
            Some(reference) => {
                output::item(&format!("BING_GROUNDING_CONNECTION: {}", reference))
            }
            None => output::item("BING_GROUNDING_CONNECTION: (not set / not auto-detected)"),
        }
    }

    async fn print_connections(&self) {
        output::section("PROJECT CONNECTIONS");
        match self.agents.list_connections().await {
            Ok(connections) if connections.is_empty() => println!("(none found)"),
            Ok(connections) => {
                for connection in connections {
                    output::item(&format!(
                        "name={} | type={} | target={} | id={}",
                        connection.name,
                        connection.connection_type,
                        connection.target,
                        connection.id
                    ));
                }
            }
            Err(err) => println!("(unable to list connections: {})", err),
        }
    }
}
