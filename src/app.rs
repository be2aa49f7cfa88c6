use crate::errors::FlowError;
use crate::managers::provision::ProvisionManager;
use crate::managers::smoke::{derive_project_endpoint, SmokeManager};
use crate::services::agents::AgentsClient;
use crate::services::arm::ArmClient;
use crate::services::config::{self, ProvisionConfig, SmokeConfig};
use crate::services::credentials::select_credential;
use crate::services::discovery::{AzResourceLister, ResourceLister};
use crate::services::logger::Logger;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "grounding",
    version,
    about = "Provision and smoke-test a Foundry Bing grounding connection"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or update the account- and project-scoped grounding connections
    Provision,
    /// Compare an ungrounded and a Bing-grounded agent run against a project
    Smoke,
}

pub async fn run() -> Result<(), FlowError> {
    config::load_dotenv();
    let cli = Cli::parse();
    let logger = Logger::new("grounding");

    match cli.command {
        Command::Provision => run_provision(&logger).await,
        Command::Smoke => run_smoke(&logger).await,
    }
}

async fn run_provision(logger: &Logger) -> Result<(), FlowError> {
    let config = ProvisionConfig::from_env()?;
    let credential = select_credential(
        logger,
        config.use_cli_credential,
        config.management_token.clone(),
        None,
    );
    let management = Arc::new(ArmClient::new(logger.clone(), credential));
    ProvisionManager::new(logger.clone(), management, config)
        .run()
        .await
}

async fn run_smoke(logger: &Logger) -> Result<(), FlowError> {
    let config = SmokeConfig::from_env();
    let lister = if config.allow_az_discovery {
        Some(AzResourceLister::new(logger.clone()))
    } else {
        None
    };
    let endpoint = derive_project_endpoint(
        &config,
        lister.as_ref().map(|lister| lister as &dyn ResourceLister),
    )
    .await?;
    let credential = select_credential(
        logger,
        config.use_cli_credential,
        None,
        config.agents_token.clone(),
    );
    let agents = Arc::new(AgentsClient::new(logger.clone(), &endpoint, credential));
    SmokeManager::new(logger.clone(), agents, config, endpoint)
        .run()
        .await
}
