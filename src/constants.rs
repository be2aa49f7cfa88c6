pub mod arm {
    pub const MANAGEMENT_BASE_URL: &str = "https://management.azure.com";
    pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
    pub const DEFAULT_SEARCH_API_VERSION: &str = "2025-05-01-preview";
    pub const DEFAULT_CONNECTIONS_API_VERSION: &str = "2025-10-01-preview";
    pub const ACCOUNT_CONNECTION_TYPE: &str = "Microsoft.CognitiveServices/accounts/connections";
    pub const PROJECT_CONNECTION_TYPE: &str =
        "Microsoft.CognitiveServices/accounts/projects/connections";
}

pub mod agents {
    pub const AGENTS_SCOPE: &str = "https://ai.azure.com/.default";
    pub const API_VERSION: &str = "2025-05-01";
    pub const RUN_POLL_INTERVAL_MS: u64 = 1_000;
}

pub mod discovery {
    pub const ACCOUNT_RESOURCE_TYPE: &str = "Microsoft.CognitiveServices/accounts";
    pub const PROJECT_RESOURCE_TYPE: &str = "Microsoft.CognitiveServices/accounts/projects";
    pub const ACCOUNT_KIND: &str = "AIServices";
}

pub mod grounding {
    pub const DEFAULT_CONNECTION_NAME: &str = "binggrounding";
    pub const CONNECTION_KEYWORDS: &[&str] = &["bing", "ground"];
    pub const METADATA_TYPE: &str = "bing_grounding";
}

pub mod exit_codes {
    pub const FAILURE: i32 = 1;
    pub const UPSTREAM_READ: i32 = 2;
    pub const ACCOUNT_PUT: i32 = 3;
    pub const ACCOUNT_GET: i32 = 4;
    pub const PROJECT_PUT: i32 = 5;
    pub const PROJECT_GET: i32 = 6;
}
