use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.as_str(), "true" | "1"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub bedrock: BedrockConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RIVERBED_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RIVERBED_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            bedrock: BedrockConfig::from_env_profiled(p),
            agent: AgentConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  bedrock:  region={}, model={}, api_key={}",
            self.bedrock.region,
            self.bedrock.model,
            if self.bedrock.api_key.is_some() { "set" } else { "(none)" }
        );
        tracing::info!(
            "  agent:    max_steps={}, max_tokens={}",
            self.agent.max_steps,
            self.agent.max_tokens
        );
    }
}

// ── Bedrock runtime ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockConfig {
    pub region: String,
    /// Overrides the regional `bedrock-runtime` endpoint (e.g. a VPC endpoint or a local stub).
    pub endpoint_url: Option<String>,
    /// Bedrock API key sent as a bearer token. Request signing is handled outside this crate.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    /// `converse` or `anthropic`; inferred from the model id when unset.
    pub api_schema: Option<String>,
    pub enable_caching: bool,
    pub timeout_secs: u64,
}

impl BedrockConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "us-east-1"),
            endpoint_url: profiled_env_opt(p, "BEDROCK_ENDPOINT_URL"),
            api_key: profiled_env_opt(p, "AWS_BEARER_TOKEN_BEDROCK"),
            model: profiled_env_or(p, "BEDROCK_MODEL", "us.amazon.nova-micro-v1:0"),
            api_schema: profiled_env_opt(p, "BEDROCK_API_SCHEMA"),
            enable_caching: profiled_env_bool(p, "BEDROCK_ENABLE_CACHING", false),
            timeout_secs: profiled_env_u64(p, "BEDROCK_TIMEOUT_SECS", 120),
        }
    }

    /// Base URL of the runtime API, without the `/model/...` suffix.
    pub fn base_url(&self) -> String {
        match &self.endpoint_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint_url: None,
            api_key: None,
            model: "us.amazon.nova-micro-v1:0".to_string(),
            api_schema: None,
            enable_caching: false,
            timeout_secs: 120,
        }
    }
}

// ── Agent loop ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Upper bound on model round-trips per top-level request.
    pub max_steps: usize,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl AgentConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_steps: profiled_env_u32(p, "RIVERBED_MAX_STEPS", 5) as usize,
            max_tokens: profiled_env_u32(p, "RIVERBED_MAX_TOKENS", 4096),
            temperature: profiled_env_opt(p, "RIVERBED_TEMPERATURE").and_then(|v| v.parse().ok()),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            max_tokens: 4096,
            temperature: None,
        }
    }
}
