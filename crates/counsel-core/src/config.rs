use std::collections::HashMap;

use anyhow::Result;

use crate::types::{AgentRole, DEFAULT_LANGUAGE};

/// Model assignment for one agent role.
#[derive(Debug, Clone)]
pub struct RoleConfig {
    pub model: String,
    pub temperature: f32,
}

/// Full application configuration.
/// Sensitive fields (API keys) come from env/.env only.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub tavily_api_key: String,

    pub data_dir: String,
    pub web_bind: String,
    pub web_port: u16,
    pub default_language: String,

    /// Per-request model timeout. A hung upstream call blocks the turn for
    /// at most this long.
    pub llm_timeout_s: u64,

    // Retention sweep
    pub retention_seconds: u64,
    pub retention_sweep_interval_s: u64,

    roles: HashMap<AgentRole, RoleConfig>,
}

// Model assignments optimized for task complexity: fast models for
// high-throughput routing/retrieval, deep-reasoning models for analysis
// and professional writing.
const ROLE_DEFAULTS: &[(AgentRole, &str, f32)] = &[
    (AgentRole::Intake, "gpt-4o-mini", 0.3),
    (AgentRole::Researcher, "gpt-4o-mini", 0.0),
    (AgentRole::Strategist, "gpt-4o", 0.5),
    (AgentRole::Critic, "gpt-4o", 0.2),
    (AgentRole::Writer, "gpt-4o", 0.5),
];

fn parse_dotenv() -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return map;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv).unwrap_or_else(|| default.to_string())
}

fn get_u16(key: &str, dotenv: &HashMap<String, String>, default: u16) -> u16 {
    get(key, dotenv).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_f32(key: &str, dotenv: &HashMap<String, String>, default: f32) -> f32 {
    get(key, dotenv).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let dotenv = parse_dotenv();

        let mut roles = HashMap::new();
        for (role, model, temperature) in ROLE_DEFAULTS {
            let prefix = role.as_str().to_uppercase();
            roles.insert(
                *role,
                RoleConfig {
                    model: get_str(&format!("{prefix}_MODEL"), &dotenv, model),
                    temperature: get_f32(&format!("{prefix}_TEMPERATURE"), &dotenv, *temperature),
                },
            );
        }

        Ok(Config {
            openai_api_key: get_str("OPENAI_API_KEY", &dotenv, ""),
            openai_base_url: get_str("OPENAI_BASE_URL", &dotenv, "https://api.openai.com/v1"),
            tavily_api_key: get_str("TAVILY_API_KEY", &dotenv, ""),
            data_dir: get_str("DATA_DIR", &dotenv, "store"),
            web_bind: get_str("WEB_BIND", &dotenv, "127.0.0.1"),
            web_port: get_u16("WEB_PORT", &dotenv, 7071),
            default_language: get_str("DEFAULT_LANGUAGE", &dotenv, DEFAULT_LANGUAGE),
            llm_timeout_s: get_u64("LLM_TIMEOUT_S", &dotenv, 120),
            retention_seconds: get_u64("RETENTION_SECONDS", &dotenv, 3600),
            retention_sweep_interval_s: get_u64("RETENTION_SWEEP_INTERVAL_S", &dotenv, 300),
            roles,
        })
    }

    /// Model assignment for a role. Every role has an entry; the defaults
    /// table covers all of [`AgentRole::ALL`].
    pub fn role(&self, role: AgentRole) -> RoleConfig {
        self.roles.get(&role).cloned().unwrap_or_else(|| {
            // Unreachable unless ROLE_DEFAULTS loses an entry.
            RoleConfig { model: "gpt-4o-mini".into(), temperature: 0.5 }
        })
    }
}
