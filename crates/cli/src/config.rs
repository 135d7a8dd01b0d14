//! Process configuration, read once from the environment (after `.env`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_TOOLS_URL: &str = "http://127.0.0.1:8081/invoke";
const DEFAULT_WORKFLOW_DIR: &str = "workflows";
const DEFAULT_SANDBOX_TIMEOUT_MS: u64 = 3_000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL for the state store; in-memory state when unset.
    pub database_url: Option<String>,
    pub tools_url: String,
    pub tool_catalog: Option<PathBuf>,
    pub workflow_dir: PathBuf,
    pub sandbox_timeout: Duration,
    pub bind: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let sandbox_timeout_ms = match get("AUTOMATION_SANDBOX_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("AUTOMATION_SANDBOX_TIMEOUT_MS must be milliseconds, got '{raw}'"))?,
            None => DEFAULT_SANDBOX_TIMEOUT_MS,
        };

        Ok(Self {
            database_url: get("AUTOMATION_DATABASE_URL"),
            tools_url: get("AUTOMATION_TOOLS_URL").unwrap_or_else(|| DEFAULT_TOOLS_URL.to_string()),
            tool_catalog: get("AUTOMATION_TOOL_CATALOG").map(PathBuf::from),
            workflow_dir: get("AUTOMATION_WORKFLOW_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKFLOW_DIR)),
            sandbox_timeout: Duration::from_millis(sandbox_timeout_ms),
            bind: get("AUTOMATION_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.bind, DEFAULT_BIND);
        assert_eq!(cfg.sandbox_timeout, Duration::from_secs(3));
        assert_eq!(cfg.workflow_dir, PathBuf::from("workflows"));
    }

    #[test]
    fn values_are_read_and_blanks_ignored() {
        let cfg = config(&[
            ("AUTOMATION_DATABASE_URL", "postgres://localhost/automation"),
            ("AUTOMATION_SANDBOX_TIMEOUT_MS", "250"),
            ("AUTOMATION_TOOL_CATALOG", "tools.json"),
            ("AUTOMATION_BIND", "  "),
        ])
        .unwrap();
        assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/automation"));
        assert_eq!(cfg.sandbox_timeout, Duration::from_millis(250));
        assert_eq!(cfg.tool_catalog, Some(PathBuf::from("tools.json")));
        assert_eq!(cfg.bind, DEFAULT_BIND);
    }

    #[test]
    fn bad_timeout_is_an_error() {
        let err = config(&[("AUTOMATION_SANDBOX_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("AUTOMATION_SANDBOX_TIMEOUT_MS"));
    }
}
