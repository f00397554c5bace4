//! Run-wide configuration snapshot.
//!
//! The process environment is captured once into an [`AmbientEnv`]; every
//! component reads the immutable [`E2eConfig`] derived from it instead of
//! consulting global state mid-run.
use crate::selection::CaseSelection;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Snapshot of the process environment taken at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientEnv {
    vars: BTreeMap<String, String>,
}

impl AmbientEnv {
    /// Capture the current process environment (non-UTF-8 entries are dropped).
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Non-empty value for `key`.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

/// `1|true|yes|on`, case-insensitive.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Immutable harness configuration, read once per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct E2eConfig {
    pub env_prefix: String,
    /// Gates every case that touches real resources.
    pub enabled: bool,
    pub public_repo: Option<String>,
    pub private_repo: Option<String>,
    pub codex_profile: Option<String>,
    pub gpg_key_id: Option<String>,
    pub allow_rm_all: bool,
    pub enable_auth: bool,
    pub enable_codex: bool,
    pub enable_gpg: bool,
    pub enable_ssh: bool,
    pub enable_tunnel: bool,
    pub enable_exec_shell: bool,
    pub keep_workspaces: bool,
    pub use_host_home: bool,
    pub image: Option<String>,
    pub full: bool,
    #[serde(skip)]
    pub gh_token: Option<String>,
    pub case_selection: CaseSelection,
    /// Wall-clock bound for batch executions; `None` waits indefinitely.
    pub batch_timeout: Option<Duration>,
}

impl E2eConfig {
    /// Derive the configuration for `prefix` (e.g. `CWS_E2E`).
    pub fn from_env(prefix: &str, env: &AmbientEnv) -> Result<Self> {
        let key = |suffix: &str| format!("{prefix}_{suffix}");
        let text = |suffix: &str| env.non_empty(&key(suffix)).map(str::to_string);
        let batch_timeout = match env.non_empty(&key("TIMEOUT_SECS")) {
            Some(raw) => Some(parse_timeout(raw).with_context(|| key("TIMEOUT_SECS"))?),
            None => None,
        };
        let case_selection = CaseSelection::parse(env.get(&key("CASE")).unwrap_or(""))
            .with_context(|| format!("parse {}", key("CASE")))?;

        Ok(Self {
            env_prefix: prefix.to_string(),
            enabled: env.flag(prefix),
            public_repo: text("PUBLIC_REPO"),
            private_repo: text("PRIVATE_REPO"),
            codex_profile: text("CODEX_PROFILE"),
            gpg_key_id: text("GPG_KEY_ID"),
            allow_rm_all: env.flag(&key("ALLOW_RM_ALL")),
            enable_auth: env.flag(&key("ENABLE_AUTH")),
            enable_codex: env.flag(&key("ENABLE_CODEX")),
            enable_gpg: env.flag(&key("ENABLE_GPG")),
            enable_ssh: env.flag(&key("ENABLE_SSH")),
            enable_tunnel: env.flag(&key("ENABLE_TUNNEL")),
            enable_exec_shell: env.flag(&key("ENABLE_EXEC_SHELL")),
            keep_workspaces: env.flag(&key("KEEP_WORKSPACES")),
            use_host_home: env.flag(&key("USE_HOST_HOME")),
            image: text("IMAGE"),
            full: env.flag(&key("FULL")),
            gh_token: text("GH_TOKEN"),
            case_selection,
            batch_timeout,
        })
    }

    /// Full variable name for a harness toggle, e.g. `CWS_E2E_ENABLE_AUTH`.
    pub fn var(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.env_prefix)
    }

    /// Everything disabled; the starting point for tests and dry planning.
    pub fn disabled(prefix: &str) -> Self {
        Self {
            env_prefix: prefix.to_string(),
            enabled: false,
            public_repo: None,
            private_repo: None,
            codex_profile: None,
            gpg_key_id: None,
            allow_rm_all: false,
            enable_auth: false,
            enable_codex: false,
            enable_gpg: false,
            enable_ssh: false,
            enable_tunnel: false,
            enable_exec_shell: false,
            keep_workspaces: false,
            use_host_home: false,
            image: None,
            full: false,
            gh_token: None,
            case_selection: CaseSelection::default(),
            batch_timeout: None,
        }
    }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow!("timeout must be a number of seconds, got {raw:?}"))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("timeout must be positive, got {raw:?}"));
    }
    Ok(Duration::from_secs_f64(secs))
}
