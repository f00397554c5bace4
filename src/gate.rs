//! Runtime gating: decide whether a case may run in this environment.
//!
//! Decisions are pure functions of the case, the configuration snapshot and
//! the observed backend status, so the same inputs always yield the same
//! verdict.
use crate::catalog::{
    AuthProvider, Case, CaseKind, CODEX_PROFILE_PLACEHOLDER, GPG_KEY_PLACEHOLDER,
};
use crate::config::E2eConfig;
use serde::Serialize;
use std::fmt;

/// Whether the container backend answered its health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Available,
    Unavailable,
}

impl BackendStatus {
    pub fn from_probe(ok: bool) -> Self {
        if ok {
            BackendStatus::Available
        } else {
            BackendStatus::Unavailable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    HarnessDisabled,
    BackendUnavailable,
    ExecShellDisabled,
    AuthDisabled,
    CodexDisabled,
    CodexProfileMissing,
    GpgDisabled,
    GpgKeyMissing,
    TunnelDisabled,
    RmAllNotAllowed,
    SshDisabled,
    PrivateRepoMissing,
    PublicRepoMissing,
}

/// A skipped case, with a message telling the operator what to set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skip {
    pub reason: SkipReason,
    pub message: String,
}

impl Skip {
    fn new(reason: SkipReason, message: String) -> Self {
        Self { reason, message }
    }

    pub fn harness_disabled(config: &E2eConfig) -> Self {
        let prefix = &config.env_prefix;
        Self::new(
            SkipReason::HarnessDisabled,
            format!("{prefix} is not enabled (set {prefix}=1 to run real Docker e2e)."),
        )
    }

    pub fn backend_unavailable() -> Self {
        Self::new(
            SkipReason::BackendUnavailable,
            "Docker is not available (required for e2e).".to_string(),
        )
    }

    pub fn public_repo_missing(config: &E2eConfig, what: &str) -> Self {
        Self::new(
            SkipReason::PublicRepoMissing,
            format!(
                "{} is required for {what}.",
                config.var("PUBLIC_REPO")
            ),
        )
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Skip(Skip),
}

impl Verdict {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Verdict::Proceed)
    }
}

/// Evaluate the gate for `case`. The first failing check wins.
pub fn decide(case: &Case, config: &E2eConfig, backend: BackendStatus) -> Verdict {
    match first_skip(case, config, backend) {
        Some(skip) => Verdict::Skip(skip),
        None => Verdict::Proceed,
    }
}

fn first_skip(case: &Case, config: &E2eConfig, backend: BackendStatus) -> Option<Skip> {
    if backend == BackendStatus::Unavailable {
        return Some(Skip::backend_unavailable());
    }
    let kind = case.kind();
    if kind == CaseKind::Help {
        return None;
    }
    let toggle = |reason: SkipReason, what: &str, suffix: &str| {
        Skip::new(reason, format!("{what} (set {}=1).", config.var(suffix)))
    };
    let missing = |reason: SkipReason, what: &str, suffix: &str| {
        Skip::new(reason, format!("{what} (set {}).", config.var(suffix)))
    };

    if kind.is_exec_shell() && !config.enable_exec_shell {
        return Some(toggle(
            SkipReason::ExecShellDisabled,
            "Interactive exec shell disabled",
            "ENABLE_EXEC_SHELL",
        ));
    }
    if let CaseKind::Auth { provider } = kind {
        if !config.enable_auth {
            return Some(toggle(
                SkipReason::AuthDisabled,
                "Auth cases disabled",
                "ENABLE_AUTH",
            ));
        }
        match provider {
            AuthProvider::Codex => {
                if !config.enable_codex {
                    return Some(toggle(
                        SkipReason::CodexDisabled,
                        "Codex auth disabled",
                        "ENABLE_CODEX",
                    ));
                }
                if has_exact(case, CODEX_PROFILE_PLACEHOLDER) && config.codex_profile.is_none() {
                    return Some(missing(
                        SkipReason::CodexProfileMissing,
                        "Codex profile not configured",
                        "CODEX_PROFILE",
                    ));
                }
            }
            AuthProvider::Gpg => {
                if !config.enable_gpg {
                    return Some(toggle(
                        SkipReason::GpgDisabled,
                        "GPG auth disabled",
                        "ENABLE_GPG",
                    ));
                }
                if has_exact(case, GPG_KEY_PLACEHOLDER) && config.gpg_key_id.is_none() {
                    return Some(missing(
                        SkipReason::GpgKeyMissing,
                        "GPG key id not configured",
                        "GPG_KEY_ID",
                    ));
                }
            }
            AuthProvider::Github | AuthProvider::Other => {}
        }
    }
    if matches!(kind, CaseKind::Tunnel { .. }) && !config.enable_tunnel {
        return Some(toggle(
            SkipReason::TunnelDisabled,
            "Tunnel cases disabled",
            "ENABLE_TUNNEL",
        ));
    }
    if kind == (CaseKind::Remove { all: true }) && !config.allow_rm_all {
        return Some(toggle(
            SkipReason::RmAllNotAllowed,
            "rm --all disabled",
            "ALLOW_RM_ALL",
        ));
    }
    if matches!(kind, CaseKind::Create { ssh: true, .. }) && !config.enable_ssh {
        return Some(toggle(
            SkipReason::SshDisabled,
            "SSH create cases disabled",
            "ENABLE_SSH",
        ));
    }
    if case.needs_private_repo() && config.private_repo.is_none() {
        return Some(missing(
            SkipReason::PrivateRepoMissing,
            "Private repo not configured",
            "PRIVATE_REPO",
        ));
    }
    if case.needs_public_repo() && config.public_repo.is_none() {
        return Some(missing(
            SkipReason::PublicRepoMissing,
            "Public repo not configured",
            "PUBLIC_REPO",
        ));
    }
    None
}

fn has_exact(case: &Case, placeholder: &str) -> bool {
    case.args.iter().any(|arg| arg == placeholder)
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
