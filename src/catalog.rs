//! Declarative end-to-end case catalog.
//!
//! Cases name a launcher invocation with symbolic placeholders; nothing here
//! touches the environment or the filesystem.
mod kind;

pub use kind::{AuthProvider, CaseKind, ExecMode, ResetTarget, WorkspaceFlavor};

use crate::surface::Surface;
use serde::Serialize;
use std::collections::BTreeMap;

/// Generic workspace name, qualified per surface and flavor at run time.
pub const WORKSPACE_PLACEHOLDER: &str = "ws-e2e";
/// Generic tunnel name, derived from the qualified workspace name.
pub const TUNNEL_PLACEHOLDER: &str = "ws-e2e-tunnel";
pub const PUBLIC_REPO_PLACEHOLDER: &str = "OWNER/REPO";
pub const PRIVATE_REPO_PLACEHOLDER: &str = "OWNER/PRIVATE_REPO";
pub const CODEX_PROFILE_PLACEHOLDER: &str = "CODEX_PROFILE";
pub const GPG_KEY_PLACEHOLDER: &str = "GPG_KEY_ID";
/// Checkout path inside a repo-backed workspace, known only after creation.
pub const REPO_PATH_PLACEHOLDER: &str = "REPO_PATH";

/// One end-to-end scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Case {
    pub case_id: String,
    pub args: Vec<String>,
    pub purpose: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Shell-only setup text, emitted before sourcing the integration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prelude: Option<String>,
    kind: CaseKind,
}

impl Case {
    pub fn new(case_id: &str, args: &[&str], purpose: &str) -> Self {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        Self {
            case_id: case_id.to_string(),
            kind: CaseKind::classify(&args),
            args,
            purpose: purpose.to_string(),
            requires: None,
            env: BTreeMap::new(),
            prelude: None,
        }
    }

    pub fn requires(mut self, requires: &str) -> Self {
        self.requires = Some(requires.to_string());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn prelude(mut self, prelude: &str) -> Self {
        self.prelude = Some(prelude.to_string());
        self
    }

    /// Build a new case carrying rewritten arguments; the kind is recomputed.
    pub fn with_args(&self, args: Vec<String>) -> Self {
        Self {
            case_id: self.case_id.clone(),
            kind: CaseKind::classify(&args),
            args,
            purpose: self.purpose.clone(),
            requires: self.requires.clone(),
            env: self.env.clone(),
            prelude: self.prelude.clone(),
        }
    }

    pub fn kind(&self) -> CaseKind {
        self.kind
    }

    /// Workspace argument this case targets, if any.
    pub fn workspace_ref(&self) -> Option<&str> {
        self.kind.workspace_ref(&self.args)
    }

    pub fn mentions(&self, placeholder: &str) -> bool {
        self.args.iter().any(|arg| arg.contains(placeholder))
    }

    pub fn needs_private_repo(&self) -> bool {
        self.mentions(PRIVATE_REPO_PLACEHOLDER)
            || matches!(
                self.kind,
                CaseKind::Create {
                    private_seed: true,
                    ..
                } | CaseKind::Reset {
                    target: ResetTarget::PrivateRepo
                }
            )
    }

    pub fn needs_public_repo(&self) -> bool {
        self.mentions(PUBLIC_REPO_PLACEHOLDER) || self.kind.needs_repo_workspace()
    }

    pub fn flavor(&self) -> WorkspaceFlavor {
        if self.needs_private_repo() {
            WorkspaceFlavor::PrivateRepo
        } else if self.kind.needs_repo_workspace() {
            WorkspaceFlavor::Repo
        } else {
            WorkspaceFlavor::Plain
        }
    }
}

/// Cases shared by every surface.
pub fn base_cases() -> Vec<Case> {
    let existing = "Existing workspace container ws-e2e.";
    let tunnel = "Existing workspace container ws-e2e; VS Code tunnel prerequisites.";
    let network = "Docker daemon running; network access.";
    let ssh = "Docker daemon running; network access (or SSH configured).";
    let github = "Existing workspace container ws-e2e; valid GitHub token or `gh` login.";
    vec![
        Case::new("help", &["--help"], "Show top-level help and usage."),
        Case::new("help_auth", &["auth", "--help"], "Show help for auth."),
        Case::new("help_create", &["create", "--help"], "Show help for create."),
        Case::new("help_ls", &["ls", "--help"], "Show help for ls."),
        Case::new("help_exec", &["exec", "--help"], "Show help for exec."),
        Case::new("help_rm", &["rm", "--help"], "Show help for rm."),
        Case::new("help_reset", &["reset", "--help"], "Show help for reset."),
        Case::new("help_tunnel", &["tunnel", "--help"], "Show help for tunnel."),
        Case::new(
            "create_public_owner_repo",
            &["create", "OWNER/REPO"],
            "Create a workspace from a public repo in OWNER/REPO form.",
        )
        .requires(network),
        Case::new(
            "create_public_https",
            &["create", "https://github.com/OWNER/REPO"],
            "Create a workspace from a public repo via https URL.",
        )
        .requires(network),
        Case::new(
            "create_public_https_git_suffix",
            &["create", "https://github.com/OWNER/REPO.git"],
            "Create a workspace from a public repo via https URL (with .git).",
        )
        .requires(network),
        Case::new(
            "create_public_ssh_scp_style",
            &["create", "git@github.com:OWNER/REPO.git"],
            "Create a workspace from a public repo via SSH scp-style URL.",
        )
        .requires(ssh),
        Case::new(
            "create_public_ssh_url_style",
            &["create", "ssh://git@github.com/OWNER/REPO.git"],
            "Create a workspace from a public repo via SSH URL form.",
        )
        .requires(ssh),
        Case::new(
            "create_no_extras",
            &["create", "--no-extras", "OWNER/REPO"],
            "Create workspace while skipping ~/.private and extra repos.",
        ),
        Case::new(
            "create_seed_private_repo",
            &["create", "--private-repo", "OWNER/PRIVATE_REPO", "OWNER/REPO"],
            "Seed ~/.private from a repo during create.",
        )
        .requires("Valid GitHub token; access to the private repo."),
        Case::new(
            "create_no_work_repos_with_name",
            &["create", "--no-work-repos", "--name", "ws-e2e"],
            "Create workspace without cloning repos, using an explicit name.",
        ),
        Case::new(
            "create_multiple_repos",
            &["create", "OWNER/REPO", "OWNER/REPO"],
            "Create workspace by cloning multiple repos in order.",
        )
        .requires(network),
        Case::new("ls", &["ls"], "List workspaces."),
        Case::new(
            "exec_command",
            &["exec", "ws-e2e", "git", "-C", "REPO_PATH", "status"],
            "Run a non-interactive command in the workspace container.",
        )
        .requires(existing),
        Case::new(
            "exec_shell",
            &["exec", "ws-e2e"],
            "Open an interactive shell in the workspace container.",
        )
        .requires("Existing workspace container ws-e2e; interactive TTY support."),
        Case::new(
            "exec_root",
            &["exec", "--root", "ws-e2e", "id", "-u"],
            "Exec as root and verify uid=0.",
        )
        .requires(existing),
        Case::new(
            "exec_user",
            &["exec", "--user", "codex", "ws-e2e", "id", "-u"],
            "Exec as a specific user and verify expected uid.",
        )
        .requires(existing),
        Case::new(
            "auth_github",
            &["auth", "github", "ws-e2e"],
            "Update GitHub auth inside the workspace.",
        )
        .requires(github),
        Case::new(
            "auth_github_host",
            &["auth", "github", "--host", "github.com", "ws-e2e"],
            "Update GitHub auth with an explicit host override.",
        )
        .requires(github),
        Case::new(
            "auth_codex_profile",
            &["auth", "codex", "--profile", "CODEX_PROFILE", "ws-e2e"],
            "Apply Codex auth (profile-based) inside the workspace.",
        )
        .requires(
            "Existing workspace container ws-e2e; host Codex secrets must be accessible to the launcher container.",
        ),
        Case::new(
            "auth_gpg_key",
            &["auth", "gpg", "--key", "GPG_KEY_ID", "ws-e2e"],
            "Import a GPG signing key into the workspace.",
        )
        .requires(
            "Existing workspace container ws-e2e; host GPG keyring accessible; keyid exists.",
        ),
        Case::new(
            "reset_repo",
            &["reset", "repo", "ws-e2e", "REPO_PATH", "--yes"],
            "Reset the primary repo inside the workspace.",
        )
        .requires(existing),
        Case::new(
            "reset_work_repos",
            &["reset", "work-repos", "ws-e2e", "--yes"],
            "Reset work repos inside the workspace.",
        )
        .requires(existing),
        Case::new(
            "reset_opt_repos",
            &["reset", "opt-repos", "ws-e2e", "--yes"],
            "Reset optional repos inside the workspace.",
        )
        .requires(existing),
        Case::new(
            "reset_private_repo",
            &["reset", "private-repo", "ws-e2e", "--yes"],
            "Reset the private repo inside the workspace.",
        )
        .requires(existing),
        Case::new(
            "tunnel_foreground",
            &["tunnel", "ws-e2e"],
            "Start a VS Code tunnel (foreground).",
        )
        .requires(tunnel),
        Case::new(
            "tunnel_detach",
            &["tunnel", "ws-e2e", "--detach"],
            "Start a VS Code tunnel in the background.",
        )
        .requires(tunnel),
        Case::new(
            "tunnel_named",
            &["tunnel", "ws-e2e", "--name", "ws-e2e-tunnel"],
            "Start a tunnel with an explicit name.",
        )
        .requires(tunnel),
        Case::new(
            "rm_workspace_yes",
            &["rm", "ws-e2e", "--yes"],
            "Remove a specific workspace without confirmation.",
        )
        .requires(existing),
        Case::new(
            "rm_all_yes",
            &["rm", "--all", "--yes"],
            "Remove all workspaces without confirmation.",
        )
        .requires("At least one existing workspace container."),
        Case::new(
            "env_custom_image",
            &["ls"],
            "Verify custom image selection is respected.",
        )
        .env("CWS_IMAGE", "graysurf/codex-workspace-launcher:latest"),
        Case::new(
            "env_auth_env",
            &["ls"],
            "Force env-based auth mode (no gh keyring lookup).",
        )
        .env("CWS_AUTH", "env"),
        Case::new(
            "env_auth_none",
            &["ls"],
            "Disable auth-related behavior entirely.",
        )
        .env("CWS_AUTH", "none"),
    ]
}

/// Cases that only make sense on some surfaces.
pub fn surface_extra_cases(surface: Surface) -> Vec<Case> {
    let mut cases = vec![Case::new(
        "env_docker_args_string",
        &["ls"],
        "Verify extra docker args are passed through (string form).",
    )
    .env("CWS_DOCKER_ARGS", "-e FOO=bar -e BAZ=qux")];

    if surface.is_shell() {
        cases.push(
            Case::new(
                "env_docker_args_array",
                &["ls"],
                "Verify extra docker args are passed through (array form).",
            )
            .prelude("CWS_DOCKER_ARGS=(-e FOO=bar -e BAZ=qux)"),
        );
    }
    cases
}

/// Every case applicable to a surface, in catalog order.
///
/// Prelude cases need a shell context and never reach the direct surface.
pub fn cases_for(surface: Surface) -> Vec<Case> {
    base_cases()
        .into_iter()
        .chain(surface_extra_cases(surface))
        .filter(|case| surface.is_shell() || case.prelude.is_none())
        .collect()
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
