//! Tagged classification of a case's launcher invocation.
//!
//! Gate, materializer and lifecycle all match on [`CaseKind`] instead of
//! re-deriving intent from argument strings.
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthProvider {
    Github,
    Codex,
    Gpg,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTarget {
    Repo,
    WorkRepos,
    OptRepos,
    PrivateRepo,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ExecMode {
    /// No command after the workspace: opens an interactive shell.
    Shell,
    Command { git: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CaseKind {
    Help,
    Create { ssh: bool, private_seed: bool },
    List,
    Exec { mode: ExecMode },
    Auth { provider: AuthProvider },
    Reset { target: ResetTarget },
    Tunnel { detach: bool },
    Remove { all: bool },
    Other,
}

/// Which prerequisite workspace a case runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceFlavor {
    Plain,
    Repo,
    PrivateRepo,
}

impl WorkspaceFlavor {
    pub fn suffix(self) -> &'static str {
        match self {
            WorkspaceFlavor::Plain => "",
            WorkspaceFlavor::Repo => "-repo",
            WorkspaceFlavor::PrivateRepo => "-private",
        }
    }
}

impl CaseKind {
    pub fn classify(args: &[String]) -> Self {
        if args.iter().any(|arg| arg == "--help") {
            return CaseKind::Help;
        }
        let Some(subcommand) = args.first() else {
            return CaseKind::Other;
        };
        let rest = &args[1..];
        match subcommand.as_str() {
            "create" => CaseKind::Create {
                ssh: rest
                    .iter()
                    .any(|arg| arg.starts_with("git@") || arg.starts_with("ssh://git@")),
                private_seed: has_flag(rest, "--private-repo"),
            },
            "ls" => CaseKind::List,
            "exec" => CaseKind::Exec {
                mode: classify_exec(rest),
            },
            "auth" => CaseKind::Auth {
                provider: match rest.first().map(String::as_str) {
                    Some("github") => AuthProvider::Github,
                    Some("codex") => AuthProvider::Codex,
                    Some("gpg") => AuthProvider::Gpg,
                    _ => AuthProvider::Other,
                },
            },
            "reset" => CaseKind::Reset {
                target: match rest.first().map(String::as_str) {
                    Some("repo") => ResetTarget::Repo,
                    Some("work-repos") => ResetTarget::WorkRepos,
                    Some("opt-repos") => ResetTarget::OptRepos,
                    Some("private-repo") => ResetTarget::PrivateRepo,
                    _ => ResetTarget::Other,
                },
            },
            "tunnel" => CaseKind::Tunnel {
                detach: has_flag(rest, "--detach"),
            },
            "rm" => CaseKind::Remove {
                all: has_flag(rest, "--all"),
            },
            _ => CaseKind::Other,
        }
    }

    /// Cases that act on a workspace which must exist beforehand.
    pub fn needs_existing_workspace(self) -> bool {
        matches!(
            self,
            CaseKind::Exec { .. }
                | CaseKind::Auth { .. }
                | CaseKind::Reset { .. }
                | CaseKind::Tunnel { .. }
                | CaseKind::Remove { .. }
        )
    }

    /// Cases whose prerequisite workspace must carry a checked-out repo.
    pub fn needs_repo_workspace(self) -> bool {
        matches!(
            self,
            CaseKind::Reset { .. }
                | CaseKind::Exec {
                    mode: ExecMode::Command { git: true }
                }
        )
    }

    pub fn is_exec_shell(self) -> bool {
        matches!(
            self,
            CaseKind::Exec {
                mode: ExecMode::Shell
            }
        )
    }

    pub fn is_foreground_tunnel(self) -> bool {
        matches!(self, CaseKind::Tunnel { detach: false })
    }

    pub fn is_reset(self) -> bool {
        matches!(self, CaseKind::Reset { .. })
    }

    /// Options taking a value, skipped when locating the workspace argument.
    fn valued_options(self) -> &'static [&'static str] {
        match self {
            CaseKind::Exec { .. } => &["--user"],
            CaseKind::Auth { .. } => &["--host", "--profile", "--key"],
            CaseKind::Tunnel { .. } => &["--name"],
            _ => &[],
        }
    }

    /// Locate the workspace argument this invocation targets.
    pub fn workspace_ref(self, args: &[String]) -> Option<&str> {
        match self {
            CaseKind::Create { .. } => option_value(args, "--name"),
            CaseKind::Exec { .. } | CaseKind::Tunnel { .. } => {
                first_positional(args.get(1..)?, self.valued_options())
            }
            CaseKind::Auth { .. } | CaseKind::Reset { .. } => {
                first_positional(args.get(2..)?, self.valued_options())
            }
            CaseKind::Remove { all: false } => first_positional(args.get(1..)?, &[]),
            CaseKind::Remove { all: true } | CaseKind::Help | CaseKind::List | CaseKind::Other => {
                None
            }
        }
    }
}

fn classify_exec(rest: &[String]) -> ExecMode {
    let positionals = positionals(rest, &["--user"]);
    if positionals.len() <= 1 {
        return ExecMode::Shell;
    }
    ExecMode::Command {
        git: rest.iter().any(|arg| arg == "git"),
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

pub(crate) fn option_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    let idx = args.iter().position(|arg| arg == key)?;
    args.get(idx + 1).map(String::as_str)
}

pub(crate) fn first_positional<'a>(args: &'a [String], valued: &[&str]) -> Option<&'a str> {
    positionals(args, valued).first().copied()
}

/// Arguments from the first non-option onward. Leading options are skipped,
/// together with their value when listed in `valued`.
fn positionals<'a>(args: &'a [String], valued: &[&str]) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < args.len() {
        let arg = args[idx].as_str();
        if out.is_empty() && arg.starts_with('-') {
            idx += if valued.contains(&arg) { 2 } else { 1 };
            continue;
        }
        out.push(arg);
        idx += 1;
    }
    out
}
