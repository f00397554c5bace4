//! Prerequisite workspaces: probe, create, rebind, remove.
use super::{CaseRunner, Harness, OwnedWorkspaces};
use crate::catalog::{Case, CaseKind, ResetTarget, REPO_PATH_PLACEHOLDER};
use crate::env::ChildEnv;
use crate::record::RecordRole;
use crate::surface::Surface;
use anyhow::{anyhow, bail, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Resource handles announced on a create command's stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedWorkspace {
    pub workspace: Option<String>,
    pub path: Option<String>,
}

/// Extract `workspace: NAME` and `path: PATH` lines from create output.
pub fn parse_created(stdout: &str) -> CreatedWorkspace {
    static WORKSPACE: OnceLock<Regex> = OnceLock::new();
    static PATH: OnceLock<Regex> = OnceLock::new();
    let workspace = WORKSPACE
        .get_or_init(|| Regex::new(r"(?m)^workspace:\s*(\S+)\s*$").expect("regex for workspace line"));
    let path =
        PATH.get_or_init(|| Regex::new(r"(?m)^path:\s*(\S+)\s*$").expect("regex for path line"));
    let first = |re: &Regex| {
        re.captures(stdout)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string())
    };
    CreatedWorkspace {
        workspace: first(workspace),
        path: first(path),
    }
}

/// Point `case` at a freshly created workspace.
///
/// The workspace reference becomes `workspace`, `REPO_PATH` becomes
/// `repo_path`, reset cases always confirm with `--yes`, and `reset repo`
/// gains the path positional when it named none.
pub fn rebind_args(case: &Case, workspace: &str, repo_path: Option<&str>) -> Vec<String> {
    let mut args = case.args.clone();
    if let Some(current) = case.workspace_ref().map(str::to_string) {
        for arg in args.iter_mut().filter(|arg| arg.as_str() == current) {
            *arg = workspace.to_string();
        }
    }
    if let Some(path) = repo_path {
        for arg in args.iter_mut().filter(|arg| arg.as_str() == REPO_PATH_PLACEHOLDER) {
            *arg = path.to_string();
        }
    }
    if let CaseKind::Reset { target } = case.kind() {
        if target == ResetTarget::Repo {
            if let Some(path) = repo_path {
                if args.len() < 4 {
                    let at = args.len().min(3);
                    args.insert(at, path.to_string());
                }
            }
        }
        if !args.iter().any(|arg| arg == "--yes") {
            args.push("--yes".to_string());
        }
    }
    args
}

/// A repo-backed workspace created for a dependent case.
pub(super) struct RepoWorkspace {
    pub workspace: String,
    pub path: String,
}

impl<R: CaseRunner> Harness<R> {
    /// Create `create [--private-repo PRIVATE] PUBLIC` and take ownership of
    /// the announced workspace as soon as its name is known.
    pub(super) fn create_repo_workspace(
        &mut self,
        surface: Surface,
        env: &ChildEnv,
        include_private: bool,
        owned: &mut OwnedWorkspaces,
    ) -> Result<RepoWorkspace> {
        let public = self.config.public_repo.clone().ok_or_else(|| {
            anyhow!(
                "{} is required for repo-backed e2e cases.",
                self.config.var("PUBLIC_REPO")
            )
        })?;
        let mut args = vec!["create".to_string()];
        if include_private {
            if let Some(private) = self.config.private_repo.as_deref() {
                args.extend(["--private-repo".to_string(), private.to_string()]);
            }
        }
        args.push(public);
        let case = aux_case(
            &format!("e2e_setup_create_repo_{surface}"),
            args,
            "Create repo workspace for dependent e2e cases.",
        );
        let (result, _) = self.run_aux(surface, case, env, RecordRole::Setup)?;

        let created = parse_created(&result.stdout);
        if let Some(name) = created.workspace.as_deref() {
            owned.take(name);
            tracing::info!(workspace = name, "created repo workspace");
        }
        if result.exit_code != 0 {
            bail!("Failed to create repo workspace (exit {}).", result.exit_code);
        }
        match (created.workspace, created.path) {
            (Some(workspace), Some(path)) => Ok(RepoWorkspace { workspace, path }),
            _ => bail!("Failed to parse repo workspace output (workspace/path)."),
        }
    }

    /// Probe with `ls` for the name as a whole token; a failing probe counts as absent.
    pub(super) fn workspace_exists(
        &mut self,
        surface: Surface,
        env: &ChildEnv,
        workspace: &str,
    ) -> Result<bool> {
        let case = aux_case(
            &format!("e2e_probe_ls_{workspace}"),
            vec!["ls".to_string()],
            "Check for existing workspaces.",
        );
        let (result, _) = self.run_aux(surface, case, env, RecordRole::Probe)?;
        let exists = result.exit_code == 0
            && result
                .stdout
                .split_whitespace()
                .any(|token| token == workspace);
        tracing::debug!(workspace, exists, "probed workspace");
        Ok(exists)
    }

    pub(super) fn create_named_workspace(
        &mut self,
        surface: Surface,
        env: &ChildEnv,
        workspace: &str,
        owned: &mut OwnedWorkspaces,
    ) -> Result<()> {
        let case = aux_case(
            &format!("e2e_setup_create_{workspace}"),
            vec![
                "create".to_string(),
                "--no-work-repos".to_string(),
                "--name".to_string(),
                workspace.to_string(),
            ],
            "Create workspace for dependent e2e cases.",
        );
        let (result, _) = self.run_aux(surface, case, env, RecordRole::Setup)?;
        // A partial create may still leave a container behind.
        owned.take(workspace);
        if result.exit_code != 0 {
            bail!(
                "Failed to create workspace {workspace} (exit {}).",
                result.exit_code
            );
        }
        tracing::info!(workspace, "created named workspace");
        Ok(())
    }

    pub(super) fn remove_workspace(
        &mut self,
        surface: Surface,
        env: &ChildEnv,
        workspace: &str,
    ) -> Result<()> {
        let case = aux_case(
            &format!("e2e_cleanup_rm_{workspace}"),
            vec![
                "rm".to_string(),
                workspace.to_string(),
                "--yes".to_string(),
            ],
            "Remove workspace created for e2e tests.",
        );
        let (result, _) = self.run_aux(surface, case, env, RecordRole::Cleanup)?;
        if result.exit_code != 0 {
            bail!(
                "Failed to remove workspace {workspace} (exit {}).",
                result.exit_code
            );
        }
        tracing::info!(workspace, "removed workspace");
        Ok(())
    }
}

fn aux_case(case_id: &str, args: Vec<String>, purpose: &str) -> Case {
    Case::new(case_id, &[], purpose).with_args(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::cases_for;

    fn case(case_id: &str) -> Case {
        cases_for(Surface::Cli)
            .into_iter()
            .find(|case| case.case_id == case_id)
            .unwrap_or_else(|| panic!("missing case {case_id}"))
    }

    #[test]
    fn parses_workspace_and_path_lines() {
        let stdout = "cloning...\nworkspace: ws-e2e-cli-repo-1 \npath: /work/octo/hello\ndone\n";
        let created = parse_created(stdout);
        assert_eq!(created.workspace.as_deref(), Some("ws-e2e-cli-repo-1"));
        assert_eq!(created.path.as_deref(), Some("/work/octo/hello"));
        assert_eq!(parse_created("my workspace: x\n"), CreatedWorkspace::default());
    }

    #[test]
    fn rebinds_exec_workspace_and_repo_path() {
        let mut exec = case("exec_command");
        exec = exec.with_args(vec![
            "exec".into(),
            "ws-e2e-cli-repo".into(),
            "git".into(),
            "-C".into(),
            "REPO_PATH".into(),
            "status".into(),
        ]);
        let args = rebind_args(&exec, "created-1", Some("/work/hello"));
        assert_eq!(
            args,
            vec!["exec", "created-1", "git", "-C", "/work/hello", "status"]
        );
    }

    #[test]
    fn reset_repo_gains_path_and_confirmation() {
        let reset = case("reset_repo").with_args(vec![
            "reset".into(),
            "repo".into(),
            "ws-e2e-cli-repo".into(),
        ]);
        let args = rebind_args(&reset, "created-1", Some("/work/hello"));
        assert_eq!(args, vec!["reset", "repo", "created-1", "/work/hello", "--yes"]);

        let full = case("reset_repo");
        let args = rebind_args(&full, "created-1", Some("/work/hello"));
        assert_eq!(args, vec!["reset", "repo", "created-1", "/work/hello", "--yes"]);
    }

    #[test]
    fn reset_without_yes_is_confirmed() {
        let reset = case("reset_opt_repos").with_args(vec![
            "reset".into(),
            "opt-repos".into(),
            "ws".into(),
        ]);
        assert_eq!(
            rebind_args(&reset, "created-1", None),
            vec!["reset", "opt-repos", "created-1", "--yes"]
        );
    }

    #[test]
    fn aux_cases_classify_their_arguments() {
        let case = aux_case("e2e_probe_ls_x", vec!["ls".into()], "probe");
        assert_eq!(case.kind(), CaseKind::List);
    }
}
