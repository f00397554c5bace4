//! Multi-step end-to-end flow for one surface.
//!
//! The flow walks a realistic session (help, list, create, exec as user and
//! root, then a repo-backed phase) and removes what it created in a
//! guaranteed-release block keyed on what was actually created.
use super::{parse_created, CaseRunner, Harness};
use crate::catalog::{Case, WORKSPACE_PLACEHOLDER};
use crate::env::ChildEnv;
use crate::gate::{BackendStatus, Skip};
use crate::lock::RunLock;
use crate::record::{CaseRecord, RecordRole};
use crate::surface::Surface;
use crate::util::now_epoch_ms;
use anyhow::{bail, Result};
use std::collections::BTreeSet;

/// Expected `id -u` of the unprivileged workspace user.
pub const WORKSPACE_USER_UID: &str = "1001";
pub const ROOT_UID: &str = "0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed(Vec<CaseRecord>),
    /// The flow stopped early; `completed` holds the steps that ran.
    Skipped {
        completed: Vec<CaseRecord>,
        skip: Skip,
    },
}

#[derive(Debug, Default)]
struct FlowResources {
    named_created: bool,
    repo_workspace: Option<String>,
}

struct StepOutput {
    record: CaseRecord,
    stdout: String,
}

impl<R: CaseRunner> Harness<R> {
    /// Run the multi-step flow on `surface`.
    pub fn run_flow(&mut self, surface: Surface) -> Result<FlowOutcome> {
        if !self.config.enabled {
            return Ok(FlowOutcome::Skipped {
                completed: Vec::new(),
                skip: Skip::harness_disabled(&self.config),
            });
        }
        let _lock = RunLock::acquire(&self.lock_path)?;
        if BackendStatus::from_probe(self.runner.backend_available()) == BackendStatus::Unavailable
        {
            return Ok(FlowOutcome::Skipped {
                completed: Vec::new(),
                skip: Skip::backend_unavailable(),
            });
        }

        let env = self.env.clone();
        let run_id = now_epoch_ms()? / 1000;
        let named = format!("{WORKSPACE_PLACEHOLDER}-{surface}-{run_id}");
        tracing::info!(surface = %surface, workspace = %named, "flow start");

        let mut resources = FlowResources::default();
        let mut steps = Vec::new();
        let outcome = self.flow_steps(surface, &env, &named, &mut resources, &mut steps);

        if self.config.keep_workspaces {
            tracing::info!(surface = %surface, "keeping flow workspaces");
        } else {
            if let Some(repo) = resources.repo_workspace.clone() {
                self.flow_cleanup(surface, &env, "90_rm_repo", &repo, "Remove repo workspace.");
            }
            if resources.named_created {
                self.flow_cleanup(surface, &env, "91_rm_named", &named, "Remove named workspace.");
            }
        }

        match outcome? {
            Some(skip) => Ok(FlowOutcome::Skipped {
                completed: steps,
                skip,
            }),
            None => Ok(FlowOutcome::Completed(steps)),
        }
    }

    fn flow_steps(
        &mut self,
        surface: Surface,
        env: &ChildEnv,
        named: &str,
        resources: &mut FlowResources,
        steps: &mut Vec<CaseRecord>,
    ) -> Result<Option<Skip>> {
        let help = self.flow_step(surface, env, steps, "01_help", &["--help"], "Show top-level help.")?;
        ensure_ok(surface, &help.record)?;
        let ls = self.flow_step(surface, env, steps, "02_ls", &["ls"], "List workspaces.")?;
        ensure_ok(surface, &ls.record)?;

        resources.named_created = true;
        let create_named = self.flow_step(
            surface,
            env,
            steps,
            "10_create_named",
            &["create", "--no-work-repos", "--name", named],
            "Create a named workspace without cloning repos.",
        )?;
        ensure_ok(surface, &create_named.record)?;

        let exec_user = self.flow_step(
            surface,
            env,
            steps,
            "11_exec_user",
            &["exec", "--user", "codex", named, "id", "-u"],
            "Exec as codex and verify uid.",
        )?;
        ensure_ok(surface, &exec_user.record)?;
        expect_stdout(surface, "11_exec_user", &exec_user.stdout, WORKSPACE_USER_UID)?;

        let exec_root = self.flow_step(
            surface,
            env,
            steps,
            "12_exec_root",
            &["exec", "--root", named, "id", "-u"],
            "Exec as root and verify uid.",
        )?;
        ensure_ok(surface, &exec_root.record)?;
        expect_stdout(surface, "12_exec_root", &exec_root.stdout, ROOT_UID)?;

        if surface != Surface::Cli && !self.config.full {
            return Ok(None);
        }
        let Some(public_repo) = self.config.public_repo.clone() else {
            return Ok(Some(Skip::public_repo_missing(
                &self.config,
                "repo-backed e2e flow",
            )));
        };

        let create_repo = self.flow_step(
            surface,
            env,
            steps,
            "20_create_repo",
            &["create", &public_repo],
            "Create a workspace from a public repo.",
        )?;
        let created = parse_created(&create_repo.stdout);
        resources.repo_workspace = created.workspace.clone();
        ensure_ok(surface, &create_repo.record)?;
        let (Some(repo), Some(path)) = (created.workspace, created.path) else {
            bail!("Failed to parse repo workspace output (workspace/path).");
        };

        let repo_steps: [(&str, Vec<&str>, &str); 3] = [
            (
                "21_exec_git_status",
                vec!["exec", &repo, "git", "-C", &path, "status"],
                "Run git status inside the repo workspace.",
            ),
            (
                "22_reset_repo",
                vec!["reset", "repo", &repo, &path, "--yes"],
                "Reset the primary repo inside the repo workspace.",
            ),
            (
                "23_reset_opt_repos",
                vec!["reset", "opt-repos", &repo, "--yes"],
                "Reset /opt repos inside the repo workspace.",
            ),
        ];
        for (case_id, args, purpose) in repo_steps {
            let output = self.flow_step(surface, env, steps, case_id, &args, purpose)?;
            ensure_ok(surface, &output.record)?;
        }
        Ok(None)
    }

    /// Run and record one step; the record is kept even when it failed.
    fn flow_step(
        &mut self,
        surface: Surface,
        env: &ChildEnv,
        steps: &mut Vec<CaseRecord>,
        case_id: &str,
        args: &[&str],
        purpose: &str,
    ) -> Result<StepOutput> {
        let planned = self.planner.plan(surface, Case::new(case_id, args, purpose));
        let stdin: Option<&[u8]> = if planned.case.kind().is_reset() {
            Some(b"y\n")
        } else {
            None
        };
        let result = self.runner.run_batch(&planned, env, stdin)?;
        let record =
            self.recorder
                .record(&planned, &result, RecordRole::FlowStep, &BTreeSet::from([0]))?;
        steps.push(record.clone());
        Ok(StepOutput {
            record,
            stdout: result.stdout,
        })
    }

    fn flow_cleanup(
        &mut self,
        surface: Surface,
        env: &ChildEnv,
        case_id: &str,
        workspace: &str,
        purpose: &str,
    ) {
        let planned = self
            .planner
            .plan(surface, Case::new(case_id, &["rm", workspace, "--yes"], purpose));
        let outcome = self.runner.run_batch(&planned, env, None).and_then(|result| {
            self.recorder
                .record(&planned, &result, RecordRole::Cleanup, &BTreeSet::from([0]))
        });
        match outcome {
            Ok(record) if record.passed => {
                tracing::info!(workspace, "removed flow workspace");
            }
            Ok(record) => {
                tracing::warn!(workspace, exit_code = record.exit_code, "flow cleanup failed");
            }
            Err(err) => {
                tracing::warn!(workspace, error = %format!("{err:#}"), "flow cleanup failed");
            }
        }
    }
}

fn ensure_ok(surface: Surface, record: &CaseRecord) -> Result<()> {
    if !record.passed {
        bail!(
            "e2e failed: {surface}:{} (exit {})",
            record.case_id,
            record.exit_code
        );
    }
    Ok(())
}

fn expect_stdout(surface: Surface, label: &str, stdout: &str, expected: &str) -> Result<()> {
    let actual = stdout.trim();
    if actual != expected {
        bail!("e2e failed: {surface}:{label} expected {expected:?}, got {actual:?}");
    }
    Ok(())
}
