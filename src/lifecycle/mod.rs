//! Per-case lifecycle orchestration.
//!
//! A case runs as `lock → gate → materialize → prerequisites → run → record`,
//! and every workspace the harness created along the way is removed on every
//! exit path unless the operator asked to keep them.
mod flow;
mod workspace;

pub use flow::FlowOutcome;
pub use workspace::{parse_created, rebind_args, CreatedWorkspace};

use crate::catalog::{Case, CaseKind};
use crate::config::E2eConfig;
use crate::env::ChildEnv;
use crate::exec::{ExecutionResult, Executor, InteractiveScript};
use crate::gate::{self, BackendStatus, Skip, Verdict};
use crate::lock::RunLock;
use crate::materialize::materialize;
use crate::plan::{PlannedCase, Planner};
use crate::record::{CaseRecord, RecordRole, Recorder};
use crate::surface::Surface;
use anyhow::{bail, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Seam between orchestration and real processes.
pub trait CaseRunner {
    /// Whether the container backend answers its health probe.
    fn backend_available(&mut self) -> bool;

    fn run_batch(
        &mut self,
        planned: &PlannedCase,
        env: &ChildEnv,
        stdin: Option<&[u8]>,
    ) -> Result<ExecutionResult>;

    fn run_interactive(
        &mut self,
        planned: &PlannedCase,
        env: &ChildEnv,
        script: &InteractiveScript,
    ) -> Result<ExecutionResult>;
}

impl CaseRunner for Executor {
    fn backend_available(&mut self) -> bool {
        crate::exec::probe_backend()
    }

    fn run_batch(
        &mut self,
        planned: &PlannedCase,
        env: &ChildEnv,
        stdin: Option<&[u8]>,
    ) -> Result<ExecutionResult> {
        Executor::run_batch(self, planned, env, stdin)
    }

    fn run_interactive(
        &mut self,
        planned: &PlannedCase,
        env: &ChildEnv,
        script: &InteractiveScript,
    ) -> Result<ExecutionResult> {
        Executor::run_interactive(self, planned, env, script)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed(CaseRecord),
    Skipped(Skip),
}

/// Workspaces the harness created and must remove, in creation order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OwnedWorkspaces {
    names: Vec<String>,
}

impl OwnedWorkspaces {
    pub fn take(&mut self, name: &str) {
        if !self.names.iter().any(|owned| owned == name) {
            self.names.push(name.to_string());
        }
    }

    /// Drop ownership, e.g. after the case under test removed it itself.
    pub fn release(&mut self, name: &str) -> bool {
        let before = self.names.len();
        self.names.retain(|owned| owned != name);
        self.names.len() != before
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct Harness<R> {
    runner: R,
    planner: Planner,
    config: E2eConfig,
    env: ChildEnv,
    recorder: Recorder,
    lock_path: PathBuf,
}

impl<R: CaseRunner> Harness<R> {
    pub fn new(
        runner: R,
        planner: Planner,
        config: E2eConfig,
        env: ChildEnv,
        recorder: Recorder,
    ) -> Self {
        let lock_path = recorder.paths().lock_path();
        Self {
            runner,
            planner,
            config,
            env,
            recorder,
            lock_path,
        }
    }

    pub fn config(&self) -> &E2eConfig {
        &self.config
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run one planned catalog case through the full lifecycle.
    pub fn run_case(&mut self, planned: &PlannedCase) -> Result<CaseOutcome> {
        if !self.config.enabled {
            return Ok(CaseOutcome::Skipped(Skip::harness_disabled(&self.config)));
        }
        let _lock = RunLock::acquire(&self.lock_path)?;

        let backend = BackendStatus::from_probe(self.runner.backend_available());
        if let Verdict::Skip(skip) = gate::decide(&planned.case, &self.config, backend) {
            tracing::info!(
                surface = %planned.surface,
                case_id = %planned.case.case_id,
                reason = %skip.message,
                "case skipped"
            );
            return Ok(CaseOutcome::Skipped(skip));
        }

        let planned = materialize(&self.planner, planned.surface, &planned.case, &self.config);
        let env = self.env.with_overrides(&planned.case.env);
        tracing::info!(
            surface = %planned.surface,
            case_id = %planned.case.case_id,
            display = %planned.display,
            "case start"
        );

        let mut owned = OwnedWorkspaces::default();
        let outcome = self.run_owned(planned.clone(), &env, &mut owned);
        self.release_workspaces(planned.surface, &env, &owned);
        outcome.map(CaseOutcome::Passed)
    }

    fn run_owned(
        &mut self,
        planned: PlannedCase,
        env: &ChildEnv,
        owned: &mut OwnedWorkspaces,
    ) -> Result<CaseRecord> {
        let surface = planned.surface;
        let planned = self.prepare_prerequisites(planned, env, owned)?;
        let kind = planned.case.kind();

        let mut accepted = BTreeSet::from([0]);
        let result = if kind.is_exec_shell() {
            self.runner
                .run_interactive(&planned, env, &InteractiveScript::exit_shell())?
        } else if kind.is_foreground_tunnel() {
            accepted.insert(130);
            self.runner
                .run_interactive(&planned, env, &InteractiveScript::interrupt())?
        } else {
            let stdin: Option<&[u8]> = if kind.is_reset() { Some(b"y\n") } else { None };
            self.runner.run_batch(&planned, env, stdin)?
        };

        let record = self
            .recorder
            .record(&planned, &result, RecordRole::Case, &accepted)?;
        if !record.passed {
            bail!(failure_message(surface, &planned.case.case_id, &result));
        }

        if kind == (CaseKind::Remove { all: false }) {
            if let Some(target) = planned.case.workspace_ref() {
                if owned.release(target) {
                    tracing::debug!(workspace = target, "case removed owned workspace");
                }
            }
        }
        if matches!(kind, CaseKind::Create { .. }) {
            if let Some(name) = parse_created(&result.stdout).workspace {
                owned.take(&name);
            }
        }
        Ok(record)
    }

    /// Create whatever workspace the case needs and rebind it when the name
    /// is only known after creation.
    fn prepare_prerequisites(
        &mut self,
        planned: PlannedCase,
        env: &ChildEnv,
        owned: &mut OwnedWorkspaces,
    ) -> Result<PlannedCase> {
        let kind = planned.case.kind();
        if !kind.needs_existing_workspace() {
            return Ok(planned);
        }
        let Some(workspace) = planned.case.workspace_ref().map(str::to_string) else {
            return Ok(planned);
        };
        let surface = planned.surface;
        if kind.needs_repo_workspace() {
            let created = self.create_repo_workspace(
                surface,
                env,
                planned.case.needs_private_repo(),
                owned,
            )?;
            let args = rebind_args(&planned.case, &created.workspace, Some(created.path.as_str()));
            return Ok(self.planner.plan(surface, planned.case.with_args(args)));
        }
        if !self.workspace_exists(surface, env, &workspace)? {
            self.create_named_workspace(surface, env, &workspace, owned)?;
        }
        Ok(planned)
    }

    /// Remove owned workspaces, newest first. Failures are logged, never raised.
    fn release_workspaces(&mut self, surface: Surface, env: &ChildEnv, owned: &OwnedWorkspaces) {
        if owned.is_empty() {
            return;
        }
        if self.config.keep_workspaces {
            tracing::info!(workspaces = ?owned.names(), "keeping workspaces");
            return;
        }
        for name in owned.names().iter().rev() {
            if let Err(err) = self.remove_workspace(surface, env, name) {
                tracing::warn!(workspace = %name, error = %format!("{err:#}"), "cleanup failed");
            }
        }
    }

    /// Run an auxiliary launcher invocation and record it.
    fn run_aux(
        &mut self,
        surface: Surface,
        case: Case,
        env: &ChildEnv,
        role: RecordRole,
    ) -> Result<(ExecutionResult, CaseRecord)> {
        let planned = self.planner.plan(surface, case);
        let result = self.runner.run_batch(&planned, env, None)?;
        let record = self
            .recorder
            .record(&planned, &result, role, &BTreeSet::from([0]))?;
        Ok((result, record))
    }
}

fn failure_message(surface: Surface, case_id: &str, result: &ExecutionResult) -> String {
    if result.timed_out {
        format!(
            "e2e failed: {surface}:{case_id} (exit {}, timed out)",
            result.exit_code
        )
    } else {
        format!("e2e failed: {surface}:{case_id} (exit {})", result.exit_code)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
