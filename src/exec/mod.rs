//! Process execution for planned cases.
//!
//! Two modes share one result shape: batch runs with piped output and an
//! optional stdin payload, and interactive runs attached to a pseudo-terminal
//! driven by an [`InteractiveScript`]. Every execution persists its captured
//! output under the case directory before returning.
pub mod batch;
pub mod pty;

use crate::env::ChildEnv;
use crate::paths::HarnessPaths;
use crate::plan::PlannedCase;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Hard deadline for interactive runs.
pub const INTERACTIVE_DEADLINE: Duration = Duration::from_secs(15);
/// Time between SIGTERM and SIGKILL once the deadline passes.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Bytes written to the terminal after a delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveScript {
    pub payload: Vec<u8>,
    pub send_after: Duration,
    pub deadline: Duration,
    pub grace: Duration,
}

impl InteractiveScript {
    pub fn new(payload: &[u8], send_after: Duration) -> Self {
        Self {
            payload: payload.to_vec(),
            send_after,
            deadline: INTERACTIVE_DEADLINE,
            grace: TERMINATE_GRACE,
        }
    }

    /// Leave an interactive shell.
    pub fn exit_shell() -> Self {
        Self::new(b"exit\n", Duration::from_millis(500))
    }

    /// Send `^C` to a foreground process.
    pub fn interrupt() -> Self {
        Self::new(b"\x03", Duration::from_secs(3))
    }
}

/// What a child produced, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub exit_code: i32,
    pub duration_ms: u128,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub argv: Vec<String>,
    pub command_display: String,
    pub exit_code: i32,
    pub duration_ms: u128,
    #[serde(skip)]
    pub stdout: String,
    #[serde(skip)]
    pub stderr: String,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    pub timed_out: bool,
}

/// Exit code as a shell reports it: signalled children map to `128 + signal`.
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    }
}

/// Whether `docker info` succeeds with the ambient environment.
pub fn probe_backend() -> bool {
    let Ok(docker) = which::which("docker") else {
        tracing::debug!("docker not found on PATH");
        return false;
    };
    Command::new(docker)
        .arg("info")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

/// Runs planned cases from the repository root and persists their output.
#[derive(Debug, Clone)]
pub struct Executor {
    repo_root: PathBuf,
    paths: HarnessPaths,
    batch_timeout: Option<Duration>,
}

impl Executor {
    pub fn new(repo_root: PathBuf, paths: HarnessPaths, batch_timeout: Option<Duration>) -> Self {
        Self {
            repo_root,
            paths,
            batch_timeout,
        }
    }

    pub fn paths(&self) -> &HarnessPaths {
        &self.paths
    }

    pub fn run_batch(
        &self,
        planned: &PlannedCase,
        env: &ChildEnv,
        stdin: Option<&[u8]>,
    ) -> Result<ExecutionResult> {
        tracing::debug!(case_id = %planned.qualified_id(), display = %planned.display, "batch run");
        let raw = batch::run(
            &planned.argv,
            &self.repo_root,
            env,
            stdin,
            self.batch_timeout,
        )
        .with_context(|| format!("run {}", planned.qualified_id()))?;
        self.persist(planned, raw)
    }

    pub fn run_interactive(
        &self,
        planned: &PlannedCase,
        env: &ChildEnv,
        script: &InteractiveScript,
    ) -> Result<ExecutionResult> {
        tracing::debug!(case_id = %planned.qualified_id(), display = %planned.display, "interactive run");
        let raw = pty::run(&planned.argv, &self.repo_root, env, script)
            .with_context(|| format!("run {} on a pty", planned.qualified_id()))?;
        self.persist(planned, raw)
    }

    fn persist(&self, planned: &PlannedCase, raw: RawOutput) -> Result<ExecutionResult> {
        let case_id = &planned.case.case_id;
        let dir = self.paths.case_dir(planned.surface, case_id);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let stdout_path = self.paths.stdout_path(planned.surface, case_id);
        let stderr_path = self.paths.stderr_path(planned.surface, case_id);
        write_text(&stdout_path, &raw.stdout)?;
        write_text(&stderr_path, &raw.stderr)?;
        Ok(ExecutionResult {
            argv: planned.argv.clone(),
            command_display: planned.display.clone(),
            exit_code: raw.exit_code,
            duration_ms: raw.duration_ms,
            stdout: raw.stdout,
            stderr: raw.stderr,
            stdout_path,
            stderr_path,
            timed_out: raw.timed_out,
        })
    }
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Case;
    use crate::surface::Surface;

    #[test]
    fn signalled_children_report_128_plus_signal() {
        let status = Command::new("sh")
            .args(["-c", "kill -TERM $$"])
            .status()
            .expect("spawn sh");
        assert_eq!(exit_code(status), 128 + libc::SIGTERM);
        let status = Command::new("sh")
            .args(["-c", "exit 7"])
            .status()
            .expect("spawn sh");
        assert_eq!(exit_code(status), 7);
    }

    #[test]
    fn batch_output_is_persisted_under_the_case_dir() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = HarnessPaths::new(temp.path().join("out"));
        let executor = Executor::new(temp.path().to_path_buf(), paths.clone(), None);
        let planned = PlannedCase {
            surface: Surface::Bash,
            case: Case::new("echo case", &["echo"], "echo"),
            argv: vec!["sh".into(), "-c".into(), "echo hi; echo oops >&2".into()],
            display: "sh -c ...".into(),
        };
        let mut env = ChildEnv::default();
        env.set("PATH", "/usr/bin:/bin");
        let result = executor.run_batch(&planned, &env, None).expect("run");
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout_path, temp.path().join("out/bash/echo_case/stdout.txt"));
        assert_eq!(
            fs::read_to_string(&result.stdout_path).expect("stdout"),
            "hi\n"
        );
        assert_eq!(
            fs::read_to_string(&result.stderr_path).expect("stderr"),
            "oops\n"
        );
    }

    #[test]
    fn scripted_defaults_match_the_launcher_flows() {
        let shell = InteractiveScript::exit_shell();
        assert_eq!(shell.payload, b"exit\n");
        assert_eq!(shell.send_after, Duration::from_millis(500));
        assert_eq!(shell.deadline, Duration::from_secs(15));
        let tunnel = InteractiveScript::interrupt();
        assert_eq!(tunnel.payload, vec![0x03]);
        assert_eq!(tunnel.grace, Duration::from_secs(5));
    }
}
